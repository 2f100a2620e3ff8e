// ABOUTME: SSH connection management using russh.
// ABOUTME: Resolves credentials, dials the host, and authenticates.

use super::error::{Error, Result};
use super::key::{SigningCredential, load_signing_key};
use super::passphrase::{FixedPassphrase, PassphraseSource, TerminalPassphrase};
use russh::Disconnect;
use russh::client::{self, Config, Handle};
use russh::keys::{HashAlg, PrivateKeyWithHashAlg, ssh_key};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for establishing an SSH connection.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Password for password authentication.
    /// Ignored when `key_path` is set.
    pub password: Option<Zeroizing<String>>,
    /// Private key for public-key authentication.
    pub key_path: Option<PathBuf>,
    /// Passphrase for an encrypted `key_path`.
    /// If None, the operator is prompted on the terminal.
    pub key_passphrase: Option<Zeroizing<String>>,
    /// Limit on dialing plus authentication (default: 30 seconds).
    pub connect_timeout: Option<Duration>,
    /// Limit on each remote command (default: none).
    pub command_timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: None,
            key_path: None,
            key_passphrase: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            command_timeout: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn key_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.key_passphrase = Some(Zeroizing::new(passphrase.into()));
        self
    }

    pub fn connect_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.connect_timeout = timeout.into();
        self
    }

    pub fn command_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.command_timeout = timeout.into();
        self
    }

    /// `host:port` as dialed.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// SSH client handler for russh.
///
/// Server host keys are accepted without verification; the fingerprint is
/// logged at debug level.
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::debug!(
            host = %self.host,
            port = self.port,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting server host key"
        );
        Ok(true)
    }
}

/// Authentication method resolved from config.
enum AuthMethod {
    PublicKey(SigningCredential),
    Password(Zeroizing<String>),
    None,
}

impl AuthMethod {
    fn name(&self) -> &'static str {
        match self {
            AuthMethod::PublicKey(_) => "publickey",
            AuthMethod::Password(_) => "password",
            AuthMethod::None => "none",
        }
    }
}

/// An open, authenticated SSH connection.
///
/// Every execution method takes `&mut self`: one command is in flight per
/// connection at a time. Dropping the connection tears down the transport;
/// [`Connection::close`] does so with a proper disconnect message.
pub struct Connection {
    pub(super) handle: Handle<ClientHandler>,
    pub(super) address: String,
    pub(super) command_timeout: Option<Duration>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("command_timeout", &self.command_timeout)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Connection {
    /// Connect to the remote host, prompting on the terminal if the key is
    /// encrypted and no passphrase was supplied.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        Self::connect_with(config, &mut TerminalPassphrase).await
    }

    /// Connect to the remote host, reading key passphrases from `passphrases`.
    pub async fn connect_with(
        config: &ConnectionConfig,
        passphrases: &mut dyn PassphraseSource,
    ) -> Result<Self> {
        let auth_method = Self::resolve_auth_method(config, passphrases)?;

        let handshake = Self::establish(config, auth_method);
        let handle = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| Error::Timeout {
                    operation: "connect",
                    after: limit,
                })??,
            None => handshake.await?,
        };

        tracing::info!(address = %config.address(), user = %config.user, "connected");

        Ok(Self {
            handle,
            address: config.address(),
            command_timeout: config.command_timeout,
        })
    }

    /// Resolve which authentication method to use.
    ///
    /// A key path wins over a password; with neither, the `none` method is
    /// tried and left for the server to reject.
    fn resolve_auth_method(
        config: &ConnectionConfig,
        passphrases: &mut dyn PassphraseSource,
    ) -> Result<AuthMethod> {
        if let Some(key_path) = &config.key_path {
            if config.password.is_some() {
                tracing::debug!("both key and password configured, using the key");
            }
            let key = match &config.key_passphrase {
                Some(passphrase) => {
                    load_signing_key(key_path, &mut FixedPassphrase::new(passphrase.as_str()))?
                }
                None => load_signing_key(key_path, passphrases)?,
            };
            return Ok(AuthMethod::PublicKey(key));
        }

        if let Some(password) = &config.password {
            return Ok(AuthMethod::Password(password.clone()));
        }

        tracing::warn!(user = %config.user, "no key or password configured");
        Ok(AuthMethod::None)
    }

    /// Dial the host and authenticate.
    async fn establish(
        config: &ConnectionConfig,
        auth_method: AuthMethod,
    ) -> Result<Handle<ClientHandler>> {
        let handler = ClientHandler {
            host: config.host.clone(),
            port: config.port,
        };

        let mut handle = client::connect(
            Arc::new(Config::default()),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            russh::Error::IO(io) => Error::Connection(format!("{}: {io}", config.address())),
            other => Error::Transport(other),
        })?;

        let user = config.user.as_str();
        let method = auth_method.name();
        tracing::debug!(user, method, "authenticating");

        let result = match auth_method {
            AuthMethod::PublicKey(key) => {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                handle
                    .authenticate_publickey(
                        user,
                        PrivateKeyWithHashAlg::new(key.private_key(), hash_alg),
                    )
                    .await?
            }
            AuthMethod::Password(password) => {
                handle.authenticate_password(user, password.as_str()).await?
            }
            AuthMethod::None => handle.authenticate_none(user).await?,
        };

        if !result.success() {
            return Err(Error::Auth(format!(
                "server rejected {method} authentication for user `{user}`"
            )));
        }

        Ok(handle)
    }

    /// `host:port` this connection was opened to.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    pub fn set_command_timeout(&mut self, timeout: impl Into<Option<Duration>>) {
        self.command_timeout = timeout.into();
    }

    /// Disconnect the session.
    pub async fn close(self) -> Result<()> {
        tracing::debug!(address = %self.address, "disconnecting");
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}
