// ABOUTME: In-process SSH server helper for integration tests.
// ABOUTME: Uses russh's server side with scripted command replies.

use russh::keys::{load_public_key, load_secret_key, ssh_key};
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use sshbatch::ssh::ConnectionConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "hunter2";
pub const KEY_PASSPHRASE: &str = "correct horse";

/// Which credentials and requests the server accepts.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub password: Option<String>,
    pub accept_key: bool,
    pub reject_sessions: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            password: Some(TEST_PASSWORD.to_string()),
            accept_key: true,
            reject_sessions: false,
        }
    }
}

impl ServerOptions {
    pub fn password_only() -> Self {
        Self {
            accept_key: false,
            ..Default::default()
        }
    }

    pub fn rejecting_sessions() -> Self {
        Self {
            reject_sessions: true,
            ..Default::default()
        }
    }
}

/// Path to a file under tests/fixtures.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Running SSH server bound to a random local port.
pub struct TestServer {
    port: u16,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> Self {
        let host_key =
            load_secret_key(fixture("host_key"), None).expect("host key fixture should load");
        let authorized: Vec<ssh_key::PublicKey> = ["client_key.pub", "client_key_encrypted.pub"]
            .into_iter()
            .map(|name| load_public_key(fixture(name)).expect("public key fixture should load"))
            .collect();

        let config = Arc::new(server::Config {
            keys: vec![host_key],
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind a local port");
        let port = listener.local_addr().expect("listener has an address").port();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = ScriptedHandler {
                    options: options.clone(),
                    authorized: authorized.clone(),
                };
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    if let Ok(session) = server::run_stream(config, stream, handler).await {
                        let _ = session.await;
                    }
                });
            }
        });

        Self { port, task }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base config for this server, without credentials.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new("127.0.0.1", TEST_USER)
            .port(self.port)
            .connect_timeout(Duration::from_secs(10))
    }

    /// Config that authenticates with the unencrypted client key.
    pub fn key_config(&self) -> ConnectionConfig {
        self.connection_config().key_path(fixture("client_key"))
    }

    /// Config that authenticates with the test password.
    pub fn password_config(&self) -> ConnectionConfig {
        self.connection_config().password(TEST_PASSWORD)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ScriptedHandler {
    options: ServerOptions,
    authorized: Vec<ssh_key::PublicKey>,
}

fn reject() -> Auth {
    Auth::Reject {
        proceed_with_methods: None,
        partial_success: false,
    }
}

impl server::Handler for ScriptedHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if user == TEST_USER && self.options.password.as_deref() == Some(password) {
            Ok(Auth::Accept)
        } else {
            Ok(reject())
        }
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        if self.options.accept_key
            && user == TEST_USER
            && self
                .authorized
                .iter()
                .any(|key| key.key_data() == public_key.key_data())
        {
            Ok(Auth::Accept)
        } else {
            Ok(reject())
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(!self.options.reject_sessions)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        let _ = session.channel_success(channel);

        let handle = session.handle();
        tokio::spawn(async move {
            let Some(reply) = script(&command) else {
                // leave the command hanging
                return;
            };
            if !reply.stdout.is_empty() {
                let _ = handle
                    .data(channel, CryptoVec::from_slice(reply.stdout.as_bytes()))
                    .await;
            }
            if !reply.stderr.is_empty() {
                let _ = handle
                    .extended_data(channel, 1, CryptoVec::from_slice(reply.stderr.as_bytes()))
                    .await;
            }
            let _ = handle.exit_status_request(channel, reply.exit_code).await;
            let _ = handle.eof(channel).await;
            let _ = handle.close(channel).await;
        });

        Ok(())
    }
}

struct Reply {
    stdout: String,
    stderr: String,
    exit_code: u32,
}

impl Reply {
    fn new(stdout: &str, stderr: &str, exit_code: u32) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }
}

/// Canned behavior of the fake remote shell.
///
/// `echo <text>` prints `<text>`, `exit <n>` exits with `n`, `warn` writes to
/// stderr, `pad` prints whitespace-padded text, `hang` never finishes.
fn script(command: &str) -> Option<Reply> {
    if command == "hang" {
        return None;
    }
    if let Some(text) = command.strip_prefix("echo ") {
        return Some(Reply::new(&format!("{text}\n"), "", 0));
    }
    if let Some(code) = command.strip_prefix("exit ") {
        return Some(Reply::new("", "", code.trim().parse().unwrap_or(255)));
    }
    Some(match command {
        "true" => Reply::new("", "", 0),
        "false" => Reply::new("", "", 1),
        "warn" => Reply::new("", "careful\n", 0),
        "pad" => Reply::new("   padded   \n\n", "", 0),
        _ => Reply::new("", &format!("{command}: command not found\n"), 127),
    })
}
