// ABOUTME: Private key loading for public-key authentication.
// ABOUTME: Reads one PEM block, prompts for a passphrase when encrypted, and parses the key.

use super::error::{Error, Result};
use super::passphrase::{PassphrasePrompt, PassphraseSource};
use super::pem::PemBlock;
use russh::keys::{HashAlg, PrivateKey, decode_secret_key, ssh_key};
use std::path::Path;
use std::sync::Arc;

/// A parsed private key, ready to sign authentication requests.
///
/// Only the public half is exposed.
#[derive(Clone)]
pub struct SigningCredential(Arc<PrivateKey>);

impl SigningCredential {
    pub fn public_key(&self) -> &ssh_key::PublicKey {
        self.0.public_key()
    }

    /// SHA-256 fingerprint in OpenSSH notation (`SHA256:...`).
    pub fn fingerprint(&self) -> String {
        self.public_key().fingerprint(HashAlg::Sha256).to_string()
    }

    pub fn algorithm(&self) -> String {
        self.0.algorithm().to_string()
    }

    pub(crate) fn private_key(&self) -> Arc<PrivateKey> {
        Arc::clone(&self.0)
    }
}

impl PartialEq for SigningCredential {
    fn eq(&self, other: &Self) -> bool {
        self.public_key().key_data() == other.public_key().key_data()
    }
}

impl Eq for SigningCredential {}

impl std::fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredential")
            .field("algorithm", &self.algorithm())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Load a signing key from `path`.
///
/// Encrypted keys are unlocked with passphrases from `passphrases`, allowing
/// up to three attempts.
pub fn load_signing_key(
    path: &Path,
    passphrases: &mut dyn PassphraseSource,
) -> Result<SigningCredential> {
    let raw = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = std::str::from_utf8(&raw)
        .map_err(|_| Error::Format(format!("{} is not a PEM text file", path.display())))?;

    let block = PemBlock::decode(text)?;

    let key = if block.is_encrypted() {
        tracing::debug!(path = %path.display(), label = block.label(), "key is passphrase protected");
        passphrases.notice("Detected a passphrase protected key file");

        let armored = block.encode();
        PassphrasePrompt::new(
            passphrases,
            format!("Enter passphrase for key {}: ", path.display()),
        )
        .run(|passphrase| decode_secret_key(&armored, Some(passphrase)))?
    } else {
        decode_secret_key(text, None)
            .map_err(|e| Error::Auth(format!("unable to parse key {}: {e}", path.display())))?
    };

    let credential = SigningCredential(Arc::new(key));
    tracing::debug!(
        path = %path.display(),
        algorithm = %credential.algorithm(),
        fingerprint = %credential.fingerprint(),
        "loaded signing key"
    );
    Ok(credential)
}
