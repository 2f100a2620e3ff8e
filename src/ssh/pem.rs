// ABOUTME: Single-block PEM envelope decoding and encoding for private key files.
// ABOUTME: Detects legacy, PKCS#8, and OpenSSH passphrase encryption from block metadata.

use super::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write;

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";
const OPENSSH_MAGIC: &[u8] = b"openssh-key-v1\0";
const LINE_WIDTH: usize = 64;

/// One decoded PEM block: type label, RFC 1421 headers, and binary contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    label: String,
    headers: Vec<(String, String)>,
    contents: Vec<u8>,
}

impl PemBlock {
    /// Decode the first PEM block in `input`.
    ///
    /// Text before the BEGIN line is ignored. Anything other than whitespace
    /// after the END line is rejected, so multi-block files fail here.
    pub fn decode(input: &str) -> Result<Self> {
        let start = input
            .find(BEGIN)
            .ok_or_else(|| Error::Format("no PEM block found".to_string()))?;
        let rest = &input[start..];

        let mut lines = rest.split_inclusive('\n');
        let mut consumed = 0;

        let first = lines.next().unwrap_or_default();
        consumed += first.len();
        let label = boundary_label(first.trim_end(), BEGIN)
            .ok_or_else(|| Error::Format(format!("invalid PEM header line `{}`", first.trim_end())))?
            .to_string();
        let end_line = format!("{END}{label}{DASHES}");

        let mut headers = Vec::new();
        let mut body = String::new();
        let mut in_headers = true;
        let mut closed = false;

        for raw in lines {
            consumed += raw.len();
            let line = raw.trim_end();

            if line == end_line {
                closed = true;
                break;
            }
            if line.starts_with(DASHES) {
                return Err(Error::Format(format!(
                    "expected `{end_line}`, found `{line}`"
                )));
            }

            if in_headers {
                if let Some((key, value)) = line.split_once(':') {
                    headers.push((key.trim().to_string(), value.trim().to_string()));
                    continue;
                }
                in_headers = false;
                if line.is_empty() {
                    continue;
                }
            }
            body.push_str(line.trim());
        }

        if !closed {
            return Err(Error::Format(format!("missing `{end_line}`")));
        }

        if !rest[consumed..].trim().is_empty() {
            return Err(Error::Format(
                "unexpected data after the first PEM block".to_string(),
            ));
        }

        let contents = STANDARD
            .decode(body.as_bytes())
            .map_err(|e| Error::Format(format!("invalid base64 in PEM body: {e}")))?;

        Ok(Self {
            label,
            headers,
            contents,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the block needs a passphrase before it can be parsed.
    pub fn is_encrypted(&self) -> bool {
        if self.label == "ENCRYPTED PRIVATE KEY" {
            return true;
        }

        let legacy = self
            .header("Proc-Type")
            .is_some_and(|value| value.contains("ENCRYPTED"))
            || self.header("DEK-Info").is_some();
        if legacy {
            return true;
        }

        if self.label == "OPENSSH PRIVATE KEY" {
            return openssh_cipher(&self.contents).is_some_and(|cipher| cipher != "none");
        }

        false
    }

    /// Re-encode the block as PEM text, keeping the label and headers.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{BEGIN}{}{DASHES}", self.label);
        for (key, value) in &self.headers {
            let _ = writeln!(out, "{key}: {value}");
        }
        if !self.headers.is_empty() {
            out.push('\n');
        }

        let body = STANDARD.encode(&self.contents);
        for chunk in body.as_bytes().chunks(LINE_WIDTH) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }

        let _ = writeln!(out, "{END}{}{DASHES}", self.label);
        out
    }
}

fn boundary_label<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)?.strip_suffix(DASHES)
}

/// Cipher name from an `openssh-key-v1` blob.
fn openssh_cipher(contents: &[u8]) -> Option<&str> {
    let rest = contents.strip_prefix(OPENSSH_MAGIC)?;
    let len = u32::from_be_bytes(rest.get(..4)?.try_into().ok()?) as usize;
    std::str::from_utf8(rest.get(4..4 + len)?).ok()
}
