// ABOUTME: Remote target address parsing for SSH connections.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@[::1]:port".

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
}

impl Target {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user, rest) = match s.rsplit_once('@') {
            Some(("", _)) => return Err(format!("empty user in `{s}`")),
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, s),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            // IPv6 literal: [addr] or [addr]:port
            let (addr, after) = bracketed
                .split_once(']')
                .ok_or_else(|| format!("unterminated IPv6 address in `{s}`"))?;
            let port = match after.strip_prefix(':') {
                Some(port) => Some(parse_port(port)?),
                None if after.is_empty() => None,
                None => return Err(format!("unexpected `{after}` after IPv6 address")),
            };
            (addr, port)
        } else if let Some((host, port)) = rest.rsplit_once(':') {
            if host.contains(':') {
                return Err(format!(
                    "ambiguous host `{rest}`: write IPv6 addresses in brackets, e.g. `[{rest}]` or `[{rest}]:22`"
                ));
            }
            (host, Some(parse_port(port)?))
        } else {
            (rest, None)
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(Target {
            host: host.to_string(),
            port,
            user,
        })
    }
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("invalid port: {port}"))
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::parse(&s).map_err(serde::de::Error::custom)
    }
}
