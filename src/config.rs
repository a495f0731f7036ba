use crate::errors::ConfigError;
use crate::peer::types::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_SERVER: &str = "CAMLINK_SERVER";
pub const ENV_CAMERA_ID: &str = "CAMLINK_CAMERA_ID";
pub const ENV_TICKET: &str = "CAMLINK_TICKET";
pub const ENV_ICE_SERVERS: &str = "CAMLINK_ICE_SERVERS";
pub const ENV_ICE_USERNAME: &str = "CAMLINK_ICE_USERNAME";
pub const ENV_ICE_CREDENTIAL: &str = "CAMLINK_ICE_CREDENTIAL";

/// Public STUN servers used when nothing else is configured.
pub const DEFAULT_STUN_URLS: [&str; 3] = [
    "stun:stun.stunprotocol.org:3478",
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

pub fn default_ice_servers() -> Vec<ServerConfig> {
    DEFAULT_STUN_URLS
        .iter()
        .enumerate()
        .map(|(i, url)| ServerConfig::stun(format!("default-stun-{}", i), *url))
        .collect()
}

/// Everything the viewer needs to reach one camera.
///
/// Only the driver reads this; the negotiation engine never sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Relay server as `host[:port]`, or a full `ws://`/`wss://` base URL
    pub server: String,
    pub camera_id: String,
    /// Short-lived access ticket appended to the relay URL
    pub ticket: String,
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<ServerConfig>,
}

impl ViewerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };

        let server = required(ENV_SERVER)?;
        let camera_id = required(ENV_CAMERA_ID)?;
        let ticket = required(ENV_TICKET)?;

        let ice_servers = match lookup(ENV_ICE_SERVERS) {
            Some(list) if !list.trim().is_empty() => {
                let username = lookup(ENV_ICE_USERNAME);
                let credential = lookup(ENV_ICE_CREDENTIAL);
                list.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .enumerate()
                    .map(|(i, url)| {
                        let is_turn = url.starts_with("turn");
                        ServerConfig {
                            id: format!("env-{}", i),
                            r#type: (if is_turn { "turn" } else { "stun" }).to_string(),
                            url: url.to_string(),
                            username: if is_turn { username.clone() } else { None },
                            credential: if is_turn { credential.clone() } else { None },
                        }
                    })
                    .collect()
            }
            _ => default_ice_servers(),
        };

        Ok(Self {
            server,
            camera_id,
            ticket,
            ice_servers,
        })
    }

    /// Reads a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::MissingValue("server"));
        }
        if self.camera_id.trim().is_empty() {
            return Err(ConfigError::MissingValue("camera_id"));
        }
        if self.ticket.trim().is_empty() {
            return Err(ConfigError::MissingValue("ticket"));
        }

        for server in &self.ice_servers {
            if server.url.trim().is_empty() {
                return Err(ConfigError::InvalidIceServer {
                    id: server.id.clone(),
                    reason: "server URL cannot be empty".into(),
                });
            }
            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(ConfigError::InvalidIceServer {
                    id: server.id.clone(),
                    reason: "TURN servers require username and credential".into(),
                });
            }
        }
        Ok(())
    }

    /// `wss://{server}/rest/v3/devices/{camera_id}/webrtc?_ticket={ticket}`
    pub fn relay_url(&self) -> String {
        let server = self.server.trim().trim_end_matches('/');
        let base = if server.starts_with("ws://") || server.starts_with("wss://") {
            server.to_string()
        } else {
            format!("wss://{}", server)
        };
        format!(
            "{}/rest/v3/devices/{}/webrtc?_ticket={}",
            base,
            urlencoding::encode(&self.camera_id),
            urlencoding::encode(&self.ticket)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn sample() -> ViewerConfig {
        ViewerConfig {
            server: "cams.example.com:7443".into(),
            camera_id: "cam-42".into(),
            ticket: "abc123".into(),
            ice_servers: default_ice_servers(),
        }
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_relay_url() {
        assert_eq!(
            sample().relay_url(),
            "wss://cams.example.com:7443/rest/v3/devices/cam-42/webrtc?_ticket=abc123"
        );
    }

    #[test]
    fn test_relay_url_keeps_explicit_scheme_and_encodes_ticket() {
        let config = ViewerConfig {
            server: "ws://127.0.0.1:9000/".into(),
            ticket: "a+b/c=".into(),
            ..sample()
        };
        assert_eq!(
            config.relay_url(),
            "ws://127.0.0.1:9000/rest/v3/devices/cam-42/webrtc?_ticket=a%2Bb%2Fc%3D"
        );
    }

    #[test]
    fn test_from_lookup_requires_ticket() {
        let lookup = lookup_from(&[(ENV_SERVER, "host:1"), (ENV_CAMERA_ID, "cam")]);
        let err = ViewerConfig::from_lookup(lookup).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_TICKET)));
    }

    #[test]
    fn test_from_lookup_defaults_ice_servers() {
        let lookup = lookup_from(&[
            (ENV_SERVER, "host:1"),
            (ENV_CAMERA_ID, "cam"),
            (ENV_TICKET, "t"),
        ]);
        let config = ViewerConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.ice_servers.len(), DEFAULT_STUN_URLS.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_parses_ice_list() {
        let lookup = lookup_from(&[
            (ENV_SERVER, "host:1"),
            (ENV_CAMERA_ID, "cam"),
            (ENV_TICKET, "t"),
            (ENV_ICE_SERVERS, "stun:a.example:3478, turn:b.example:3478"),
            (ENV_ICE_USERNAME, "user"),
            (ENV_ICE_CREDENTIAL, "pass"),
        ]);
        let config = ViewerConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.ice_servers.len(), 2);
        assert_eq!(config.ice_servers[0].r#type, "stun");
        assert!(config.ice_servers[0].username.is_none());
        assert!(config.ice_servers[1].is_turn());
        assert_eq!(config.ice_servers[1].credential.as_deref(), Some("pass"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_turn_without_credentials() {
        let mut config = sample();
        config.ice_servers.push(ServerConfig {
            id: "relay".into(),
            r#type: "turn".into(),
            url: "turn:relay.example.com:3478".into(),
            username: None,
            credential: None,
        });
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIceServer { ref id, .. } if id == "relay"));
    }

    #[test]
    fn test_validate_rejects_empty_camera() {
        let config = ViewerConfig {
            camera_id: "  ".into(),
            ..sample()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue("camera_id"))
        ));
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server = "cams.example.com"
camera_id = "front-door"
ticket = "xyz"

[[ice_servers]]
id = "primary"
type = "stun"
url = "stun.l.google.com:19302"
"#
        )
        .unwrap();

        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.camera_id, "front-door");
        assert_eq!(config.ice_servers.len(), 1);
        assert_eq!(config.ice_servers[0].id, "primary");
    }

    #[test]
    fn test_load_toml_uses_default_servers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "server = \"h\"\ncamera_id = \"c\"\nticket = \"t\"\n").unwrap();
        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.ice_servers, default_ice_servers());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ViewerConfig::load("/nonexistent/camlink.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
