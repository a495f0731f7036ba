use crate::peer::types::ServerConfig;
use rand::Rng;

pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

/// Prefixes an ICE server URL with its scheme when the config omits it.
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    let url = config.url.trim();
    if ["stun:", "stuns:", "turn:", "turns:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
    {
        url.to_string()
    } else {
        let scheme = if config.is_turn() { "turn:" } else { "stun:" };
        format!("{}{}", scheme, url)
    }
}
