//! TOML-backed server configuration, following the teacher's plain
//! `serde`-derived config struct convention rather than a builder.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use memoriae_runtime::{Address, Amount};

fn default_listen_addr() -> String {
    "127.0.0.1:8645".to_string()
}

fn default_period_seconds() -> i64 {
    86_400
}

fn default_pledge_threshold() -> String {
    "0".to_string()
}

/// Hex-encoded (`0x`-prefixed) addresses and decimal amounts, parsed on
/// demand — kept as plain strings here since `Address`'s derived
/// `Serialize`/`Deserialize` round-trips through its raw byte array, not the
/// hex text a TOML file should carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    pub admin: String,
    pub foundation: String,

    #[serde(default = "default_pledge_threshold")]
    pub pledge_keeper: String,
    #[serde(default = "default_pledge_threshold")]
    pub pledge_provider: String,

    /// Base64/hex HMAC secret gating the RPC handler. `None` disables auth
    /// and every method is reachable (spec §6).
    #[serde(default)]
    pub auth_secret: Option<String>,

    #[serde(default = "default_period_seconds")]
    pub keeper_fee_period_seconds: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid address in config: {0}")]
    Address(String),
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
        let cfg: Config = toml::from_str(&raw)?;
        Ok(cfg)
    }

    pub fn admin_address(&self) -> Result<Address, ConfigError> {
        Address::from_str(&self.admin).map_err(|_| ConfigError::Address(self.admin.clone()))
    }

    pub fn foundation_address(&self) -> Result<Address, ConfigError> {
        Address::from_str(&self.foundation).map_err(|_| ConfigError::Address(self.foundation.clone()))
    }

    pub fn pledge_keeper_amount(&self) -> Result<Amount, ConfigError> {
        Amount::from_str(&self.pledge_keeper).map_err(|_| ConfigError::Address(self.pledge_keeper.clone()))
    }

    pub fn pledge_provider_amount(&self) -> Result<Amount, ConfigError> {
        Amount::from_str(&self.pledge_provider).map_err(|_| ConfigError::Address(self.pledge_provider.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_when_fields_are_absent() {
        let toml_src = r#"
            admin = "0x0101010101010101010101010101010101010101"
            foundation = "0x0202020202020202020202020202020202020202"
        "#;
        let cfg: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:8645");
        assert_eq!(cfg.keeper_fee_period_seconds, 86_400);
        assert!(cfg.auth_secret.is_none());
        assert!(cfg.admin_address().is_ok());
    }
}
