use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use mytutor_gateway::relay::RelayPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub policy: RelayPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("MYTUTOR_PORT", "4000");
        let port: u16 = port
            .parse()
            .with_context(|| format!("MYTUTOR_PORT is not a valid port: '{}'", port))?;

        Ok(Self {
            host: var("MYTUTOR_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(var("MYTUTOR_DB_PATH", "mytutor.db")),
            jwt_secret: var("MYTUTOR_JWT_SECRET", "dev-secret-change-me"),
            policy: RelayPolicy {
                verify_membership: parse_bool(
                    "MYTUTOR_VERIFY_MEMBERSHIP",
                    &var("MYTUTOR_VERIFY_MEMBERSHIP", "true"),
                )?,
                bind_sender: parse_bool("MYTUTOR_BIND_SENDER", &var("MYTUTOR_BIND_SENDER", "true"))?,
            },
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{} must be a boolean, got '{}'", key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.db_path, PathBuf::from("mytutor.db"));
        assert!(cfg.policy.verify_membership);
        assert!(cfg.policy.bind_sender);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("MYTUTOR_PORT", "8080"),
            ("MYTUTOR_VERIFY_MEMBERSHIP", "off"),
            ("MYTUTOR_BIND_SENDER", "No"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.policy.verify_membership);
        assert!(!cfg.policy.bind_sender);
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(config(&[("MYTUTOR_PORT", "eighty")]).is_err());
        assert!(config(&[("MYTUTOR_BIND_SENDER", "maybe")]).is_err());
    }
}
