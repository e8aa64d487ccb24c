use std::path::PathBuf;

use anyhow::{Context, Result};

/// Placeholder JWT secrets that must not be used outside development.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "your-secret-key-here"];

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Process configuration, read once at startup and injected from there on.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub cors_origin: String,
    pub auth: AuthConfig,
}

/// Token signing settings.
///
/// New tokens are always signed with `jwt_secret`; tokens signed with any of
/// `previous_secrets` are still accepted so a secret can be rotated without
/// logging everybody out.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub previous_secrets: Vec<String>,
    pub token_ttl: chrono::Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            previous_secrets: Vec::new(),
            token_ttl: chrono::Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        }
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port: u16 = var("HAUL_PORT", "8000")
            .parse()
            .context("HAUL_PORT must be a port number")?;
        let ttl_minutes: i64 = var("HAUL_TOKEN_TTL_MINUTES", &DEFAULT_TOKEN_TTL_MINUTES.to_string())
            .parse()
            .context("HAUL_TOKEN_TTL_MINUTES must be a whole number of minutes")?;
        if ttl_minutes <= 0 {
            anyhow::bail!("HAUL_TOKEN_TTL_MINUTES must be positive");
        }

        let previous_secrets = lookup("HAUL_JWT_PREVIOUS_SECRETS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: var("HAUL_HOST", "0.0.0.0"),
            port,
            db_path: var("HAUL_DB_PATH", "haul.db").into(),
            cors_origin: var("HAUL_CORS_ORIGIN", "http://localhost:3000"),
            auth: AuthConfig {
                jwt_secret: var("HAUL_JWT_SECRET", "dev-secret-change-me"),
                previous_secrets,
                token_ttl: chrono::Duration::minutes(ttl_minutes),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.db_path, PathBuf::from("haul.db"));
        assert_eq!(config.auth.token_ttl, chrono::Duration::minutes(30));
        assert!(config.auth.previous_secrets.is_empty());
        assert!(config.auth.uses_placeholder_secret());
    }

    #[test]
    fn rotation_list_is_split_and_trimmed() {
        let config = config_from(&[
            ("HAUL_JWT_SECRET", "fresh"),
            ("HAUL_JWT_PREVIOUS_SECRETS", " old-1 , ,old-2"),
            ("HAUL_TOKEN_TTL_MINUTES", "90"),
        ])
        .unwrap();
        assert_eq!(config.auth.previous_secrets, vec!["old-1", "old-2"]);
        assert_eq!(config.auth.token_ttl, chrono::Duration::minutes(90));
        assert!(!config.auth.uses_placeholder_secret());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(config_from(&[("HAUL_PORT", "eighty")]).is_err());
        assert!(config_from(&[("HAUL_TOKEN_TTL_MINUTES", "0")]).is_err());
    }
}
