//! Credentials for the model service.
//!
//! Values come from the process environment. A `.env` in the working
//! directory is loaded first, then `<config_dir>/invoice-crosscheck/.env`
//! so installed copies can keep credentials next to the user profile.
//! `dotenvy` never overrides variables that are already set.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENDPOINT_VAR: &str = "AZURE_OPENAI_ENDPOINT";
pub const API_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
pub const DEPLOYMENT_VAR: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const TIMEOUT_VAR: &str = "AZURE_OPENAI_TIMEOUT_SECS";

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const APP_DIR: &str = "invoice-crosscheck";

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub timeout: Duration,
}

/// Per-user `.env` location, if the platform has a config directory.
pub fn user_env_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(".env"))
}

pub fn load_env() {
    let _ = dotenvy::dotenv();
    if let Some(path) = user_env_path() {
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(()) => tracing::debug!("Loaded credentials from {}", path.display()),
                Err(e) => tracing::warn!("Could not load {}: {}", path.display(), e),
            }
        }
    }
}

impl AzureConfig {
    /// Load `.env` files, then read the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = get(ENDPOINT_VAR).ok_or(ConfigError::Missing(ENDPOINT_VAR))?;
        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let deployment = get(DEPLOYMENT_VAR).unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());
        let timeout_secs = match get(TIMEOUT_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: TIMEOUT_VAR,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            deployment,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// "configured" when both required credentials are present, else "not_configured".
pub fn config_status() -> &'static str {
    match AzureConfig::from_env() {
        Ok(_) => "configured",
        Err(_) => "not_configured",
    }
}
