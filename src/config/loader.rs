//! Configuration loading from disk and the environment.

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{GatekeeperConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};
use crate::security::rate_limit::LimitClass;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, message: String },
    Validation(Vec<ValidationError>),
    Header(axum::http::header::InvalidHeaderValue),
    Upstream(axum::http::uri::InvalidUri),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Header(e) => write!(f, "Invalid security header value: {}", e),
            ConfigError::Upstream(e) => write!(f, "Invalid upstream address: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the effective configuration: file (or defaults), then process
/// environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<GatekeeperConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => GatekeeperConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply `GATEKEEPER_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut GatekeeperConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEKEEPER_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATEKEEPER_UPSTREAM_ADDRESS") {
        config.upstream.address = v;
    }
    if let Some(v) = lookup("GATEKEEPER_STORE_URL").or_else(|| lookup("REDIS_URL")) {
        config.store.url = if v.trim().is_empty() { None } else { Some(v) };
    }

    for class in LimitClass::ALL {
        let prefix = format!("GATEKEEPER_LIMIT_{}", class.as_str().to_uppercase());

        let var = format!("{prefix}_REQUESTS");
        if let Some(v) = lookup(&var) {
            config.rate_limit.policy_mut(class).requests = parse_var(&var, &v)?;
        }
        let var = format!("{prefix}_WINDOW_SECS");
        if let Some(v) = lookup(&var) {
            config.rate_limit.policy_mut(class).window_secs = parse_var(&var, &v)?;
        }
    }

    if let Some(v) = lookup("GATEKEEPER_SUSPICIOUS_PATTERNS") {
        config.validation.suspicious_patterns = split_list(&v);
    }
    if let Some(v) = lookup("GATEKEEPER_MAX_BODY_BYTES") {
        config.validation.max_body_bytes = parse_var("GATEKEEPER_MAX_BODY_BYTES", &v)?;
    }
    if let Some(v) = lookup("GATEKEEPER_CSP_CONNECT_ORIGINS") {
        config.headers.connect_src_origins = split_list(&v);
    }
    if let Some(v) = lookup("GATEKEEPER_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("GATEKEEPER_LOG_FORMAT") {
        config.observability.log_format = match v.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::Env {
                    var: "GATEKEEPER_LOG_FORMAT".into(),
                    message: format!("unknown format '{other}'"),
                })
            }
        };
    }

    Ok(())
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
