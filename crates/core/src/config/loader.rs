use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for overrides.
const ENV_PREFIX: &str = "VIDUP_";

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore, e.g. `VIDUP_UPLOADS__CONCURRENT_UPLOAD_LIMIT=2`.
/// A relative `seed_path` is taken relative to the config file's directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    if let (Some(seed), Some(dir)) = (config.seed_path.as_ref(), path.parent()) {
        if seed.is_relative() {
            config.seed_path = Some(dir.join(seed));
        }
    }

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
