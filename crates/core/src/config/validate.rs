use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Endpoint URLs are http(s)
/// - Upload limits and poll interval are non-zero
/// - The extension allow-list is not empty
/// - Server port is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (name, url) in [
        ("endpoints.submit_url", &config.endpoints.submit_url),
        ("endpoints.status_url", &config.endpoints.status_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL, got {:?}",
                name, url
            )));
        }
    }

    let uploads = &config.uploads;
    if uploads.concurrent_upload_limit == 0 {
        return Err(ConfigError::ValidationError(
            "uploads.concurrent_upload_limit must be at least 1".to_string(),
        ));
    }
    if uploads.status_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "uploads.status_poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if uploads.max_file_size_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "uploads.max_file_size_bytes cannot be 0".to_string(),
        ));
    }
    if uploads.allowed_extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "uploads.allowed_extensions cannot be empty".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointsConfig, ServerConfig, TransportConfig};
    use crate::orchestrator::OrchestratorConfig;

    fn valid_config() -> Config {
        Config {
            endpoints: EndpointsConfig {
                submit_url: "https://studio.example.com/videos/course".to_string(),
                status_url: "https://studio.example.com/encodings/course".to_string(),
            },
            uploads: OrchestratorConfig::default(),
            transport: TransportConfig::default(),
            server: ServerConfig::default(),
            seed_path: None,
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_limit_fails() {
        let mut config = valid_config();
        config.uploads.concurrent_upload_limit = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("concurrent_upload_limit"));
    }

    #[test]
    fn test_validate_non_http_endpoint_fails() {
        let mut config = valid_config();
        config.endpoints.status_url = "ftp://example.com/status".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("endpoints.status_url"));
    }

    #[test]
    fn test_validate_empty_allow_list_fails() {
        let mut config = valid_config();
        config.uploads.allowed_extensions.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = valid_config();
        config.uploads.status_poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }
}
