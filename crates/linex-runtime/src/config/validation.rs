//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ApiConfig, ChannelConfig, LinexConfig, LogOutput, LoggingConfig, ServerConfig};

/// Validates the entire configuration.
///
/// Missing credentials are reported as `MissingField`.
pub fn validate_config(config: &LinexConfig) -> ConfigResult<()> {
    validate_channel_config(&config.channel)?;
    validate_server_config(&config.server)?;
    validate_api_config(&config.api)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates channel credentials.
fn validate_channel_config(channel: &ChannelConfig) -> ConfigResult<()> {
    channel.secret()?;
    channel.access_token()?;
    Ok(())
}

/// Validates the webhook server settings.
fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    validate_port(server.port)?;
    validate_path(&server.path)?;
    Ok(())
}

/// Validates the API client settings.
fn validate_api_config(api: &ApiConfig) -> ConfigResult<()> {
    validate_url(&api.base_url)?;
    validate_url(&api.data_base_url)?;

    if api.timeout_ms == 0 {
        return Err(ConfigError::validation("Timeout must be greater than 0"));
    }
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates an HTTP(S) URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {:?}", valid_schemes),
        ));
    }

    Ok(())
}

/// Validates a port number.
fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

/// Validates a path.
fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation("Path must start with '/'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> LinexConfig {
        let mut config = LinexConfig::default();
        config.channel.secret = Some("secret".to_string());
        config.channel.access_token = Some("token".to_string());
        config
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_credentials() {
        let result = validate_config(&LinexConfig::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingField { ref field }) if field == "channel.secret"
        ));

        let mut config = valid_config();
        config.channel.access_token = Some("  ".to_string());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "channel.access_token"
        ));
    }

    #[test]
    fn test_validate_server() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidPort(0))));

        let mut config = valid_config();
        config.server.path = "callback".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_api() {
        let mut config = valid_config();
        config.api.base_url = "ftp://api.line.me".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut config = valid_config();
        config.api.timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = valid_config();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("linex.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
