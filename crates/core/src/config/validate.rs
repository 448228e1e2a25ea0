use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Download concurrency ceiling is at least 1
/// - Download and complete directories differ
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.downloads.active_limit == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.active_limit must be at least 1".to_string(),
        ));
    }

    if config.downloads.download_dir == config.downloads.complete_dir {
        return Err(ConfigError::ValidationError(
            "downloads.download_dir and downloads.complete_dir must differ".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[upstream]
base_url = "https://ibl.example/v1"

[downloads]
download_dir = "/dl"
complete_dir = "/done"

[cli]
path = "/usr/bin/get_iplayer"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_zero_active_limit_fails() {
        let mut config = valid_config();
        config.downloads.active_limit = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_same_dirs_fails() {
        let mut config = valid_config();
        config.downloads.complete_dir = config.downloads.download_dir.clone();
        assert!(validate_config(&config).is_err());
    }
}
