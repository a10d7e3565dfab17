//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = serde_yaml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Semantic checks that serde cannot express.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if !config.directories.config.is_dir() {
        errors.push(format!(
            "directories.config path {} does not exist",
            config.directories.config.display()
        ));
    }
    if !config.directories.common.is_dir() {
        errors.push(format!(
            "directories.common path {} does not exist",
            config.directories.common.display()
        ));
    }
    if let Some(secrets) = &config.directories.secrets {
        if !secrets.is_dir() {
            errors.push(format!(
                "directories.secrets path {} does not exist",
                secrets.display()
            ));
        }
    }
    if config.auth.networks.whitelist.is_empty() {
        errors.push("auth.networks.whitelist must not be empty".to_string());
    }
    if config.auth.max_auth_fails_per_15_min == 0 {
        errors.push("auth.max_auth_fails_per_15_min must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("config")).unwrap();
        fs::create_dir(dir.path().join("common")).unwrap();
        let config_file = dir.path().join("scs-configuration.yaml");
        fs::write(
            &config_file,
            format!(
                "directories:\n  config: {}\n  common: {}\n",
                dir.path().join("config").display(),
                dir.path().join("common").display(),
            ),
        )
        .unwrap();

        let config = load_config(&config_file).unwrap();
        assert!(config.environments.cache);
        assert_eq!(config.auth.max_auth_fails_per_15_min, 10);
    }

    #[test]
    fn test_missing_directory_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("scs-configuration.yaml");
        fs::write(&config_file, "directories:\n  config: /nonexistent\n").unwrap();

        let result = load_config(&config_file);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
