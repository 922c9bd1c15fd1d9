use crate::core::config::AppConfig;
use anyhow::{Context, Result, bail};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example configuration to the default config location.
pub fn setup() -> Result<()> {
    setup_at_path(AppConfig::default_config_path()?)
}

/// Writes the example configuration to `path`. An existing file is never
/// overwritten.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!("Configuration file already exists at {}", path.display())
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create config file at {}", path.display()));
        }
    };
    file.write_all(EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    let config = AppConfig::load_from_path(path)?;
    tracing::info!(backend = ?config.backend, "Created default configuration at {}", path.display());
    println!("Created configuration at {}", path.display());
    println!(
        "Transactions will be stored under {}",
        config.default_data_path()?.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BackendConfig;
    use crate::core::filter::DateFilter;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_config_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        setup_at_path(&config_path)?;

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path)?;
        assert!(content.contains("backend:"));
        assert!(content.contains("# Example configuration file for fintrack"));

        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        std::fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&config_path)?, "test");

        Ok(())
    }

    #[test]
    fn test_example_config_is_valid_yaml() -> Result<()> {
        let config: AppConfig = serde_yaml::from_str(EXAMPLE_CONFIG)
            .context("Failed to parse example config as YAML")?;

        assert_eq!(config.backend, BackendConfig::Local);
        assert_eq!(config.user, "local");
        assert_eq!(config.filter, DateFilter::Month);
        assert!(config.data_path.is_none());

        Ok(())
    }
}
