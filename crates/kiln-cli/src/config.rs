//! CLI configuration from environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use kiln_recipe::SchemaOptions;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliConfig {
    /// Registry manifest. None = no registered steps.
    pub registry_path: Option<PathBuf>,
    /// Reject recipes without an `input` section.
    pub require_input: bool,
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            registry_path: std::env::var("KILN_REGISTRY")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            require_input: std::env::var("KILN_REQUIRE_INPUT")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid KILN_REQUIRE_INPUT")?,
        })
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            require_input: self.require_input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid races.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in ["KILN_REGISTRY", "KILN_REQUIRE_INPUT"] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = CliConfig::from_env().unwrap();
        assert_eq!(config, CliConfig::default());
        assert!(!config.schema_options().require_input);

        clear_env();
    }

    #[test]
    fn from_env_with_all_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var("KILN_REGISTRY", "/etc/kiln/steps.yaml");
            std::env::set_var("KILN_REQUIRE_INPUT", "true");
        }

        let config = CliConfig::from_env().unwrap();
        assert_eq!(
            config.registry_path,
            Some(PathBuf::from("/etc/kiln/steps.yaml"))
        );
        assert!(config.schema_options().require_input);

        clear_env();
    }

    #[test]
    fn from_env_blank_registry_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var("KILN_REGISTRY", "  ");
        }

        let config = CliConfig::from_env().unwrap();
        assert_eq!(config.registry_path, None);

        clear_env();
    }

    #[test]
    fn from_env_invalid_require_input() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var("KILN_REQUIRE_INPUT", "sometimes");
        }

        let result = CliConfig::from_env();
        assert!(result.is_err());

        clear_env();
    }
}
