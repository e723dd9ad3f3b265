use crate::{ConfigError, LoggingConfig, PdeConfig};

impl PdeConfig {
    /// Checks the values serde cannot: regexes compile, durations are usable.
    ///
    /// An unparsable logging level is only a warning; tracing falls back to `info`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pattern) = self.classpath.test_plugin_pattern.as_deref() {
            let pattern = pattern.trim();
            if !pattern.is_empty() {
                regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
                    ConfigError::InvalidValue {
                        key: "classpath.test_plugin_pattern",
                        message: err.to_string(),
                    }
                })?;
            }
        }

        if self.classpath.implicit_dependencies.iter().any(|id| id.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "classpath.implicit_dependencies",
                message: "bundle ids must not be empty".to_string(),
            });
        }

        if self.container.state_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "container.state_dir",
                message: "must not be empty".to_string(),
            });
        }

        let normalized = LoggingConfig::normalize_level_directives(&self.logging.level);
        if tracing_subscriber::EnvFilter::try_new(&normalized).is_err() {
            tracing::warn!(
                target = "pde.config",
                level = %self.logging.level,
                "invalid logging level; falling back to info"
            );
        }

        Ok(())
    }
}
