//! TOML configuration for controllers and the `docctl` binary.
//!
//! ```toml
//! collection = "articles"
//!
//! [search]
//! search_fields = ["title", "body"]
//! auto_regexp_search = true
//! post_match_keywords = ["stats."]
//!
//! [logging]
//! level = "debug"
//! dir = "logs"
//! retention = 7
//! ```

use crate::controller::ControllerOptions;
use crate::errors::ControllerError;
use crate::query::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DOCCTL_CONFIG";
pub const LOG_LEVEL_ENV: &str = "DOCCTL_LOG_LEVEL";
pub const DEFAULT_CONFIG_FILE: &str = "docctl.toml";
const DEFAULT_RETENTION: u32 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error|warn|info|debug|trace|off`
    pub level: Option<String>,
    /// Rolling log files go under this directory; stderr when unset.
    pub dir: Option<PathBuf>,
    pub retention: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collection: Option<String>,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// # Errors
    /// `Toml` when the text is not a valid configuration.
    pub fn from_toml_str(s: &str) -> Result<Self, ControllerError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// `Io` when the file cannot be read, `Toml` when it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ControllerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ControllerError::Io(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_toml_str(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Loads the configuration the process should use.
    ///
    /// Precedence: `explicit` > `$DOCCTL_CONFIG` > `./docctl.toml` > defaults.
    /// `$DOCCTL_LOG_LEVEL` overrides the logging level of whatever was loaded.
    ///
    /// # Errors
    /// `Config` when `explicit` does not exist; read and parse failures.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ControllerError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(explicit, |key| std::env::var(key).ok(), &cwd)
    }

    /// [`AppConfig::load`] with the environment and working directory supplied by the caller.
    ///
    /// # Errors
    /// As [`AppConfig::load`].
    pub fn load_with<F>(explicit: Option<&Path>, env: F, cwd: &Path) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit
            && !path.exists()
        {
            return Err(ControllerError::Config(format!("config file {} not found", path.display())));
        }
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(env(CONFIG_ENV).map(PathBuf::from))
            .chain(std::iter::once(cwd.join(DEFAULT_CONFIG_FILE)));
        let mut cfg = Self::default();
        for path in candidates {
            if path.exists() {
                cfg = Self::from_file(&path)?;
                break;
            }
        }
        if let Some(level) = env(LOG_LEVEL_ENV) {
            cfg.logging.level = Some(level);
        }
        Ok(cfg)
    }

    #[must_use]
    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }

    #[must_use]
    pub fn log_retention(&self) -> u32 {
        self.logging.retention.unwrap_or(DEFAULT_RETENTION)
    }

    /// Controller options carrying the `[search]` table.
    #[must_use]
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions { search: self.search.clone(), build_aggregate: None }
    }

    /// Rolling files under `logging.dir` when set, stderr otherwise.
    ///
    /// # Errors
    /// Logger initialization failures.
    pub fn init_logging(&self) -> Result<(), Box<dyn std::error::Error>> {
        match &self.logging.dir {
            Some(dir) => {
                let name = self.collection.as_deref().unwrap_or("docctl");
                crate::logger::init_for_collection_in(dir, name, self.log_level(), self.log_retention())?;
                Ok(())
            }
            None => crate::logger::init_console(self.log_level()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_tables() {
        let cfg = AppConfig::from_toml_str(
            r#"
            collection = "articles"
            [search]
            search_fields = ["title"]
            auto_regexp_search = true
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.collection.as_deref(), Some("articles"));
        assert_eq!(cfg.search.search_fields, vec!["title".to_string()]);
        assert!(cfg.search.auto_regexp_search);
        assert!(cfg.search.post_match_keywords.is_empty());
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.log_retention(), 7);
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(AppConfig::from_toml_str("search = 3"), Err(ControllerError::Toml(_))));
    }
}
