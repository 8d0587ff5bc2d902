//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! qyt has two configuration files:
//! - **Global**: user-level defaults
//! - **Repo**: repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. Environment variables and CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$QYT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/qyt/config.toml`
//! 3. `~/.qyt/config.toml`
//!
//! # Repo Config Location
//!
//! `<git-dir>/qyt/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use qyt::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! println!("branches: {}", config.branch_filter());
//! println!("prefix: {}", config.new_branch_prefix());
//! ```

pub mod schema;

pub use schema::{AuthorConfig, FileConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::pattern::FilterSyntax;
use crate::query::OutputFormat;

/// Branch filter used when none is configured.
pub const DEFAULT_BRANCH_FILTER: &str = ".*";

/// File filter used when none is configured.
pub const DEFAULT_FILE_FILTER: &str = r"(.+)\.ya?ml";

/// Destination branch prefix used when none is configured.
pub const DEFAULT_NEW_BRANCH_PREFIX: &str = "qyt/";

/// Commit message template used when none is configured.
pub const DEFAULT_COMMIT_TEMPLATE: &str = r#"run yq {{printf "%q" .Query}} on {{.Branch}}"#;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all files.
///
/// Accessors apply precedence automatically: repo over global over the
/// built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: FileConfig,
    /// Repository configuration (if a repo file exists)
    pub repo: Option<FileConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// If `git_dir` is provided, also loads `<git_dir>/qyt/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed or
    /// validated. Missing files are not an error (defaults are used).
    pub fn load(git_dir: Option<&Path>) -> Result<Config, ConfigError> {
        let global_path = Self::global_config_location();
        Self::load_from(global_path.as_deref(), git_dir)
    }

    /// Load configuration from an explicit global file and git directory.
    pub fn load_from(
        global_path: Option<&Path>,
        git_dir: Option<&Path>,
    ) -> Result<Config, ConfigError> {
        let (global, global_path) = match global_path {
            Some(path) if path.exists() => (Self::read_file(path)?, Some(path.to_path_buf())),
            _ => (FileConfig::default(), None),
        };

        let (repo, repo_path) = match git_dir.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(Self::read_file(&path)?), Some(path)),
            _ => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// Find the global config file, if any exists.
    pub fn global_config_location() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("QYT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("qyt/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".qyt/config.toml"))
            .filter(|path| path.exists())
    }

    /// Path of the repo config file inside a git directory.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("qyt/config.toml")
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// First value set in repo, then global.
    fn layered<'a, T>(&'a self, get: impl Fn(&'a FileConfig) -> Option<T>) -> Option<T> {
        self.repo.as_ref().and_then(&get).or_else(|| get(&self.global))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Regular expression selecting branches. Defaults to `.*`.
    pub fn branch_filter(&self) -> &str {
        self.layered(|c| c.branch_filter.as_deref())
            .unwrap_or(DEFAULT_BRANCH_FILTER)
    }

    /// Pattern selecting files. Defaults to `(.+)\.ya?ml`.
    pub fn file_filter(&self) -> &str {
        self.layered(|c| c.file_filter.as_deref())
            .unwrap_or(DEFAULT_FILE_FILTER)
    }

    /// Syntax of the file filter. Defaults to regex.
    pub fn file_filter_syntax(&self) -> FilterSyntax {
        self.layered(|c| c.file_filter_syntax).unwrap_or_default()
    }

    /// Prefix for destination branches. Defaults to `qyt/`.
    pub fn new_branch_prefix(&self) -> &str {
        self.layered(|c| c.new_branch_prefix.as_deref())
            .unwrap_or(DEFAULT_NEW_BRANCH_PREFIX)
    }

    /// Commit message template.
    pub fn commit_template(&self) -> &str {
        self.layered(|c| c.commit_template.as_deref())
            .unwrap_or(DEFAULT_COMMIT_TEMPLATE)
    }

    /// Query output format. Defaults to YAML.
    pub fn output(&self) -> OutputFormat {
        self.layered(|c| c.output).unwrap_or_default()
    }

    /// Configured author name, if any.
    pub fn author_name(&self) -> Option<&str> {
        self.layered(|c| c.author.as_ref().and_then(|a| a.name.as_deref()))
    }

    /// Configured author email, if any.
    pub fn author_email(&self) -> Option<&str> {
        self.layered(|c| c.author.as_ref().and_then(|a| a.email.as_deref()))
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn load_empty_defaults() {
        let config = Config::load_from(None, None).unwrap();

        assert_eq!(config.branch_filter(), ".*");
        assert_eq!(config.file_filter(), r"(.+)\.ya?ml");
        assert_eq!(config.file_filter_syntax(), FilterSyntax::Regex);
        assert_eq!(config.new_branch_prefix(), "qyt/");
        assert_eq!(
            config.commit_template(),
            r#"run yq {{printf "%q" .Query}} on {{.Branch}}"#
        );
        assert_eq!(config.output(), OutputFormat::Yaml);
        assert!(config.author_name().is_none());
        assert!(config.global_config_loaded_from().is_none());
    }

    #[test]
    fn load_global_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        write(&path, "new_branch_prefix = \"bump/\"\noutput = \"json\"\n");

        let config = Config::load_from(Some(&path), None).unwrap();

        assert_eq!(config.new_branch_prefix(), "bump/");
        assert_eq!(config.output(), OutputFormat::Json);
        assert_eq!(config.global_config_loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn missing_global_file_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(Some(&temp.path().join("nope.toml")), None).unwrap();
        assert!(config.global_config_loaded_from().is_none());
    }

    #[test]
    fn load_repo_config() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        write(
            &Config::repo_config_path(&git_dir),
            "branch_filter = \"^main$\"\n[author]\nname = \"Bot\"\n",
        );

        let config = Config::load_from(None, Some(&git_dir)).unwrap();

        assert_eq!(config.branch_filter(), "^main$");
        assert_eq!(config.author_name(), Some("Bot"));
        assert!(config.author_email().is_none());
        assert!(config.repo_config_loaded_from().is_some());
    }

    #[test]
    fn precedence_repo_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        write(
            &global,
            "branch_filter = \"release\"\nnew_branch_prefix = \"g/\"\n[author]\nemail = \"g@example.com\"\n",
        );
        let git_dir = temp.path().join("repo.git");
        write(
            &Config::repo_config_path(&git_dir),
            "branch_filter = \"main\"\n",
        );

        let config = Config::load_from(Some(&global), Some(&git_dir)).unwrap();

        assert_eq!(config.branch_filter(), "main");
        assert_eq!(config.new_branch_prefix(), "g/");
        assert_eq!(config.author_email(), Some("g@example.com"));
    }

    #[test]
    fn invalid_value_rejected() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        write(&Config::repo_config_path(&git_dir), "branch_filter = \"(\"\n");

        let result = Config::load_from(None, Some(&git_dir));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        write(&path, "trunk = \"main\"\n");

        let result = Config::load_from(Some(&path), None);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
