//! core::config::schema
//!
//! Configuration schema types.
//!
//! The global and repo files share one schema, [`FileConfig`]. Every key is
//! optional; an absent key falls through to the next layer.
//!
//! # Validation
//!
//! Config values are validated after parsing: filters must compile, the
//! branch prefix must form a valid branch name, and the commit template
//! must parse.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::message::MessageTemplate;
use crate::core::pattern::{BranchFilter, FilterSyntax, PathFilter};
use crate::core::types::BranchName;
use crate::query::OutputFormat;

/// Contents of one configuration file.
///
/// # Example
///
/// ```toml
/// branch_filter = "^release/"
/// file_filter = "deploy/**/*.yaml"
/// file_filter_syntax = "glob"
/// new_branch_prefix = "bump/"
/// commit_template = "bump {{.Branch}}"
/// output = "json"
///
/// [author]
/// name = "Release Bot"
/// email = "release@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Regular expression selecting source branches.
    pub branch_filter: Option<String>,

    /// Pattern selecting files inside each branch.
    pub file_filter: Option<String>,

    /// How `file_filter` is interpreted.
    pub file_filter_syntax: Option<FilterSyntax>,

    /// Prefix prepended to the source branch name to form the destination.
    pub new_branch_prefix: Option<String>,

    /// Commit message template.
    pub commit_template: Option<String>,

    /// Query output format. Apply always writes YAML.
    pub output: Option<OutputFormat>,

    /// Commit identity.
    pub author: Option<AuthorConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(filter) = &self.branch_filter {
            BranchFilter::new(filter)
                .map_err(|e| ConfigError::InvalidValue(format!("branch_filter: {e}")))?;
        }

        if let Some(filter) = &self.file_filter {
            let syntax = self.file_filter_syntax.unwrap_or_default();
            PathFilter::new(filter, syntax)
                .map_err(|e| ConfigError::InvalidValue(format!("file_filter: {e}")))?;
        }

        if let Some(prefix) = &self.new_branch_prefix {
            validate_prefix(prefix)?;
        }

        if let Some(template) = &self.commit_template {
            MessageTemplate::parse(template)
                .map_err(|e| ConfigError::InvalidValue(format!("commit_template: {e}")))?;
        }

        if let Some(author) = &self.author {
            author.validate()?;
        }

        Ok(())
    }
}

/// Check that `prefix` can be prepended to a branch name.
pub(crate) fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    BranchName::new(format!("{prefix}main"))
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(format!("new_branch_prefix {prefix:?}: {e}")))
}

/// Commit identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("name", &self.name), ("email", &self.email)] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "author.{key} cannot be empty"
                    )));
                }
                if value.contains(['<', '>', '\n']) {
                    return Err(ConfigError::InvalidValue(format!(
                        "author.{key} cannot contain '<', '>' or newlines"
                    )));
                }
            }
        }
        Ok(())
    }
}
