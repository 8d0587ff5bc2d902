//! core::pattern
//!
//! Filters that select branches and files.
//!
//! - [`BranchFilter`] matches short branch names (`main`, not
//!   `refs/heads/main`) against a regular expression.
//! - [`PathFilter`] matches slash separated file paths relative to the
//!   repository root, either with a regular expression or a glob.
//!
//! Regular expressions are unanchored: `ya?ml` matches `dir/a.yaml`. Anchor
//! explicitly (`^main$`) for exact matches. Globs match the full path and
//! `*` does not cross a `/`, so `*.yaml` only selects top-level files while
//! `**/*.yaml` selects them at any depth.

use std::fmt;
use std::str::FromStr;

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from compiling filters.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid glob {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("unknown filter syntax: {0} (expected 'regex' or 'glob')")]
    UnknownSyntax(String),
}

/// Selects branches by short name.
#[derive(Debug, Clone)]
pub struct BranchFilter {
    regex: Regex,
}

impl BranchFilter {
    /// Compile a branch filter.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// Whether the short branch name matches.
    pub fn is_match(&self, branch: &str) -> bool {
        self.regex.is_match(branch)
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// How a file filter pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSyntax {
    #[default]
    Regex,
    Glob,
}

impl FilterSyntax {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterSyntax::Regex => "regex",
            FilterSyntax::Glob => "glob",
        }
    }
}

impl FromStr for FilterSyntax {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regex" => Ok(FilterSyntax::Regex),
            "glob" => Ok(FilterSyntax::Glob),
            other => Err(PatternError::UnknownSyntax(other.to_string())),
        }
    }
}

impl fmt::Display for FilterSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects files by path.
#[derive(Debug, Clone)]
pub enum PathFilter {
    Regex(Regex),
    Glob { pattern: String, matcher: GlobMatcher },
}

impl PathFilter {
    /// Compile a file filter with the given syntax.
    ///
    /// # Example
    ///
    /// ```
    /// use qyt::core::pattern::{FilterSyntax, PathFilter};
    ///
    /// let regex = PathFilter::new(r"(.+)\.ya?ml", FilterSyntax::Regex).unwrap();
    /// assert!(regex.is_match("deploy/values.yml"));
    ///
    /// let glob = PathFilter::new("*.yaml", FilterSyntax::Glob).unwrap();
    /// assert!(glob.is_match("a.yaml"));
    /// assert!(!glob.is_match("b/b.yaml"));
    /// ```
    pub fn new(pattern: &str, syntax: FilterSyntax) -> Result<Self, PatternError> {
        match syntax {
            FilterSyntax::Regex => Regex::new(pattern)
                .map(PathFilter::Regex)
                .map_err(|source| PatternError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                }),
            FilterSyntax::Glob => {
                let glob = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|source| PatternError::InvalidGlob {
                        pattern: pattern.to_string(),
                        source,
                    })?;
                Ok(PathFilter::Glob {
                    pattern: pattern.to_string(),
                    matcher: glob.compile_matcher(),
                })
            }
        }
    }

    /// Whether the path matches.
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            PathFilter::Regex(regex) => regex.is_match(path),
            PathFilter::Glob { matcher, .. } => matcher.is_match(path),
        }
    }

    pub fn syntax(&self) -> FilterSyntax {
        match self {
            PathFilter::Regex(_) => FilterSyntax::Regex,
            PathFilter::Glob { .. } => FilterSyntax::Glob,
        }
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        match self {
            PathFilter::Regex(regex) => regex.as_str(),
            PathFilter::Glob { pattern, .. } => pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_filter {
        use super::*;

        #[test]
        fn match_all() {
            let filter = BranchFilter::new(".*").unwrap();
            assert!(filter.is_match("main"));
            assert!(filter.is_match("feature/x"));
        }

        #[test]
        fn unanchored() {
            let filter = BranchFilter::new("ma").unwrap();
            assert!(filter.is_match("main"));
            assert!(filter.is_match("release/ma"));
            assert!(!filter.is_match("dev"));
        }

        #[test]
        fn anchored() {
            let filter = BranchFilter::new("^main$").unwrap();
            assert!(filter.is_match("main"));
            assert!(!filter.is_match("qyt/main"));
        }

        #[test]
        fn malformed() {
            let err = BranchFilter::new("(main").unwrap_err();
            assert!(matches!(err, PatternError::InvalidRegex { .. }));
            assert!(err.to_string().contains("(main"));
        }
    }

    mod path_filter {
        use super::*;

        #[test]
        fn default_regex_matches_nested_yaml() {
            let filter = PathFilter::new(r"(.+)\.ya?ml", FilterSyntax::Regex).unwrap();
            assert!(filter.is_match("a.yaml"));
            assert!(filter.is_match("b/b.yml"));
            assert!(!filter.is_match("README.md"));
        }

        #[test]
        fn glob_star_stays_in_directory() {
            let filter = PathFilter::new("b/*.yaml", FilterSyntax::Glob).unwrap();
            assert!(filter.is_match("b/b.yaml"));
            assert!(!filter.is_match("b/c/d.yaml"));
            assert!(!filter.is_match("a.yaml"));
        }

        #[test]
        fn glob_double_star() {
            let filter = PathFilter::new("**/*.yaml", FilterSyntax::Glob).unwrap();
            assert!(filter.is_match("a.yaml"));
            assert!(filter.is_match("b/c/d.yaml"));
        }

        #[test]
        fn malformed_glob() {
            let err = PathFilter::new("a[", FilterSyntax::Glob).unwrap_err();
            assert!(matches!(err, PatternError::InvalidGlob { .. }));
        }

        #[test]
        fn reports_syntax_and_source() {
            let filter = PathFilter::new("*.yml", FilterSyntax::Glob).unwrap();
            assert_eq!(filter.syntax(), FilterSyntax::Glob);
            assert_eq!(filter.as_str(), "*.yml");
        }
    }

    mod filter_syntax {
        use super::*;

        #[test]
        fn parse() {
            assert_eq!("regex".parse::<FilterSyntax>().unwrap(), FilterSyntax::Regex);
            assert_eq!("glob".parse::<FilterSyntax>().unwrap(), FilterSyntax::Glob);
            assert!("fnmatch".parse::<FilterSyntax>().is_err());
        }

        #[test]
        fn default_is_regex() {
            assert_eq!(FilterSyntax::default(), FilterSyntax::Regex);
        }
    }
}
