//! core::types
//!
//! Strong types for the names and hashes that flow through qyt.
//!
//! # Types
//!
//! - [`BranchName`] - Validated short branch name (`main`, `rel/2.5`)
//! - [`RefName`] - Validated full reference name (`refs/heads/main`)
//! - [`Oid`] - Content hash of a git object (SHA-1, lowercase hex)
//!
//! # Validation
//!
//! These types enforce validity at construction time. A destination branch
//! built from a prefix and a source branch name is validated before any
//! object is staged, so a bad prefix is an input error, not a write error.
//!
//! # Examples
//!
//! ```
//! use qyt::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("rel/2.5").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "refs/heads/rel/2.5");
//! assert_eq!(refname.short(), "rel/2.5");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Namespace holding local branches.
pub const BRANCH_NAMESPACE: &str = "refs/heads/";

/// Check a name against git's refname rules (see `git check-ref-format`).
///
/// Returns a description of the first violated rule.
fn refname_violation(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("name cannot be empty".into());
    }
    if name == "@" {
        return Some("name cannot be '@' (reserved)".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("name cannot start or end with '/'".into());
    }
    if name.ends_with('.') {
        return Some("name cannot end with '.'".into());
    }
    for forbidden in ["..", "@{", "//"] {
        if name.contains(forbidden) {
            return Some(format!("name cannot contain '{forbidden}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name
        .chars()
        .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
    {
        return Some(format!("name cannot contain {c:?}"));
    }

    name.split('/').find_map(|component| {
        if component.starts_with('.') {
            Some("path component cannot start with '.'".to_string())
        } else if component.ends_with(".lock") {
            Some("path component cannot end with '.lock'".to_string())
        } else {
            None
        }
    })
}

/// A validated short branch name.
///
/// This is the name operators match against (`main`, not
/// `refs/heads/main`). It is also what the evaluator sees as `$branch` and
/// what a commit message template receives as `.Branch`.
///
/// # Example
///
/// ```
/// use qyt::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-flag").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        match refname_violation(&name) {
            Some(reason) => Err(TypeError::InvalidBranchName(format!("{name:?}: {reason}"))),
            None => Ok(Self(name)),
        }
    }

    /// Build the destination branch for this branch: `prefix + self`.
    ///
    /// An empty prefix yields the branch itself, which is only writable when
    /// overriding existing branches is allowed.
    ///
    /// # Example
    ///
    /// ```
    /// use qyt::core::types::BranchName;
    ///
    /// let main = BranchName::new("main").unwrap();
    /// assert_eq!(main.with_prefix("qyt/").unwrap().as_str(), "qyt/main");
    /// assert_eq!(main.with_prefix("").unwrap(), main);
    /// ```
    pub fn with_prefix(&self, prefix: &str) -> Result<Self, TypeError> {
        Self::new(format!("{prefix}{}", self.0))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A git object identifier.
///
/// Stored as lowercase hex. Two objects are the same object exactly when
/// their `Oid`s are equal.
///
/// # Example
///
/// ```
/// use qyt::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// assert_eq!(Oid::from_bytes(&oid.to_bytes()).unwrap(), oid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Length in bytes of a SHA-1 object id.
    pub const RAW_LEN: usize = 20;

    /// Create a new validated object id from hex.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not 40 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != Self::RAW_LEN * 2 {
            return Err(TypeError::InvalidOid(format!(
                "expected {} hex characters, got {}",
                Self::RAW_LEN * 2,
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Create an object id from its raw 20-byte form (as stored in trees).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != Self::RAW_LEN {
            return Err(TypeError::InvalidOid(format!(
                "expected {} bytes, got {}",
                Self::RAW_LEN,
                bytes.len()
            )));
        }
        Ok(Self(hex::encode(bytes)))
    }

    /// Create an object id from a digest.
    pub fn from_raw(raw: [u8; Self::RAW_LEN]) -> Self {
        Self(hex::encode(raw))
    }

    /// Raw 20-byte form of the object id.
    pub fn to_bytes(&self) -> [u8; Self::RAW_LEN] {
        let mut raw = [0u8; Self::RAW_LEN];
        // Validated as 40 hex characters at construction, so this cannot fail.
        let _ = hex::decode_to_slice(&self.0, &mut raw);
        raw
    }

    /// Get an abbreviated form of the object id.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated full reference name.
///
/// Writes always use full names; matching always uses the short name.
///
/// # Example
///
/// ```
/// use qyt::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("feature/foo").unwrap();
/// let refname = RefName::for_branch(&branch);
/// assert_eq!(refname.as_str(), "refs/heads/feature/foo");
/// assert!(refname.is_branch_ref());
/// assert_eq!(refname.branch_name(), Some(branch));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        match refname_violation(&name) {
            Some(reason) => Err(TypeError::InvalidRefName(format!("{name:?}: {reason}"))),
            None => Ok(Self(name)),
        }
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("{BRANCH_NAMESPACE}{}", branch.as_str()))
    }

    /// Check if this ref is a local branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with(BRANCH_NAMESPACE)
    }

    /// The short name: the ref without its `refs/heads/` namespace.
    ///
    /// Refs outside the branch namespace are returned unchanged.
    pub fn short(&self) -> &str {
        self.0.strip_prefix(BRANCH_NAMESPACE).unwrap_or(&self.0)
    }

    /// The branch this ref names, if it is a branch ref.
    pub fn branch_name(&self) -> Option<BranchName> {
        self.0
            .strip_prefix(BRANCH_NAMESPACE)
            .and_then(|short| BranchName::new(short).ok())
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("rel/2.5").is_ok());
            assert!(BranchName::new("qyt/main").is_ok());
            assert!(BranchName::new("user@feature").is_ok());
            assert!(BranchName::new("a/b/c/d").is_ok());
        }

        #[test]
        fn invalid_branch_names() {
            for name in [
                "",
                "@",
                "-flag",
                ".hidden",
                "foo/.hidden",
                "branch.lock",
                "branch/",
                "bad..path",
                "foo@{bar",
                "foo//bar",
                "has space",
                "tilde~",
                "caret^",
                "colon:",
                "glob*",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be rejected");
            }
        }

        #[test]
        fn prefix_is_validated() {
            let main = BranchName::new("main").unwrap();
            assert_eq!(main.with_prefix("out-").unwrap().as_str(), "out-main");
            assert!(main.with_prefix("bad prefix/").is_err());
            assert!(main.with_prefix("-").is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let branch = BranchName::new("rel/2.5").unwrap();
            let json = serde_json::to_string(&branch).unwrap();
            assert_eq!(json, "\"rel/2.5\"");
            let parsed: BranchName = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, branch);
            assert!(serde_json::from_str::<BranchName>("\"a..b\"").is_err());
        }
    }

    mod oid {
        use super::*;

        const HEX: &str = "abc123def4567890abc123def4567890abc12345";

        #[test]
        fn normalizes_to_lowercase() {
            let oid = Oid::new(HEX.to_uppercase()).unwrap();
            assert_eq!(oid.as_str(), HEX);
        }

        #[test]
        fn rejects_wrong_length_and_non_hex() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
            assert!(Oid::new("a".repeat(64)).is_err());
        }

        #[test]
        fn raw_bytes_roundtrip() {
            let oid = Oid::new(HEX).unwrap();
            let raw = oid.to_bytes();
            assert_eq!(raw[0], 0xab);
            assert_eq!(Oid::from_bytes(&raw).unwrap(), oid);
            assert!(Oid::from_bytes(&raw[..19]).is_err());
        }

        #[test]
        fn short_clamps_to_length() {
            let oid = Oid::new(HEX).unwrap();
            assert_eq!(oid.short(4), "abc1");
            assert_eq!(oid.short(100), HEX);
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn branch_refs() {
            let branch = BranchName::new("rel/2.6").unwrap();
            let refname = RefName::for_branch(&branch);
            assert_eq!(refname.as_str(), "refs/heads/rel/2.6");
            assert_eq!(refname.short(), "rel/2.6");
            assert_eq!(refname.branch_name(), Some(branch));
        }

        #[test]
        fn non_branch_refs_keep_full_short_name() {
            let refname = RefName::new("refs/tags/v1").unwrap();
            assert!(!refname.is_branch_ref());
            assert_eq!(refname.short(), "refs/tags/v1");
            assert_eq!(refname.branch_name(), None);
        }

        #[test]
        fn invalid_ref_names() {
            assert!(RefName::new("").is_err());
            assert!(RefName::new("/refs/heads/x").is_err());
            assert!(RefName::new("refs/heads/x.lock").is_err());
            assert!(RefName::new("refs/heads/a b").is_err());
        }
    }
}
