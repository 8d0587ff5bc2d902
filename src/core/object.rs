//! core::object
//!
//! In-memory git objects and their canonical encoding.
//!
//! # Overview
//!
//! Every object qyt creates (blob, tree, commit) is built and hashed in
//! memory first and only handed to an object store later. The encoding here
//! is byte-compatible with git's loose object format, so the hash computed by
//! [`hash_object`] is exactly the hash git assigns to the same content.
//!
//! # Encoding
//!
//! - Object id: `sha1("<kind> <len>\0" ++ payload)`
//! - Tree: repeated `<octal mode> <name>\0<20 raw hash bytes>`, ordered by
//!   name with directories compared as if suffixed by `/`
//! - Commit: `tree`, `parent`*, `author`, `committer` headers, a blank line,
//!   then the message verbatim
//!
//! # Invariants
//!
//! - Encoding is deterministic: equal values encode to equal bytes
//! - Decoding then re-encoding an unmodified tree reproduces its bytes, so
//!   untouched trees keep their hash

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone};
use sha1::{Digest, Sha1};
use thiserror::Error;

use super::types::{Oid, TypeError};

/// Errors from encoding or decoding objects.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The payload does not follow the object format.
    #[error("malformed {kind} object: {reason}")]
    Malformed {
        /// Kind being decoded
        kind: ObjectKind,
        /// What went wrong
        reason: String,
    },

    /// A tree entry carries a mode git does not define.
    #[error("unknown tree entry mode: {0}")]
    UnknownMode(String),

    /// Object type name not recognised.
    #[error("unknown object kind: {0}")]
    UnknownKind(String),

    /// An embedded hash or name failed validation.
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ObjectError {
    fn malformed(kind: ObjectKind, reason: impl Into<String>) -> Self {
        ObjectError::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}

/// The four git object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    /// The kind's name as used in object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    /// Parse a kind from its header name.
    pub fn parse(name: &str) -> Result<Self, ObjectError> {
        match name {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(ObjectError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the git object id of a payload.
///
/// # Example
///
/// ```
/// use qyt::core::object::{hash_object, ObjectKind};
///
/// // `git hash-object /dev/null`
/// assert_eq!(
///     hash_object(ObjectKind::Blob, b"").as_str(),
///     "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
/// );
/// ```
pub fn hash_object(kind: ObjectKind, payload: &[u8]) -> Oid {
    let mut hasher = Sha1::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(payload.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(payload);
    Oid::from_raw(hasher.finalize().into())
}

/// An encoded object: kind, payload, and the hash of both.
///
/// The payload is reference counted so staging the same object for several
/// branches does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    kind: ObjectKind,
    data: Arc<[u8]>,
    oid: Oid,
}

impl RawObject {
    /// Encode a payload and compute its hash.
    pub fn new(kind: ObjectKind, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let oid = hash_object(kind, &data);
        Self { kind, data, oid }
    }

    /// Wrap a payload read from a store under a known hash.
    pub fn with_oid(kind: ObjectKind, data: impl Into<Arc<[u8]>>, oid: Oid) -> Self {
        Self {
            kind,
            data: data.into(),
            oid,
        }
    }

    /// Create a blob object.
    pub fn blob(content: impl Into<Arc<[u8]>>) -> Self {
        Self::new(ObjectKind::Blob, content)
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Decode the payload into a structured object.
    pub fn decode(&self) -> Result<Object, ObjectError> {
        Object::decode(self.kind, &self.data)
    }
}

/// Mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Subdirectory (`40000`).
    Tree,
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    Executable,
    /// Symbolic link (`120000`).
    Symlink,
    /// Submodule commit (`160000`).
    Gitlink,
}

impl EntryMode {
    /// The octal form written into tree payloads.
    pub fn as_octal(&self) -> &'static str {
        match self {
            EntryMode::Tree => "40000",
            EntryMode::Blob => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
        }
    }

    /// Parse an octal mode. Accepts the zero-padded `040000` and group
    /// writable `100664` some tools write; [`Tree::decode`] keeps those bytes.
    pub fn from_octal(mode: &str) -> Result<Self, ObjectError> {
        match mode {
            "40000" | "040000" => Ok(EntryMode::Tree),
            "100644" | "100664" => Ok(EntryMode::Blob),
            "100755" => Ok(EntryMode::Executable),
            "120000" => Ok(EntryMode::Symlink),
            "160000" => Ok(EntryMode::Gitlink),
            other => Err(ObjectError::UnknownMode(other.to_string())),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Tree)
    }

    /// Whether the entry is a file with readable content (blob, executable, symlink).
    pub fn is_file(&self) -> bool {
        matches!(
            self,
            EntryMode::Blob | EntryMode::Executable | EntryMode::Symlink
        )
    }
}

/// One named entry of a tree.
///
/// Names are raw bytes: git does not require them to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: Vec<u8>,
    pub mode: EntryMode,
    pub oid: Oid,
    /// Mode bytes as decoded, when they differ from the canonical octal.
    raw_mode: Option<Box<[u8]>>,
}

impl TreeEntry {
    pub fn new(name: impl Into<Vec<u8>>, mode: EntryMode, oid: Oid) -> Self {
        Self {
            name: name.into(),
            mode,
            oid,
            raw_mode: None,
        }
    }

    /// The name as UTF-8, if it is valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// Point a file entry at new content. The mode is written canonically.
    pub fn set_file(&mut self, mode: EntryMode, oid: Oid) {
        self.mode = mode;
        self.oid = oid;
        self.raw_mode = None;
    }

    fn mode_bytes(&self) -> &[u8] {
        self.raw_mode
            .as_deref()
            .unwrap_or_else(|| self.mode.as_octal().as_bytes())
    }

    /// Name used for git's tree ordering: directories sort as `name/`.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.clone();
        if self.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// An ordered directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order, sorting them the way git does.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by_key(TreeEntry::sort_key);
        Self { entries }
    }

    /// Find an entry by exact name.
    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name.as_bytes())
    }

    /// Encode the tree payload. Entry order is preserved as is.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 48);
        for entry in &self.entries {
            out.extend_from_slice(entry.mode_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(&entry.oid.to_bytes());
        }
        out
    }

    /// Decode a tree payload.
    pub fn decode(mut data: &[u8]) -> Result<Self, ObjectError> {
        let kind = ObjectKind::Tree;
        let mut entries = Vec::new();

        while !data.is_empty() {
            let space = data
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ObjectError::malformed(kind, "entry without mode separator"))?;
            let octal = std::str::from_utf8(&data[..space])
                .map_err(|_| ObjectError::malformed(kind, "non-ascii mode"))?;
            let mode = EntryMode::from_octal(octal)?;
            let raw_mode = (octal != mode.as_octal()).then(|| octal.as_bytes().into());
            data = &data[space + 1..];

            let nul = data
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ObjectError::malformed(kind, "unterminated entry name"))?;
            let name = data[..nul].to_vec();
            data = &data[nul + 1..];

            if data.len() < Oid::RAW_LEN {
                return Err(ObjectError::malformed(kind, "truncated entry hash"));
            }
            let oid = Oid::from_bytes(&data[..Oid::RAW_LEN])?;
            data = &data[Oid::RAW_LEN..];

            entries.push(TreeEntry {
                name,
                mode,
                oid,
                raw_mode,
            });
        }

        Ok(Self { entries })
    }

    /// Encode into a hashed object.
    pub fn to_object(&self) -> RawObject {
        RawObject::new(ObjectKind::Tree, self.encode())
    }
}

/// Author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Encode as `Name <email> <unix seconds> <+hhmm>`.
    pub fn encode(&self) -> String {
        let offset = self.when.offset().local_minus_utc();
        let sign = if offset < 0 { '-' } else { '+' };
        let offset = offset.unsigned_abs();
        format!(
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.when.timestamp(),
            sign,
            offset / 3600,
            (offset % 3600) / 60
        )
    }

    /// Parse the encoded form written by [`Signature::encode`].
    pub fn parse(line: &str) -> Result<Self, ObjectError> {
        let bad = |reason: &str| ObjectError::malformed(ObjectKind::Commit, reason.to_string());

        let open = line.find('<').ok_or_else(|| bad("signature without email"))?;
        let close = line[open..]
            .find('>')
            .map(|i| open + i)
            .ok_or_else(|| bad("unterminated signature email"))?;
        let name = line[..open].trim_end().to_string();
        let email = line[open + 1..close].to_string();

        let mut rest = line[close + 1..].split_whitespace();
        let secs: i64 = rest
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| bad("signature without timestamp"))?;
        let tz = rest.next().unwrap_or("+0000");
        let offset = parse_offset(tz).ok_or_else(|| bad("invalid signature timezone"))?;
        let when = offset
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| bad("signature timestamp out of range"))?;

        Ok(Self { name, email, when })
    }
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz.len() != 5 {
        return None;
    }
    let sign = match &tz[..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i32 = tz[1..3].parse().ok()?;
    let minutes: i32 = tz[3..5].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// A commit snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    /// Encode the commit payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        out.push_str(&format!("author {}\n", self.author.encode()));
        out.push_str(&format!("committer {}\n", self.committer.encode()));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    /// Decode a commit payload. Headers other than tree, parent, author and
    /// committer (e.g. `gpgsig`, `encoding`) are skipped.
    pub fn decode(data: &[u8]) -> Result<Self, ObjectError> {
        let kind = ObjectKind::Commit;
        let text = String::from_utf8_lossy(data);
        let (headers, message) = text.split_once("\n\n").unwrap_or((&text, ""));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            // Continuation lines of multi-line headers.
            if line.starts_with(' ') {
                continue;
            }
            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            match key {
                "tree" => tree = Some(Oid::new(value)?),
                "parent" => parents.push(Oid::new(value)?),
                "author" => author = Some(Signature::parse(value)?),
                "committer" => committer = Some(Signature::parse(value)?),
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| ObjectError::malformed(kind, "missing tree header"))?,
            parents,
            author: author.ok_or_else(|| ObjectError::malformed(kind, "missing author header"))?,
            committer: committer
                .ok_or_else(|| ObjectError::malformed(kind, "missing committer header"))?,
            message: message.to_string(),
        })
    }

    /// Encode into a hashed object.
    pub fn to_object(&self) -> RawObject {
        RawObject::new(ObjectKind::Commit, self.encode())
    }
}

/// An annotated tag. Only the fields needed to follow it are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub target: Oid,
    pub target_kind: ObjectKind,
    pub name: String,
    pub message: String,
}

impl Tag {
    /// Encode a tag payload (no tagger line).
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "object {}\ntype {}\ntag {}\n\n{}",
            self.target, self.target_kind, self.name, self.message
        )
        .into_bytes()
    }

    /// Decode a tag payload.
    pub fn decode(data: &[u8]) -> Result<Self, ObjectError> {
        let kind = ObjectKind::Tag;
        let text = String::from_utf8_lossy(data);
        let (headers, message) = text.split_once("\n\n").unwrap_or((&text, ""));

        let mut target = None;
        let mut target_kind = None;
        let mut name = String::new();
        for line in headers.lines() {
            match line.split_once(' ') {
                Some(("object", value)) => target = Some(Oid::new(value)?),
                Some(("type", value)) => target_kind = Some(ObjectKind::parse(value)?),
                Some(("tag", value)) => name = value.to_string(),
                _ => {}
            }
        }

        Ok(Self {
            target: target.ok_or_else(|| ObjectError::malformed(kind, "missing object header"))?,
            target_kind: target_kind
                .ok_or_else(|| ObjectError::malformed(kind, "missing type header"))?,
            name,
            message: message.to_string(),
        })
    }

    /// Encode into a hashed object.
    pub fn to_object(&self) -> RawObject {
        RawObject::new(ObjectKind::Tag, self.encode())
    }
}

/// Any git object, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode a payload of a known kind.
    pub fn decode(kind: ObjectKind, data: &[u8]) -> Result<Self, ObjectError> {
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(data.to_vec()),
            ObjectKind::Tree => Object::Tree(Tree::decode(data)?),
            ObjectKind::Commit => Object::Commit(Commit::decode(data)?),
            ObjectKind::Tag => Object::Tag(Tag::decode(data)?),
        })
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }
}
