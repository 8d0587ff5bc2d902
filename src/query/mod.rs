//! query
//!
//! Query evaluation over YAML documents.
//!
//! # Overview
//!
//! The engine treats the evaluator as an external collaborator behind the
//! [`Evaluator`] trait: it parses an expression once, then evaluates the
//! parsed handle against the raw bytes of each matching file together with a
//! [`Scope`] of named variables.
//!
//! An evaluator is an ordinary value constructed and owned by the caller.
//! There is no process-wide parser state, so tests can pass fakes.
//!
//! # Built-in evaluator
//!
//! [`Yq`] implements a yq/jq style expression subset:
//!
//! - paths: `.`, `.a.b`, `."quoted key"`, `.["k"]`, `.[n]`, `.[-1]`, `.[]`
//! - literals: strings, numbers, `true`, `false`, `null`
//! - variables: `$branch`, `$filename`, `$head`
//! - operators: `|`, `,`, `//`, `==`, `!=`, `+`, `=`, `|=`
//! - construction: `{key: value}`, `[...]`, parentheses
//! - builtins: `keys`, `length`, `select(f)`, `del(f)`
//!
//! Multi-document input is evaluated document by document. A file holding
//! only blank lines and comments has no documents and produces no output.
//!
//! # Limitations
//!
//! Documents are evaluated as plain YAML values, so rendering does not keep
//! the presentation of the input. Comments are dropped, quoting and flow
//! style are normalised, and key order is kept. A leading `---` marker is
//! kept. Any query that changes a file therefore also strips its comments.
//!
//! # Determinism
//!
//! Evaluating the same expression against the same bytes and scope always
//! yields byte-identical output. Apply relies on this to detect unchanged
//! files.
//!
//! # Example
//!
//! ```
//! use qyt::query::{Evaluator, OutputFormat, Scope, Yq};
//!
//! let yq = Yq::new();
//! let expr = yq.parse(r#".name = "z""#).unwrap();
//! let scope = Scope::new("main", "a.yaml", "0000000000000000000000000000000000000000");
//!
//! let out = yq.evaluate(&expr, b"name: x\n", &scope, OutputFormat::Yaml).unwrap();
//! assert_eq!(out, b"name: z\n");
//! ```

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod render;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

pub use parser::Expr;

/// Errors from parsing or evaluating a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The expression is malformed.
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// The input is not valid YAML.
    #[error("invalid YAML document: {0}")]
    Document(#[source] serde_yaml::Error),

    /// Evaluation failed (type mismatch, invalid path).
    #[error("{0}")]
    Eval(String),

    /// A `$name` that is not in scope.
    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    /// A result cannot be represented in the output format.
    #[error("failed to render output: {0}")]
    Render(String),
}

/// Output format for evaluation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{other}' (expected 'yaml' or 'json')"
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variables visible to an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Short name of the branch being evaluated (`$branch`).
    pub branch: String,
    /// Path of the file relative to the repository root (`$filename`).
    pub filename: String,
    /// Hex hash of the commit the branch points to (`$head`).
    pub head: String,
}

impl Scope {
    pub fn new(
        branch: impl Into<String>,
        filename: impl Into<String>,
        head: impl Into<String>,
    ) -> Self {
        Self {
            branch: branch.into(),
            filename: filename.into(),
            head: head.into(),
        }
    }

    /// Look up a variable by name (without the `$`).
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "branch" => Some(&self.branch),
            "filename" => Some(&self.filename),
            "head" => Some(&self.head),
            _ => None,
        }
    }
}

/// A query evaluator.
pub trait Evaluator {
    /// Parsed, reusable form of an expression.
    type Expression;

    /// Parse an expression.
    fn parse(&self, expression: &str) -> Result<Self::Expression, QueryError>;

    /// Evaluate a parsed expression against one file's bytes.
    fn evaluate(
        &self,
        expression: &Self::Expression,
        document: &[u8],
        scope: &Scope,
        format: OutputFormat,
    ) -> Result<Vec<u8>, QueryError>;
}

/// The built-in yq subset evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yq;

impl Yq {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for Yq {
    type Expression = Expr;

    fn parse(&self, expression: &str) -> Result<Expr, QueryError> {
        parser::parse(expression)
    }

    fn evaluate(
        &self,
        expression: &Expr,
        document: &[u8],
        scope: &Scope,
        format: OutputFormat,
    ) -> Result<Vec<u8>, QueryError> {
        if is_blank(document) {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for doc in serde_yaml::Deserializer::from_slice(document) {
            let value = Value::deserialize(doc).map_err(QueryError::Document)?;
            results.push(eval::eval(expression, &value, scope)?);
        }
        let out = render::render(&results, format)?;

        if format == OutputFormat::Yaml && !out.is_empty() && has_start_marker(document) {
            let mut marked = b"---\n".to_vec();
            marked.extend(out);
            return Ok(marked);
        }
        Ok(out)
    }
}

/// Whether `document` holds nothing but blank lines and comments.
pub fn is_blank(document: &[u8]) -> bool {
    content_lines(document).next().is_none()
}

fn has_start_marker(document: &[u8]) -> bool {
    content_lines(document)
        .next()
        .is_some_and(|line| line == b"---" || line.starts_with(b"--- "))
}

fn content_lines(document: &[u8]) -> impl Iterator<Item = &[u8]> {
    document
        .split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty() && !line.starts_with(b"#"))
}
