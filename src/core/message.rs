//! core::message
//!
//! Commit message templates.
//!
//! Templates are plain text with `{{ ... }}` actions. Two fields are
//! available: `.Branch` (the source branch short name) and `.Query` (the
//! query expression text, verbatim). An action is either a bare field or a
//! `printf` with one verb and one field:
//!
//! ```text
//! run yq {{printf "%q" .Query}} on {{.Branch}}
//! ```
//!
//! Supported verbs are `%s` / `%v` (the value as is) and `%q` (a double
//! quoted, escaped string). Templates are parsed once, before any branch is
//! evaluated, so a malformed template is an input error.

use std::fmt;

use thiserror::Error;

/// Errors from parsing a message template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),

    #[error("unknown field: {0} (expected .Branch or .Query)")]
    UnknownField(String),

    #[error("unsupported action: {{{{{0}}}}}")]
    UnsupportedAction(String),

    #[error("unsupported printf verb: {0} (expected %s, %v or %q)")]
    UnsupportedVerb(String),
}

/// A field a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Branch,
    Query,
}

impl Field {
    fn parse(name: &str) -> Result<Self, TemplateError> {
        match name {
            ".Branch" => Ok(Field::Branch),
            ".Query" => Ok(Field::Query),
            other => Err(TemplateError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Field { field: Field, quoted: bool },
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct MessageVars<'a> {
    pub branch: &'a str,
    pub query: &'a str,
}

/// A parsed commit message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
    parts: Vec<Part>,
}

impl MessageTemplate {
    /// Parse a template.
    ///
    /// # Example
    ///
    /// ```
    /// use qyt::core::message::{MessageTemplate, MessageVars};
    ///
    /// let template = MessageTemplate::parse(r#"run yq {{printf "%q" .Query}} on {{.Branch}}"#).unwrap();
    /// let message = template.render(&MessageVars { branch: "main", query: ".name = \"z\"" });
    /// assert_eq!(message, r#"run yq ".name = \"z\"" on main"#);
    /// ```
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(TemplateError::Unclosed(offset + start))?;
            parts.push(parse_action(&after[..end])?);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Render the template.
    pub fn render(&self, vars: &MessageVars<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Field { field, quoted } => {
                    let value = match field {
                        Field::Branch => vars.branch,
                        Field::Query => vars.query,
                    };
                    if *quoted {
                        out.push_str(&format!("{value:?}"));
                    } else {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }

    /// The template text as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_action(action: &str) -> Result<Part, TemplateError> {
    let trimmed = action.trim();

    if trimmed.starts_with('.') {
        return Ok(Part::Field {
            field: Field::parse(trimmed)?,
            quoted: false,
        });
    }

    let Some(args) = trimmed.strip_prefix("printf") else {
        return Err(TemplateError::UnsupportedAction(trimmed.to_string()));
    };
    let args = args.trim_start();
    let Some(args) = args.strip_prefix('"') else {
        return Err(TemplateError::UnsupportedAction(trimmed.to_string()));
    };
    let Some((verb, field)) = args.split_once('"') else {
        return Err(TemplateError::UnsupportedAction(trimmed.to_string()));
    };
    let quoted = match verb {
        "%q" => true,
        "%s" | "%v" => false,
        other => return Err(TemplateError::UnsupportedVerb(other.to_string())),
    };

    Ok(Part::Field {
        field: Field::parse(field.trim())?,
        quoted,
    })
}
