//! query::render
//!
//! Deterministic rendering of evaluation results.
//!
//! Each result ends with a newline. Scalars are unwrapped: a string result
//! prints its raw text, not a quoted YAML or JSON string. Results of
//! different input documents are separated by `---` in YAML output.

use serde_yaml::Value;

use super::{OutputFormat, QueryError};

/// Render the results of each input document.
pub fn render(documents: &[Vec<Value>], format: OutputFormat) -> Result<Vec<u8>, QueryError> {
    let mut out = String::new();

    for (i, results) in documents.iter().enumerate() {
        if i > 0 && format == OutputFormat::Yaml {
            out.push_str("---\n");
        }
        for value in results {
            match format {
                OutputFormat::Yaml => out.push_str(&yaml(value)?),
                OutputFormat::Json => out.push_str(&json(value)?),
            }
        }
    }

    Ok(out.into_bytes())
}

fn yaml(value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(format!("{s}\n")),
        Value::Null => Ok("null\n".to_string()),
        Value::Bool(b) => Ok(format!("{b}\n")),
        Value::Number(n) => Ok(format!("{n}\n")),
        other => serde_yaml::to_string(other).map_err(|e| QueryError::Render(e.to_string())),
    }
}

fn json(value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(format!("{s}\n")),
        other => serde_json::to_string_pretty(other)
            .map(|s| s + "\n")
            .map_err(|e| QueryError::Render(e.to_string())),
    }
}
