//! query::lexer
//!
//! Tokenizer for query expressions.

use super::QueryError;

/// A token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Dot,
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Var(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Pipe,
    /// `//`
    Alt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `=`
    Assign,
    /// `|=`
    Update,
    Plus,
    Minus,
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split an expression into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, QueryError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let (token, len) = match c {
            b'.' => (Token::Dot, 1),
            b'[' => (Token::LBracket, 1),
            b']' => (Token::RBracket, 1),
            b'(' => (Token::LParen, 1),
            b')' => (Token::RParen, 1),
            b'{' => (Token::LBrace, 1),
            b'}' => (Token::RBrace, 1),
            b':' => (Token::Colon, 1),
            b',' => (Token::Comma, 1),
            b'+' => (Token::Plus, 1),
            b'-' => (Token::Minus, 1),
            b'|' if bytes.get(pos + 1) == Some(&b'=') => (Token::Update, 2),
            b'|' => (Token::Pipe, 1),
            b'/' if bytes.get(pos + 1) == Some(&b'/') => (Token::Alt, 2),
            b'=' if bytes.get(pos + 1) == Some(&b'=') => (Token::Eq, 2),
            b'=' => (Token::Assign, 1),
            b'!' if bytes.get(pos + 1) == Some(&b'=') => (Token::Ne, 2),
            b'"' => {
                let (value, len) = string(source, pos)?;
                (Token::Str(value), len)
            }
            b'$' => {
                let len = ident_len(&bytes[pos + 1..]);
                if len == 0 {
                    return Err(error(pos, "expected variable name after '$'"));
                }
                (Token::Var(source[pos + 1..pos + 1 + len].to_string()), len + 1)
            }
            b'0'..=b'9' => number(source, pos)?,
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let len = ident_len(&bytes[pos..]);
                (Token::Ident(source[pos..pos + len].to_string()), len)
            }
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(error(pos, &format!("unexpected character {ch:?}")));
            }
        };

        tokens.push(Spanned {
            token,
            offset: start,
        });
        pos += len;
    }

    Ok(tokens)
}

fn error(offset: usize, message: &str) -> QueryError {
    QueryError::Parse {
        offset,
        message: message.to_string(),
    }
}

fn ident_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(c) if c.is_ascii_alphabetic() || *c == b'_' => bytes
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
            .count(),
        _ => 0,
    }
}

fn number(source: &str, start: usize) -> Result<(Token, usize), QueryError> {
    let bytes = source.as_bytes();
    let mut end = start;
    let mut float = false;

    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        float = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            float = true;
            end = exp;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }

    let text = &source[start..end];
    if !float {
        if let Ok(n) = text.parse::<i64>() {
            return Ok((Token::Int(n), end - start));
        }
    }
    text.parse::<f64>()
        .map(|n| (Token::Float(n), end - start))
        .map_err(|_| error(start, &format!("invalid number {text:?}")))
}

fn string(source: &str, start: usize) -> Result<(String, usize), QueryError> {
    let mut out = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, i + 2)),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                        let decoded = u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                error(start + 1 + i, &format!("invalid unicode escape \\u{hex}"))
                            })?;
                        out.push(decoded);
                    }
                    other => {
                        return Err(error(
                            start + 1 + i,
                            &format!("invalid escape \\{other}"),
                        ))
                    }
                }
            }
            c => out.push(c),
        }
    }

    Err(error(start, "unterminated string"))
}
