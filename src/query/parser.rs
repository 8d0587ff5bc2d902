//! query::parser
//!
//! Recursive descent parser producing an [`Expr`] tree.
//!
//! # Precedence
//!
//! From loosest to tightest binding:
//!
//! | Operator        | Associativity |
//! |-----------------|---------------|
//! | `\|`            | right         |
//! | `,`             | left          |
//! | `//`            | right         |
//! | `=` `\|=`       | none          |
//! | `==` `!=`       | none          |
//! | `+`             | left          |
//! | `.a` `[i]` `[]` | postfix       |

use serde_yaml::Value;

use super::lexer::{tokenize, Spanned, Token};
use super::QueryError;

/// Builtin functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Keys,
    Length,
    Select,
    Del,
}

impl Builtin {
    fn lookup(name: &str) -> Option<(Self, usize)> {
        match name {
            "keys" => Some((Builtin::Keys, 0)),
            "length" => Some((Builtin::Length, 0)),
            "select" => Some((Builtin::Select, 1)),
            "del" => Some((Builtin::Del, 1)),
            _ => None,
        }
    }
}

/// A parsed query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `.`
    Identity,
    Literal(Value),
    Var(String),
    /// `target.name`
    Field(Box<Expr>, String),
    /// `target[key]`, with `key` evaluated against the term's input
    Index(Box<Expr>, Box<Expr>),
    /// `target[]`
    Iterate(Box<Expr>),
    Pipe(Box<Expr>, Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
    Alt(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    /// `path = value`
    Assign(Box<Expr>, Box<Expr>),
    /// `path |= update`
    Update(Box<Expr>, Box<Expr>),
    /// `{key: value, ...}`
    Object(Vec<(Expr, Expr)>),
    /// `[...]`
    Array(Option<Box<Expr>>),
    Call(Builtin, Vec<Expr>),
}

/// Parse an expression.
pub fn parse(source: &str) -> Result<Expr, QueryError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        len: source.len(),
    };

    if parser.tokens.is_empty() {
        return Err(parser.error("empty expression"));
    }

    let expr = parser.pipe(true)?;
    if let Some(spanned) = parser.peek_spanned() {
        let message = format!("unexpected {:?}", spanned.token);
        return Err(parser.error(&message));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_spanned().map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), QueryError> {
        if self.eat(token) {
            Ok(())
        } else {
            let found = self
                .peek()
                .map_or_else(|| "end of expression".to_string(), |t| format!("{t:?}"));
            Err(self.error(&format!("expected {token:?}, found {found}")))
        }
    }

    fn error(&self, message: &str) -> QueryError {
        QueryError::Parse {
            offset: self.peek_spanned().map_or(self.len, |s| s.offset),
            message: message.to_string(),
        }
    }

    fn pipe(&mut self, allow_comma: bool) -> Result<Expr, QueryError> {
        let left = self.comma(allow_comma)?;
        if self.eat(&Token::Pipe) {
            let right = self.pipe(allow_comma)?;
            return Ok(Expr::Pipe(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn comma(&mut self, allow_comma: bool) -> Result<Expr, QueryError> {
        let mut left = self.alternative()?;
        while allow_comma && self.eat(&Token::Comma) {
            let right = self.alternative()?;
            left = Expr::Comma(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn alternative(&mut self) -> Result<Expr, QueryError> {
        let left = self.assignment()?;
        if self.eat(&Token::Alt) {
            let right = self.alternative()?;
            return Ok(Expr::Alt(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn assignment(&mut self) -> Result<Expr, QueryError> {
        let left = self.comparison()?;
        if self.eat(&Token::Assign) {
            let right = self.comparison()?;
            return Ok(Expr::Assign(Box::new(left), Box::new(right)));
        }
        if self.eat(&Token::Update) {
            let right = self.comparison()?;
            return Ok(Expr::Update(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, QueryError> {
        let left = self.additive()?;
        if self.eat(&Token::Eq) {
            let right = self.additive()?;
            return Ok(Expr::Eq(Box::new(left), Box::new(right)));
        }
        if self.eat(&Token::Ne) {
            let right = self.additive()?;
            return Ok(Expr::Ne(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.postfix()?;
        while self.eat(&Token::Plus) {
            let right = self.postfix()?;
            left = Expr::Add(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn postfix(&mut self) -> Result<Expr, QueryError> {
        let mut expr = self.primary()?;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(Token::Dot), Some(Token::Ident(_) | Token::Str(_))) => {
                    self.pos += 1;
                    expr = self.field(expr)?;
                }
                (Some(Token::Dot), Some(Token::LBracket)) => {
                    self.pos += 1;
                    expr = self.bracket(expr)?;
                }
                (Some(Token::LBracket), _) => expr = self.bracket(expr)?,
                _ => return Ok(expr),
            }
        }
    }

    /// After a `.`: a field name.
    fn field(&mut self, target: Expr) -> Result<Expr, QueryError> {
        match self.bump() {
            Some(Token::Ident(name)) | Some(Token::Str(name)) => {
                Ok(Expr::Field(Box::new(target), name))
            }
            _ => Err(self.error("expected field name")),
        }
    }

    /// At a `[`: iteration or indexing.
    fn bracket(&mut self, target: Expr) -> Result<Expr, QueryError> {
        self.expect(&Token::LBracket)?;
        if self.eat(&Token::RBracket) {
            return Ok(Expr::Iterate(Box::new(target)));
        }
        let key = self.pipe(true)?;
        self.expect(&Token::RBracket)?;
        Ok(Expr::Index(Box::new(target), Box::new(key)))
    }

    fn primary(&mut self) -> Result<Expr, QueryError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression"));
        };

        match token {
            Token::Dot => {
                self.pos += 1;
                match self.peek() {
                    Some(Token::Ident(_) | Token::Str(_)) => self.field(Expr::Identity),
                    Some(Token::LBracket) => self.bracket(Expr::Identity),
                    _ => Ok(Expr::Identity),
                }
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::Int(n) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Number(n.into())))
            }
            Token::Float(n) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Number(n.into())))
            }
            Token::Minus => {
                self.pos += 1;
                match self.bump() {
                    Some(Token::Int(n)) => Ok(Expr::Literal(Value::Number((-n).into()))),
                    Some(Token::Float(n)) => Ok(Expr::Literal(Value::Number((-n).into()))),
                    _ => Err(self.error("expected number after '-'")),
                }
            }
            Token::Var(name) => {
                self.pos += 1;
                Ok(Expr::Var(name))
            }
            Token::Ident(name) => {
                self.pos += 1;
                self.ident(&name)
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.pipe(true)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.pos += 1;
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::Array(None));
                }
                let inner = self.pipe(true)?;
                self.expect(&Token::RBracket)?;
                Ok(Expr::Array(Some(Box::new(inner))))
            }
            Token::LBrace => {
                self.pos += 1;
                self.object()
            }
            other => Err(self.error(&format!("unexpected {other:?}"))),
        }
    }

    /// Keywords and builtin calls.
    fn ident(&mut self, name: &str) -> Result<Expr, QueryError> {
        match name {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }

        let Some((builtin, arity)) = Builtin::lookup(name) else {
            self.pos -= 1;
            return Err(self.error(&format!("unknown function {name:?}")));
        };

        let mut args = Vec::with_capacity(arity);
        if arity > 0 {
            self.expect(&Token::LParen)?;
            args.push(self.pipe(true)?);
            self.expect(&Token::RParen)?;
        }
        Ok(Expr::Call(builtin, args))
    }

    /// After a `{`: object construction.
    fn object(&mut self) -> Result<Expr, QueryError> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Expr::Object(entries));
        }

        loop {
            let entry = match self.bump() {
                Some(Token::Ident(name)) | Some(Token::Str(name)) => {
                    let key = Expr::Literal(Value::String(name.clone()));
                    let value = if self.eat(&Token::Colon) {
                        self.pipe(false)?
                    } else {
                        Expr::Field(Box::new(Expr::Identity), name)
                    };
                    (key, value)
                }
                Some(Token::Var(name)) => {
                    if self.eat(&Token::Colon) {
                        (Expr::Var(name), self.pipe(false)?)
                    } else {
                        (Expr::Literal(Value::String(name.clone())), Expr::Var(name))
                    }
                }
                Some(Token::LParen) => {
                    let key = self.pipe(true)?;
                    self.expect(&Token::RParen)?;
                    self.expect(&Token::Colon)?;
                    (key, self.pipe(false)?)
                }
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected object key"));
                }
            };
            entries.push(entry);

            if self.eat(&Token::RBrace) {
                return Ok(Expr::Object(entries));
            }
            self.expect(&Token::Comma)?;
        }
    }
}
