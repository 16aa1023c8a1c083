//! Parser for textual forward references.
//!
//! Grammar:
//!
//! ```text
//! expr  := term ('|' term)*
//! term  := NAME ('[' expr (',' expr)* ','? ']')?
//!        | STRING            -- nested forward reference
//!        | '...'
//! ```
//!
//! Names are looked up in the namespace, falling back to the builtin
//! container and scalar names.

use super::{Namespace, NativeType, TypeExpr};
use crate::error::AnnotationError;

#[derive(Debug, Clone, PartialEq)]
enum Token<'s> {
    Name(&'s str),
    Str(&'s str),
    Ellipsis,
    Open,
    Close,
    Comma,
    Pipe,
}

pub(super) fn parse(text: &str, namespace: &Namespace) -> Result<TypeExpr, AnnotationError> {
    parse_with(text, namespace, false)
}

/// Parses for type variable collection: names not declared yet become
/// placeholders instead of errors. Syntax errors still fail.
pub(super) fn parse_lenient(text: &str, namespace: &Namespace) -> Result<TypeExpr, AnnotationError> {
    parse_with(text, namespace, true)
}

fn parse_with(text: &str, namespace: &Namespace, lenient: bool) -> Result<TypeExpr, AnnotationError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        namespace,
        lenient,
    };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

fn tokenize(text: &str) -> Result<Vec<Token<'_>>, AnnotationError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            b'.' if text[i..].starts_with("...") => {
                tokens.push(Token::Ellipsis);
                i += 3;
            }
            b'"' | b'\'' => {
                let end = text[i + 1..]
                    .find(c as char)
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| syntax(text, "unterminated string"))?;
                tokens.push(Token::Str(&text[i + 1..end]));
                i = end + 1;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                tokens.push(Token::Name(&text[start..i]));
            }
            _ => return Err(syntax(text, &format!("unexpected character '{}'", c as char))),
        }
    }
    Ok(tokens)
}

fn syntax(text: &str, reason: &str) -> AnnotationError {
    AnnotationError::Syntax {
        expression: text.to_owned(),
        reason: reason.to_owned(),
    }
}

struct Parser<'s, 'n> {
    text: &'s str,
    tokens: Vec<Token<'s>>,
    pos: usize,
    namespace: &'n Namespace,
    lenient: bool,
}

impl<'s> Parser<'s, '_> {
    fn error(&self, reason: &str) -> AnnotationError {
        syntax(self.text, reason)
    }

    fn peek(&self) -> Option<&Token<'s>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token<'s>> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<TypeExpr, AnnotationError> {
        let first = self.term()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            members.push(self.term()?);
        }
        Ok(TypeExpr::Union(members))
    }

    fn term(&mut self) -> Result<TypeExpr, AnnotationError> {
        match self.advance() {
            Some(Token::Name(name)) => {
                let (args, variadic) = if self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    let (args, variadic) = self.args()?;
                    (Some(args), variadic)
                } else {
                    (None, false)
                };
                self.apply(name, args, variadic)
            }
            Some(Token::Str(inner)) => parse_with(inner, self.namespace, self.lenient),
            Some(Token::Ellipsis) => Err(self.error("'...' is only allowed as the last argument of Tuple")),
            Some(_) | None => Err(self.error("expected a type name")),
        }
    }

    /// Type arguments up to the closing bracket, and whether they ended
    /// with `...`.
    fn args(&mut self) -> Result<(Vec<TypeExpr>, bool), AnnotationError> {
        let mut args = Vec::new();
        let mut variadic = false;
        loop {
            if self.peek() == Some(&Token::Close) {
                self.pos += 1;
                break;
            }
            if !args.is_empty() && self.peek() == Some(&Token::Ellipsis) {
                self.pos += 1;
                variadic = true;
                if self.advance() != Some(Token::Close) {
                    return Err(self.error("'...' must close the argument list"));
                }
                break;
            }
            args.push(self.expr()?);
            match self.advance() {
                Some(Token::Comma) => {}
                Some(Token::Close) => break,
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
        if args.is_empty() {
            return Err(self.error("empty type argument list"));
        }
        Ok((args, variadic))
    }

    fn single(&self, container: &str, mut args: Vec<TypeExpr>) -> Result<TypeExpr, AnnotationError> {
        if args.len() != 1 {
            return Err(self.error(&format!(
                "{container} takes exactly one type argument, got {}",
                args.len()
            )));
        }
        Ok(args.remove(0))
    }

    fn apply(
        &self,
        name: &str,
        args: Option<Vec<TypeExpr>>,
        variadic: bool,
    ) -> Result<TypeExpr, AnnotationError> {
        let short = name.rsplit_once('.').map_or(name, |(_, short)| short);
        if variadic && !matches!(short, "Tuple" | "tuple") {
            return Err(self.error("'...' is only allowed as the last argument of Tuple"));
        }

        if let Some(item) = self
            .namespace
            .get(name)
            .or_else(|| name.rsplit_once('.').and_then(|(_, short)| self.namespace.get(short)))
        {
            let base = TypeExpr::Declared(item);
            return Ok(match args {
                Some(args) => TypeExpr::Generic(Box::new(base), args),
                None => base,
            });
        }

        match (short, args) {
            ("None", None) => Ok(TypeExpr::Null),
            ("int", None) => Ok(TypeExpr::Native(NativeType::INT)),
            ("float", None) => Ok(TypeExpr::Native(NativeType::FLOAT)),
            ("str", None) => Ok(TypeExpr::Native(NativeType::STR)),
            ("bool", None) => Ok(TypeExpr::Native(NativeType::BOOL)),
            ("ID", None) => Ok(TypeExpr::Native(NativeType::ID)),
            ("Optional", Some(args)) => Ok(TypeExpr::Union(vec![self.single(short, args)?, TypeExpr::Null])),
            ("Union", Some(args)) => Ok(TypeExpr::Union(args)),
            (
                "List" | "list" | "Sequence" | "Iterable" | "Set" | "set" | "FrozenSet"
                | "frozenset",
                Some(args),
            ) => Ok(TypeExpr::List(Box::new(self.single(short, args)?))),
            // Only Tuple[X, ...] maps to a list; fixed-size tuples have no
            // schema representation.
            ("Tuple" | "tuple", Some(args)) if variadic || args.len() == 1 => {
                Ok(TypeExpr::List(Box::new(self.single(short, args)?)))
            }
            ("Tuple" | "tuple", Some(_)) => Err(self.error(
                "fixed-size tuples are not supported, use Tuple[X, ...]",
            )),
            (
                "AsyncIterator" | "AsyncIterable" | "AsyncGenerator" | "Iterator" | "Generator",
                Some(args),
            ) => Ok(TypeExpr::Async(Box::new(self.single(short, args)?))),
            // Placeholder for a name declared later; only its arguments matter.
            (_, args) if self.lenient => Ok(TypeExpr::Union(args.unwrap_or_default())),
            _ => Err(AnnotationError::UnknownName {
                name: name.to_owned(),
            }),
        }
    }
}
