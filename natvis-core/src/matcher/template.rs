//! Template type names
//!
//! Parses `name`, `name<arg, ...>` with nested arguments into a tree. Used
//! for both concrete type names and visualizer patterns, where an argument
//! may be the single wildcard `*` or the variadic wildcard `...`. A scope
//! after the argument list (`Outer<int>::Inner<char>`) becomes a nested
//! segment so that wildcards on either side match.

use std::fmt;

use thiserror::Error;

use super::names::normalize_type_name;

pub const WILDCARD: &str = "*";
pub const VARIADIC: &str = "...";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("\"{input}\":{position}: {message}")]
pub struct TemplateError {
    pub input: String,
    /// Byte offset into the normalized input
    pub position: usize,
    pub message: String,
}

/// A type name with its template argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateType {
    pub name: String,
    pub args: Vec<TemplateType>,
    /// `Inner<..>` of `Outer<..>::Inner<..>`
    pub nested: Option<Box<TemplateType>>,
}

impl TemplateType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            nested: None,
        }
    }

    /// Parse a type name after normalizing it
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let normalized = normalize_type_name(input);
        let mut parser = TemplateParser {
            input: &normalized,
            pos: 0,
        };

        let ty = parser.parse_type()?;
        if parser.pos < normalized.len() {
            return Err(parser.error(format!(
                "input remained after reading entire type: '{}'",
                &normalized[parser.pos..]
            )));
        }
        Ok(ty)
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }

    pub fn is_variadic(&self) -> bool {
        self.name == VARIADIC
    }

    /// Number of literal tokens: the name itself unless it is a wildcard,
    /// plus the literals of every argument and of the nested segment.
    pub fn literal_count(&self) -> u32 {
        let own = u32::from(!self.is_wildcard() && !self.is_variadic());
        let nested = self.nested.as_ref().map_or(0, |n| n.literal_count());
        own + nested + self.args.iter().map(TemplateType::literal_count).sum::<u32>()
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        if let Some(nested) = &self.nested {
            write!(f, "::{}", nested)?;
        }
        Ok(())
    }
}

/// Recursive-descent parser over a normalized name
struct TemplateParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TemplateParser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError {
            input: self.input.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    /// Advance to the next `<`, `>` or `,` outside parentheses and brackets
    fn scan_name(&mut self) {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '<' | '>' | ',' if depth == 0 => break,
                _ => {}
            }
            self.bump();
        }
    }

    fn parse_type(&mut self) -> Result<TemplateType, TemplateError> {
        self.skip_whitespace();
        let start = self.pos;
        self.scan_name();

        let name = self.input[start..self.pos].trim();
        if name.is_empty() {
            let found = self
                .peek()
                .map_or_else(|| "end of input".to_string(), |c| format!("'{}'", c));
            return Err(self.error(format!("expected a type name, found {}", found)));
        }
        let mut ty = TemplateType::new(name);

        if self.peek() != Some('<') {
            return Ok(ty);
        }
        self.bump();

        loop {
            ty.args.push(self.parse_type()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.bump(),
                Some('>') => {
                    self.bump();
                    break;
                }
                Some(c) => return Err(self.error(format!("expected '>' or ',', found '{}'", c))),
                None => return Err(self.error("expected '>', found end of input")),
            }
        }

        if self.input[self.pos..].starts_with("::") {
            self.pos += 2;
            ty.nested = Some(Box::new(self.parse_type()?));
            return Ok(ty);
        }

        // `Foo<int>*` as an argument: keep the whole spelling as one opaque
        // name
        let tail_start = self.pos;
        self.scan_name();
        if self.pos > tail_start {
            return Ok(TemplateType::new(self.input[start..self.pos].trim()));
        }

        Ok(ty)
    }
}
