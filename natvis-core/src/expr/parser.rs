//! Expression parser
//!
//! Hand-written lexer plus precedence-climbing parser for the C-like
//! expression language used inside visualizer documents.

use super::ast::{BinOp, Expr, Literal, ParsedExpr, UnaryOp};
use super::error::ParseError;
use super::format::FormatSpec;

/// Parse an expression string into our AST
pub fn parse_expr(input: &str) -> Result<ParsedExpr, ParseError> {
    let mut parser = Parser::new(input);
    let expr = parser.parse_binary(0)?;

    let token = parser.peek()?;
    let format = match token.kind {
        TokenKind::Eof => None,
        TokenKind::Comma => Some(FormatSpec::parse(&input[token.end..])),
        _ => return Err(parser.unexpected(&token, "end of expression")),
    };

    Ok(ParsedExpr { expr, format })
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Var(String),
    Int(i128),
    Float(f64),
    Char(char),
    Str(String),
    Dot,
    Arrow,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Bang,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Eof,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Var(name) => format!("variable '{}'", name),
            TokenKind::Int(v) => format!("integer {}", v),
            TokenKind::Float(v) => format!("number {}", v),
            TokenKind::Char(c) => format!("char {:?}", c),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.punct()),
        }
    }

    fn punct(&self) -> &'static str {
        match self {
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::AmpAmp => "&&",
            TokenKind::Pipe => "|",
            TokenKind::PipePipe => "||",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::EqEq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            _ => "?",
        }
    }

    fn binary_op(&self) -> Option<BinOp> {
        Some(match self {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::AmpAmp => BinOp::And,
            TokenKind::PipePipe => BinOp::Or,
            TokenKind::Amp => BinOp::BitAnd,
            TokenKind::Pipe => BinOp::BitOr,
            TokenKind::Caret => BinOp::BitXor,
            TokenKind::Shl => BinOp::Shl,
            TokenKind::Shr => BinOp::Shr,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

/// Tokens are produced on demand so that everything after a top-level
/// comma stays untouched for the format suffix.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Token, ParseError> {
        if let Some(token) = &self.peeked {
            return Ok(token.clone());
        }
        let token = self.lex()?;
        self.peeked = Some(token.clone());
        Ok(token)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lex(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.advance()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.unexpected(&token, &format!("'{}'", kind.punct())))
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        ParseError::new(token.start, expected, token.kind.describe())
    }

    /// Precedence climbing over binary operators
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let token = self.peek()?;
            let Some(op) = token.kind.binary_op() else {
                break;
            };
            let prec = op.precedence();
            if prec <= min_prec {
                break;
            }
            self.advance()?;
            let right = self.parse_binary(prec)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek()?;
        let op = match token.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Star => UnaryOp::Deref,
            TokenKind::Amp => UnaryOp::AddressOf,
            TokenKind::Plus => {
                self.advance()?;
                return self.parse_unary();
            }
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let token = self.peek()?;
            match token.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let field = self.parse_field_name()?;
                    expr = Expr::Member {
                        base: Box::new(expr),
                        field,
                    };
                }
                TokenKind::Arrow => {
                    self.advance()?;
                    let field = self.parse_field_name()?;
                    expr = Expr::Arrow {
                        base: Box::new(expr),
                        field,
                    };
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let index = self.parse_binary(0)?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_field_name(&mut self) -> Result<String, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            _ => Err(self.unexpected(&token, "field name")),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Ident(name) => Ok(match name.as_str() {
                "this" => Expr::This,
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "nullptr" | "NULL" => Expr::Literal(Literal::Int(0)),
                _ => Expr::Ident(name),
            }),
            TokenKind::Var(name) => Ok(Expr::Var(name)),
            TokenKind::Int(v) => Ok(Expr::Literal(Literal::Int(v))),
            TokenKind::Float(v) => Ok(Expr::Literal(Literal::Float(v))),
            TokenKind::Char(c) => Ok(Expr::Literal(Literal::Char(c))),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::LParen => {
                let inner = self.parse_binary(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            _ => Err(self.unexpected(&token, "expression")),
        }
    }

    // ---- lexer ----

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn lex(&mut self) -> Result<Token, ParseError> {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
        let start = self.pos;

        let Some(c) = trimmed.chars().next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
            });
        };

        let kind = if c.is_ascii_alphabetic() || c == '_' {
            TokenKind::Ident(self.lex_identifier())
        } else if c == '$' {
            self.pos += 1;
            let name = self.lex_word();
            if name.is_empty() {
                return Err(ParseError::new(start, "variable name after '$'", "nothing"));
            }
            TokenKind::Var(format!("${}", name))
        } else if c.is_ascii_digit() {
            self.lex_number()?
        } else if c == '"' {
            TokenKind::Str(self.lex_quoted('"')?)
        } else if c == '\'' {
            let text = self.lex_quoted('\'')?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => TokenKind::Char(ch),
                _ => return Err(ParseError::new(start, "single character", format!("'{}'", text))),
            }
        } else {
            self.lex_punct(start)?
        };

        Ok(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    fn lex_word(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let word = self.rest()[..len].to_string();
        self.pos += len;
        word
    }

    /// Identifiers may be scoped: `std::npos`
    fn lex_identifier(&mut self) -> String {
        let mut name = self.lex_word();
        while let Some(after) = self.rest().strip_prefix("::") {
            if !after.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                break;
            }
            self.pos += 2;
            name.push_str("::");
            name.push_str(&self.lex_word());
        }
        name
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
            .unwrap_or(self.rest().len());
        let text = &self.rest()[..len];
        self.pos += len;

        let invalid = || ParseError::new(start, "number", format!("'{}'", text));

        let is_hex = text.starts_with("0x") || text.starts_with("0X");
        if !is_hex && (text.contains('.') || text.contains(['e', 'E'])) {
            let digits = text.trim_end_matches(['f', 'F', 'l', 'L']);
            return digits.parse::<f64>().map(TokenKind::Float).map_err(|_| invalid());
        }

        let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
        let (radix, digits) = if is_hex {
            (16, &digits[2..])
        } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
            (2, bin)
        } else if digits.len() > 1 && digits.starts_with('0') {
            (8, &digits[1..])
        } else {
            (10, digits)
        };

        i128::from_str_radix(&digits.replace('_', ""), radix)
            .map(TokenKind::Int)
            .map_err(|_| invalid())
    }

    fn lex_quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        let mut out = String::new();
        let mut chars = self.rest().char_indices().skip(1);

        while let Some((offset, c)) = chars.next() {
            match c {
                c if c == quote => {
                    self.pos += offset + c.len_utf8();
                    return Ok(out);
                }
                '\\' => {
                    let Some((_, escaped)) = chars.next() else {
                        break;
                    };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }

        Err(ParseError::new(start, format!("closing {}", quote), "end of input"))
    }

    fn lex_punct(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        const PUNCTS: &[(&str, TokenKind)] = &[
            ("->", TokenKind::Arrow),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::Ne),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            (".", TokenKind::Dot),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            (",", TokenKind::Comma),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("&", TokenKind::Amp),
            ("|", TokenKind::Pipe),
            ("^", TokenKind::Caret),
            ("~", TokenKind::Tilde),
            ("!", TokenKind::Bang),
            ("<", TokenKind::Lt),
            (">", TokenKind::Gt),
        ];

        for (text, kind) in PUNCTS {
            if self.rest().starts_with(text) {
                self.pos += text.len();
                return Ok(kind.clone());
            }
        }

        let found = self.rest().chars().next().unwrap_or(' ');
        Err(ParseError::new(start, "operator or operand", format!("'{}'", found)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expr {
        parse_expr(input).unwrap().expr
    }

    #[test]
    fn test_parse_identifier() {
        assert_eq!(parse("foo"), Expr::Ident("foo".to_string()));
        assert_eq!(parse("std::npos"), Expr::Ident("std::npos".to_string()));
    }

    #[test]
    fn test_parse_member_chain() {
        let expr = parse("_Mypair._Myval2->_Mylast");
        let Expr::Arrow { base, field } = expr else {
            panic!("Expected Arrow");
        };
        assert_eq!(field, "_Mylast");
        assert!(matches!(*base, Expr::Member { ref field, .. } if field == "_Myval2"));
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse("a + b * c == d");
        let Expr::Binary { left, op, .. } = expr else {
            panic!("Expected Binary");
        };
        assert_eq!(op, BinOp::Eq);
        let Expr::Binary { right, op, .. } = *left else {
            panic!("Expected Binary");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_parse_left_associative() {
        let expr = parse("a - b - c");
        let Expr::Binary { left, .. } = expr else {
            panic!("Expected Binary");
        };
        assert!(matches!(*left, Expr::Binary { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_parse_unary_and_subscript() {
        assert!(matches!(
            parse("*ptr"),
            Expr::Unary { op: UnaryOp::Deref, .. }
        ));
        assert!(matches!(
            parse("&obj.field"),
            Expr::Unary { op: UnaryOp::AddressOf, .. }
        ));
        assert!(matches!(parse("data[$i + 1]"), Expr::Index { .. }));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42"), Expr::Literal(Literal::Int(42)));
        assert_eq!(parse("0x1F"), Expr::Literal(Literal::Int(31)));
        assert_eq!(parse("010"), Expr::Literal(Literal::Int(8)));
        assert_eq!(parse("7ul"), Expr::Literal(Literal::Int(7)));
        assert_eq!(parse("'a'"), Expr::Literal(Literal::Char('a')));
        assert_eq!(
            parse("\"a,b\""),
            Expr::Literal(Literal::String("a,b".to_string()))
        );
        assert_eq!(parse("1.5"), Expr::Literal(Literal::Float(1.5)));
    }

    #[test]
    fn test_parse_loop_variable() {
        assert_eq!(parse("$i"), Expr::Var("$i".to_string()));
        assert_eq!(parse("$T1"), Expr::Var("$T1".to_string()));
    }

    #[test]
    fn test_parse_format_suffix() {
        let parsed = parse_expr("m_count, x").unwrap();
        assert_eq!(parsed.expr, Expr::Ident("m_count".to_string()));
        let format = parsed.format.unwrap();
        assert_eq!(
            format.specifiers,
            vec![crate::expr::format::FormatSpecifier::HexInt]
        );
    }

    #[test]
    fn test_parse_without_format_suffix() {
        assert!(parse_expr("x").unwrap().format.is_none());
    }

    #[test]
    fn test_parse_error_position() {
        let err = parse_expr("a + ").unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.expected, "expression");

        let err = parse_expr("(a + b").unwrap_err();
        assert_eq!(err.expected, "')'");

        let err = parse_expr("a b").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_parse_error_bad_character() {
        let err = parse_expr("a @ b").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_parse_unterminated_string() {
        assert!(parse_expr("\"abc").is_err());
    }
}
