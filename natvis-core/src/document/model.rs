//! Visualizer rule model
//!
//! Everything here is built once when a document is loaded and never
//! changes afterwards. Expressions are parsed eagerly; a parse failure is
//! kept alongside the source text so that rendering can degrade to the raw
//! text instead of failing.

use crate::expr::{parse_expr, ParseError, ParsedExpr};
use crate::matcher::TemplateType;

/// Expression source with its parse result
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub source: String,
    pub parsed: Result<ParsedExpr, ParseError>,
}

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let parsed = parse_expr(&source);
        Self { source, parsed }
    }
}

/// One piece of a display string template
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expression),
}

/// `literal {expr} literal` with `{{` and `}}` escapes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayTemplate {
    pub segments: Vec<Segment>,
}

impl DisplayTemplate {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => match find_closing_brace(&text[i + 1..]) {
                    Some(len) => {
                        if !literal.is_empty() {
                            segments.push(Segment::Text(std::mem::take(&mut literal)));
                        }
                        let source = &text[i + 1..i + 1 + len];
                        segments.push(Segment::Expr(Expression::new(source)));
                        // Skip the expression and its closing brace
                        while chars.next_if(|(j, _)| *j <= i + 1 + len).is_some() {}
                    }
                    // Unterminated: the rest is literal text
                    None => literal.push(c),
                },
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }
        Self { segments }
    }
}

/// Byte length up to the `}` closing an expression, skipping quoted literals
fn find_closing_brace(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '}' => return Some(i),
            None => {}
        }
    }
    None
}

/// `<DisplayString Condition="...">`
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayString {
    pub condition: Option<Expression>,
    pub template: DisplayTemplate,
}

/// Where `IndexListItems` takes its indices from
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSource {
    /// `<Size>`: indices `0..size`
    Size(Expression),
    /// One `<Index>` element per index, in order
    Indices(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpandKind {
    Item {
        name: String,
        value: Expression,
    },
    ArrayItems {
        size: Expression,
        value_pointer: Expression,
    },
    IndexListItems {
        indices: IndexSource,
        value_node: Expression,
    },
    ExpandedItem {
        value: Expression,
    },
    Synthetic {
        name: String,
        display_strings: Vec<DisplayString>,
    },
}

impl ExpandKind {
    pub fn element_name(&self) -> &'static str {
        match self {
            ExpandKind::Item { .. } => "Item",
            ExpandKind::ArrayItems { .. } => "ArrayItems",
            ExpandKind::IndexListItems { .. } => "IndexListItems",
            ExpandKind::ExpandedItem { .. } => "ExpandedItem",
            ExpandKind::Synthetic { .. } => "Synthetic",
        }
    }
}

/// One child-producing directive inside `<Expand>`
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandItem {
    pub condition: Option<Expression>,
    pub kind: ExpandKind,
}

/// One `<Type>` element
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerRule {
    /// `Name` attribute as written
    pub name: String,
    /// Primary pattern first, then `<AlternativeType>` patterns
    pub patterns: Vec<TemplateType>,
    pub display_strings: Vec<DisplayString>,
    pub expand: Vec<ExpandItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(template: &DisplayTemplate) -> Vec<String> {
        template
            .segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => format!("T:{}", t),
                Segment::Expr(e) => format!("E:{}", e.source),
            })
            .collect()
    }

    #[test]
    fn test_display_template_segments() {
        let template = DisplayTemplate::parse("size={_size} first={_first[0]}");
        assert_eq!(
            sources(&template),
            vec!["T:size=", "E:_size", "T: first=", "E:_first[0]"]
        );
    }

    #[test]
    fn test_display_template_escapes() {
        let template = DisplayTemplate::parse("{{x={x}}}");
        assert_eq!(sources(&template), vec!["T:{x=", "E:x", "T:}"]);
    }

    #[test]
    fn test_display_template_format_suffix() {
        let template = DisplayTemplate::parse("{count,d}");
        let Segment::Expr(expr) = &template.segments[0] else {
            panic!("expected expression segment");
        };
        let parsed = expr.parsed.as_ref().unwrap();
        assert!(parsed.format.is_some());
    }

    #[test]
    fn test_display_template_brace_in_string_literal() {
        let template = DisplayTemplate::parse(r#"{name == "}"}!"#);
        assert_eq!(sources(&template), vec![r#"E:name == "}""#, "T:!"]);
    }

    #[test]
    fn test_display_template_unterminated() {
        let template = DisplayTemplate::parse("a {b");
        assert_eq!(sources(&template), vec!["T:a {b"]);
    }

    #[test]
    fn test_unparsable_expression_is_kept() {
        let template = DisplayTemplate::parse("{a +}");
        let Segment::Expr(expr) = &template.segments[0] else {
            panic!("expected expression segment");
        };
        assert_eq!(expr.source, "a +");
        assert!(expr.parsed.is_err());
    }
}
