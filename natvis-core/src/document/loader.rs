//! Natvis document loading
//!
//! Turns the element tree into rules. Problems with a whole document (bad
//! XML, wrong root, a type without a Name) reject the document; an invalid
//! type pattern drops that rule or alternative, and a malformed expand item
//! drops that item. Both are recorded as diagnostics.

use log::{debug, warn};
use thiserror::Error;

use super::model::{
    DisplayString, DisplayTemplate, ExpandItem, ExpandKind, Expression, IndexSource,
    VisualizerRule,
};
use super::xml::{parse_tree, Element};
use super::DocumentError;
use crate::matcher::{TemplateError, TemplateType};

const ROOT_ELEMENT: &str = "AutoVisualizer";

/// A malformed expand item, skipped at load
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("{type_name}: <{element}> has no {attribute} attribute")]
    MissingAttribute {
        type_name: String,
        element: String,
        attribute: String,
    },

    #[error("{type_name}: <{element}> has no <{child}> element")]
    MissingChild {
        type_name: String,
        element: String,
        child: String,
    },

    #[error("{type_name}: <{element}> has no expression")]
    MissingExpression { type_name: String, element: String },

    #[error("Invalid type pattern {source}")]
    Pattern { source: TemplateError },
}

/// One loaded visualizer file
#[derive(Debug, Clone)]
pub struct VisualizerDocument {
    /// File path or caller-supplied label
    pub source: String,
    /// Rules in declaration order
    pub rules: Vec<VisualizerRule>,
    pub diagnostics: Vec<StructuralError>,
}

impl VisualizerDocument {
    pub fn parse(xml: &str, source: impl Into<String>) -> Result<Self, DocumentError> {
        let source = source.into();
        let root = parse_tree(xml)?;
        if root.name != ROOT_ELEMENT {
            return Err(DocumentError::UnexpectedRoot(root.name));
        }

        let mut document = VisualizerDocument {
            source,
            rules: Vec::new(),
            diagnostics: Vec::new(),
        };

        for child in &root.children {
            if child.name != "Type" {
                debug!("{}: ignoring <{}>", document.source, child.name);
                continue;
            }
            if let Some(rule) = document.parse_type(child)? {
                document.rules.push(rule);
            }
        }

        debug!(
            "Loaded {} rules from '{}' ({} diagnostics)",
            document.rules.len(),
            document.source,
            document.diagnostics.len()
        );
        Ok(document)
    }

    /// A `<Type>` whose own pattern is invalid is dropped
    fn parse_type(&mut self, element: &Element) -> Result<Option<VisualizerRule>, DocumentError> {
        let name = element.attr("Name").ok_or(DocumentError::MissingTypeName)?;
        let mut patterns = match TemplateType::parse(name) {
            Ok(pattern) => vec![pattern],
            Err(e) => {
                self.reject_pattern("type", e);
                return Ok(None);
            }
        };
        let mut display_strings = Vec::new();
        let mut expand = Vec::new();

        for child in &element.children {
            match child.name.as_str() {
                "AlternativeType" => {
                    let alternative = child
                        .attr("Name")
                        .ok_or(DocumentError::MissingTypeName)?;
                    match TemplateType::parse(alternative) {
                        Ok(pattern) => patterns.push(pattern),
                        Err(e) => self.reject_pattern("alternative type", e),
                    }
                }
                "DisplayString" => display_strings.push(parse_display_string(child)),
                "Expand" => {
                    for item in &child.children {
                        match parse_expand_item(name, item) {
                            Ok(Some(item)) => expand.push(item),
                            Ok(None) => debug!("{}: ignoring <{}> in <Expand>", name, item.name),
                            Err(e) => {
                                warn!("{}: dropping expand item: {}", self.source, e);
                                self.diagnostics.push(e);
                            }
                        }
                    }
                }
                other => debug!("{}: ignoring <{}>", name, other),
            }
        }

        Ok(Some(VisualizerRule {
            name: name.to_string(),
            patterns,
            display_strings,
            expand,
        }))
    }

    fn reject_pattern(&mut self, what: &str, source: TemplateError) {
        let error = StructuralError::Pattern { source };
        warn!("{}: dropping {}: {}", self.source, what, error);
        self.diagnostics.push(error);
    }
}

fn parse_display_string(element: &Element) -> DisplayString {
    DisplayString {
        condition: condition(element),
        template: DisplayTemplate::parse(&element.text),
    }
}

fn condition(element: &Element) -> Option<Expression> {
    element.attr("Condition").map(Expression::new)
}

/// Expression in an element's text
fn text_expression(type_name: &str, element: &Element) -> Result<Expression, StructuralError> {
    let text = element.trimmed_text();
    if text.is_empty() {
        return Err(StructuralError::MissingExpression {
            type_name: type_name.to_string(),
            element: element.name.clone(),
        });
    }
    Ok(Expression::new(text))
}

/// Expression in a required child element's text
fn child_expression(
    type_name: &str,
    element: &Element,
    child: &str,
) -> Result<Expression, StructuralError> {
    let found = element.child(child).ok_or_else(|| StructuralError::MissingChild {
        type_name: type_name.to_string(),
        element: element.name.clone(),
        child: child.to_string(),
    })?;
    text_expression(type_name, found)
}

fn name_attribute<'e>(type_name: &str, element: &'e Element) -> Result<&'e str, StructuralError> {
    element.attr("Name").ok_or_else(|| StructuralError::MissingAttribute {
        type_name: type_name.to_string(),
        element: element.name.clone(),
        attribute: "Name".to_string(),
    })
}

/// `Ok(None)` for elements that are not expand items
fn parse_expand_item(type_name: &str, element: &Element) -> Result<Option<ExpandItem>, StructuralError> {
    let kind = match element.name.as_str() {
        "Item" => ExpandKind::Item {
            name: name_attribute(type_name, element)?.to_string(),
            value: text_expression(type_name, element)?,
        },
        "ArrayItems" => ExpandKind::ArrayItems {
            size: child_expression(type_name, element, "Size")?,
            value_pointer: child_expression(type_name, element, "ValuePointer")?,
        },
        "IndexListItems" => {
            let indices = if element.child("Size").is_some() {
                IndexSource::Size(child_expression(type_name, element, "Size")?)
            } else {
                let indices = element
                    .children_named("Index")
                    .map(|index| text_expression(type_name, index))
                    .collect::<Result<Vec<_>, _>>()?;
                if indices.is_empty() {
                    return Err(StructuralError::MissingChild {
                        type_name: type_name.to_string(),
                        element: element.name.clone(),
                        child: "Size".to_string(),
                    });
                }
                IndexSource::Indices(indices)
            };
            ExpandKind::IndexListItems {
                indices,
                value_node: child_expression(type_name, element, "ValueNode")?,
            }
        }
        "ExpandedItem" => ExpandKind::ExpandedItem {
            value: text_expression(type_name, element)?,
        },
        "Synthetic" => ExpandKind::Synthetic {
            name: name_attribute(type_name, element)?.to_string(),
            display_strings: element
                .children_named("DisplayString")
                .map(parse_display_string)
                .collect(),
        },
        _ => return Ok(None),
    };

    Ok(Some(ExpandItem {
        condition: condition(element),
        kind,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<AutoVisualizer xmlns="http://schemas.microsoft.com/vstudio/debugger/natvis/2010">
  <Type Name="Vector&lt;*&gt;">
    <AlternativeType Name="SmallVector&lt;*,*&gt;"/>
    <DisplayString Condition="_size == 0">empty</DisplayString>
    <DisplayString>{{ size={_size} }}</DisplayString>
    <Expand>
      <Item Name="[size]">_size</Item>
      <ArrayItems Condition="_size != 0">
        <Size>_size</Size>
        <ValuePointer>_first</ValuePointer>
      </ArrayItems>
      <IndexListItems>
        <Index>2</Index>
        <Index>4</Index>
        <ValueNode>_first[$i]</ValueNode>
      </IndexListItems>
      <ExpandedItem>_first</ExpandedItem>
      <Synthetic Name="[raw]">
        <DisplayString>{_first}</DisplayString>
      </Synthetic>
      <CustomListItems/>
    </Expand>
  </Type>
  <UIVisualizer ServiceId="{0}" Id="1"/>
</AutoVisualizer>"#;

    #[test]
    fn test_parse_full_rule() {
        let doc = VisualizerDocument::parse(VECTOR, "vector.natvis").unwrap();
        assert_eq!(doc.rules.len(), 1);
        assert!(doc.diagnostics.is_empty());

        let rule = &doc.rules[0];
        assert_eq!(rule.name, "Vector<*>");
        assert_eq!(rule.patterns.len(), 2);
        assert_eq!(rule.patterns[1].args.len(), 2);
        assert_eq!(rule.display_strings.len(), 2);
        assert_eq!(
            rule.display_strings[0].condition.as_ref().unwrap().source,
            "_size == 0"
        );

        let kinds: Vec<_> = rule.expand.iter().map(|i| i.kind.element_name()).collect();
        assert_eq!(
            kinds,
            vec!["Item", "ArrayItems", "IndexListItems", "ExpandedItem", "Synthetic"]
        );
        assert!(rule.expand[1].condition.is_some());
        assert!(matches!(
            &rule.expand[2].kind,
            ExpandKind::IndexListItems { indices: IndexSource::Indices(list), .. } if list.len() == 2
        ));
    }

    #[test]
    fn test_structural_errors_drop_only_the_item() {
        let xml = r#"<AutoVisualizer>
  <Type Name="Broken">
    <Expand>
      <Item>noname</Item>
      <ArrayItems><ValuePointer>p</ValuePointer></ArrayItems>
      <IndexListItems><Size>3</Size></IndexListItems>
      <Item Name="ok">value</Item>
      <ExpandedItem>   </ExpandedItem>
    </Expand>
  </Type>
</AutoVisualizer>"#;
        let doc = VisualizerDocument::parse(xml, "broken.natvis").unwrap();
        assert_eq!(doc.rules[0].expand.len(), 1);
        assert_eq!(doc.diagnostics.len(), 4);
        assert!(matches!(
            &doc.diagnostics[1],
            StructuralError::MissingChild { child, .. } if child == "Size"
        ));
        assert!(matches!(
            &doc.diagnostics[2],
            StructuralError::MissingChild { child, .. } if child == "ValueNode"
        ));
    }

    #[test]
    fn test_wrong_root_rejected() {
        let result = VisualizerDocument::parse("<Types/>", "x");
        assert!(matches!(result, Err(DocumentError::UnexpectedRoot(name)) if name == "Types"));
    }

    #[test]
    fn test_type_without_name_rejected() {
        let result = VisualizerDocument::parse("<AutoVisualizer><Type/></AutoVisualizer>", "x");
        assert!(matches!(result, Err(DocumentError::MissingTypeName)));
    }

    #[test]
    fn test_bad_pattern_drops_only_its_rule() {
        let xml = r#"<AutoVisualizer>
  <Type Name="Point"><DisplayString>p</DisplayString></Type>
  <Type Name="Vector&lt;"><DisplayString>v</DisplayString></Type>
  <Type Name="Outer&lt;*&gt;::Inner&lt;*&gt;">
    <AlternativeType Name="Other&lt;,&gt;"/>
    <DisplayString>inner</DisplayString>
  </Type>
</AutoVisualizer>"#;
        let doc = VisualizerDocument::parse(xml, "x").unwrap();
        let names: Vec<_> = doc.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Point", "Outer<*>::Inner<*>"]);
        assert_eq!(doc.rules[1].patterns.len(), 1);
        assert_eq!(doc.diagnostics.len(), 2);
        assert!(matches!(
            &doc.diagnostics[0],
            StructuralError::Pattern { source } if source.input == "Vector<"
        ));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let result = VisualizerDocument::parse("<AutoVisualizer><Type>", "x");
        assert!(matches!(result, Err(DocumentError::Xml { .. })));
    }

    #[test]
    fn test_bad_expression_is_not_structural() {
        let xml = r#"<AutoVisualizer><Type Name="T"><Expand><Item Name="a">x +</Item></Expand></Type></AutoVisualizer>"#;
        let doc = VisualizerDocument::parse(xml, "x").unwrap();
        assert!(doc.diagnostics.is_empty());
        let ExpandKind::Item { value, .. } = &doc.rules[0].expand[0].kind else {
            panic!("expected item");
        };
        assert!(value.parsed.is_err());
    }
}
