//! Print driver
//!
//! Entry point of one print operation. Resolves the value's rule, renders its
//! display string and hands out the lazy child sequence. Nested values
//! (compound objects inside display strings, children) re-enter the driver;
//! a guard keyed by (address, rule) stops cycles.

use std::cell::RefCell;

use log::trace;

use crate::config::EngineConfig;
use crate::document::{DisplayString, DisplayTemplate, DocumentStore, RuleId, Segment};
use crate::expand::{Child, ChildValue, ExpandCursor};
use crate::expr::{BindingContext, EvalError, Evaluator, Expr, Value};
use crate::introspect::{Introspector, Scalar, TypeCode, ValueHandle};
use crate::matcher::{NoMatch, RuleMatch, TypeMatcher};

/// Pointer/reference hops followed before matching
const MAX_INDIRECTION: usize = 8;

/// A value paired with the rule that visualizes it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The object itself, after following pointers and references
    pub handle: ValueHandle,
    /// Concrete name the rule was matched against
    pub type_name: String,
    pub rule_match: RuleMatch,
}

/// Result of printing one value
pub struct Printed<'d> {
    pub display: String,
    pub rule: RuleId,
    pub children: Children<'d>,
}

/// Lazy, restartable child sequence
pub struct Children<'d> {
    driver: &'d PrintDriver<'d>,
    cursor: ExpandCursor<'d>,
}

impl Children<'_> {
    /// Start over from the first child
    pub fn restart(&mut self) {
        self.cursor.restart();
    }
}

impl Iterator for Children<'_> {
    type Item = Child;

    fn next(&mut self) -> Option<Child> {
        self.cursor.next(self.driver)
    }
}

pub struct PrintDriver<'a> {
    store: &'a DocumentStore,
    target: &'a dyn Introspector,
    config: &'a EngineConfig,
    /// (address, rule) of every display string being rendered
    guard: RefCell<Vec<(u64, RuleId)>>,
}

impl<'a> PrintDriver<'a> {
    pub fn new(store: &'a DocumentStore, target: &'a dyn Introspector, config: &'a EngineConfig) -> Self {
        Self {
            store,
            target,
            config,
            guard: RefCell::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &'a DocumentStore {
        self.store
    }

    pub fn target(&self) -> &'a dyn Introspector {
        self.target
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    /// Find the rule for a value. Pointers and references are followed to
    /// the object; the most-derived type is tried before the static one.
    pub fn resolve(&self, value: &ValueHandle) -> Result<Resolved, NoMatch> {
        let no_match = |type_name: String| NoMatch { type_name };

        let handle = self.follow_indirection(value).map_err(|e| {
            trace!("Cannot resolve value at 0x{:x}: {}", value.address, e);
            no_match(String::new())
        })?;

        let dynamic = self.target.dynamic_type(&handle).unwrap_or(handle.ty);
        if dynamic != handle.ty {
            let derived = ValueHandle { ty: dynamic, ..handle };
            if let Ok(resolved) = self.match_handle(derived) {
                return Ok(resolved);
            }
        }
        self.match_handle(handle)
    }

    fn follow_indirection(&self, value: &ValueHandle) -> Result<ValueHandle, EvalError> {
        let mut handle = *value;
        for _ in 0..MAX_INDIRECTION {
            let desc = self.target.describe_resolved(handle.ty)?;
            let (TypeCode::Pointer | TypeCode::Reference, Some(pointee)) = (desc.code, desc.target) else {
                return Ok(handle);
            };

            let address = match self.target.read_scalar(&handle)? {
                Scalar::Pointer(address) => address,
                other => return Err(EvalError::type_mismatch("pointer", format!("{:?}", other))),
            };
            if address == 0 {
                return Err(EvalError::NullPointer);
            }
            if self.target.describe_resolved(pointee)?.code == TypeCode::Void {
                return Err(EvalError::type_mismatch("typed pointer", "void*"));
            }
            handle = ValueHandle::new(address, pointee);
        }
        Err(EvalError::invalid_op("*", "pointer chain", ""))
    }

    fn match_handle(&self, handle: ValueHandle) -> Result<Resolved, NoMatch> {
        let type_name = self.concrete_name(&handle).ok_or_else(|| NoMatch {
            type_name: String::new(),
        })?;
        let rule_match = TypeMatcher::new(self.store).best_match(&type_name)?;
        Ok(Resolved {
            handle: ValueHandle {
                ty: self.target.strip_typedefs(handle.ty).unwrap_or(handle.ty),
                ..handle
            },
            type_name,
            rule_match,
        })
    }

    /// Name to match, with template arguments appended when the debugger
    /// reports them separately
    fn concrete_name(&self, handle: &ValueHandle) -> Option<String> {
        let desc = self.target.describe_resolved(handle.ty).ok()?;
        let name = desc.name.as_deref().filter(|n| !n.is_empty())?;
        if desc.template_args.is_empty() || name.contains('<') {
            Some(name.to_string())
        } else {
            Some(format!("{}<{}>", name, desc.template_args.join(",")))
        }
    }

    /// Print a value: its display string and children
    pub fn print(&self, value: &ValueHandle) -> Result<Printed<'_>, NoMatch> {
        let resolved = self.resolve(value)?;
        let id = resolved.rule_match.rule;
        let rule = self.store.rule(id).ok_or_else(|| NoMatch {
            type_name: resolved.type_name.clone(),
        })?;

        let display = self.rule_display(&resolved);
        Ok(Printed {
            display,
            rule: id,
            children: Children {
                driver: self,
                cursor: ExpandCursor::new(rule, &resolved),
            },
        })
    }

    /// Children of a value with a matching rule
    pub fn children(&self, value: &ValueHandle) -> Option<Children<'_>> {
        self.print(value).ok().map(|printed| printed.children)
    }

    /// Children of an evaluated child value
    pub fn children_of(&self, value: &Value) -> Option<Children<'_>> {
        self.children(&self.object_of(value)?)
    }

    /// Whether a child value can be expanded further
    pub fn has_children(&self, value: &Value) -> bool {
        let Some(handle) = self.object_of(value) else {
            return false;
        };
        match self.resolve(&handle) {
            Ok(resolved) => self
                .store
                .rule(resolved.rule_match.rule)
                .is_some_and(|rule| !rule.expand.is_empty()),
            Err(_) => false,
        }
    }

    /// Object a child value refers to: the object itself, or a non-null
    /// pointer's pointee
    pub fn object_of(&self, value: &Value) -> Option<ValueHandle> {
        match value {
            Value::Object(handle) => Some(*handle),
            Value::Pointer { address, pointee } if *address != 0 => Some(ValueHandle::new(*address, *pointee)),
            _ => None,
        }
    }

    /// Display string of an object: its rule's, or the host's default
    pub fn display(&self, value: &ValueHandle) -> String {
        match self.resolve(value) {
            Ok(resolved) => self.rule_display(&resolved),
            Err(_) => self
                .target
                .format_default(value)
                .unwrap_or_else(|e| self.config.error_text(e)),
        }
    }

    /// Text for an evaluated value
    pub fn format_value(&self, value: &Value) -> String {
        self.value_text(value.clone())
            .unwrap_or_else(|e| self.config.error_text(e))
    }

    /// Text for a child
    pub fn format_child(&self, child: &Child) -> String {
        match &child.value {
            ChildValue::Value(value) => self.format_value(value),
            ChildValue::Text(text) => text.clone(),
            ChildValue::Error(e) => self.config.error_text(e),
        }
    }

    /// Guarded rendering of a resolved rule's display string
    fn rule_display(&self, resolved: &Resolved) -> String {
        let key = (resolved.handle.address, resolved.rule_match.rule);
        {
            let guard = self.guard.borrow();
            if guard.contains(&key) || guard.len() >= self.config.max_format_depth {
                trace!("Display recursion stopped at 0x{:x}", key.0);
                return self.config.cycle_marker.clone();
            }
        }

        self.guard.borrow_mut().push(key);
        let bindings = BindingContext::new(resolved.handle).with_template_args(&resolved.rule_match.wildcards);
        let rendered = self
            .store
            .rule(key.1)
            .and_then(|rule| self.render_display(&rule.display_strings, bindings));
        self.guard.borrow_mut().pop();

        rendered.unwrap_or_else(|| {
            self.target
                .format_default(&resolved.handle)
                .unwrap_or_else(|e| self.config.error_text(e))
        })
    }

    /// First display string whose condition holds, rendered
    pub(crate) fn render_display(&self, entries: &[DisplayString], bindings: BindingContext<'_>) -> Option<String> {
        let evaluator = Evaluator::new(self.target, bindings);
        entries
            .iter()
            .find(|entry| self.condition_holds(&evaluator, entry))
            .map(|entry| self.render_template(&evaluator, &entry.template))
    }

    fn condition_holds(&self, evaluator: &Evaluator<'_>, entry: &DisplayString) -> bool {
        let Some(condition) = &entry.condition else {
            return true;
        };
        match &condition.parsed {
            Ok(parsed) => evaluator.eval_bool(&parsed.expr).unwrap_or_else(|e| {
                trace!("Condition '{}' failed: {}", condition.source, e);
                false
            }),
            Err(_) => false,
        }
    }

    fn render_template(&self, evaluator: &Evaluator<'_>, template: &DisplayTemplate) -> String {
        let mut out = String::new();
        for segment in &template.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(expr) => match &expr.parsed {
                    Ok(parsed) => {
                        let text =
                            evaluator
                                .eval_parsed(parsed)
                                .and_then(|value| match (&parsed.expr, value) {
                                    // Template arguments are type names, not string literals
                                    (Expr::Var(_), Value::String(name)) => Ok(name),
                                    (_, value) => self.value_text(value),
                                });
                        match text {
                            Ok(text) => out.push_str(&text),
                            Err(e) => {
                                trace!("Segment '{{{}}}' failed: {}", expr.source, e);
                                out.push_str(&self.config.error_text(e));
                            }
                        }
                    }
                    Err(_) => {
                        out.push('{');
                        out.push_str(&expr.source);
                        out.push('}');
                    }
                },
            }
        }
        out
    }

    fn value_text(&self, value: Value) -> Result<String, EvalError> {
        match value {
            Value::Object(handle) => {
                let desc = self.target.describe_resolved(handle.ty)?;
                if desc.code.is_compound() {
                    return Ok(self.display(&handle));
                }
                if desc.code == TypeCode::Array || desc.code == TypeCode::Void {
                    return Ok(self.target.format_default(&handle)?);
                }
                let loaded = Evaluator::new(self.target, BindingContext::new(handle)).load(Value::Object(handle))?;
                match loaded {
                    Value::Object(other) if other == handle => Ok(self.target.format_default(&other)?),
                    loaded => self.value_text(loaded),
                }
            }
            Value::Pointer { address, pointee } => {
                let desc = self.target.describe_resolved(pointee)?;
                if desc.code == TypeCode::Char && address != 0 {
                    let char_size = desc.size.max(1);
                    if let Ok(text) =
                        self.target
                            .read_c_string(address, char_size, self.config.max_string_length)
                    {
                        return Ok(format!("{:?}", text));
                    }
                }
                Ok(value.to_string())
            }
            other => Ok(other.to_string()),
        }
    }
}
