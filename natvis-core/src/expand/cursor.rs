//! Resumable expansion cursor

use log::{debug, trace};

use super::{Child, ChildValue, ExpandError};
use crate::document::{ExpandItem, ExpandKind, Expression, IndexSource, RuleId, VisualizerRule};
use crate::expr::{BindingContext, EvalError, Evaluator, Value};
use crate::introspect::{TypeId, ValueHandle};
use crate::printer::{PrintDriver, Resolved};

/// Progress inside the current expand item
#[derive(Debug)]
enum ItemState<'a> {
    /// Condition not yet checked
    Start,
    Array {
        size: i128,
        next: i128,
        /// `ValuePointer`, evaluated on the first element
        base: Option<(u64, TypeId)>,
    },
    IndexRange {
        size: i128,
        next: i128,
    },
    IndexList {
        next: usize,
    },
    Splice(Box<ExpandCursor<'a>>),
    /// `ExpandedItem` on a value without a rule: its data members
    Fields {
        handle: ValueHandle,
        next: usize,
    },
}

/// Position in the child sequence of one rule applied to one value
#[derive(Debug)]
pub struct ExpandCursor<'a> {
    rule: &'a VisualizerRule,
    subject: ValueHandle,
    wildcards: Vec<String>,
    /// `ExpandedItem` nesting level of this cursor
    depth: usize,
    /// (address, rule) of this cursor and every cursor splicing it
    chain: Vec<(u64, RuleId)>,
    item: usize,
    state: ItemState<'a>,
}

impl<'a> ExpandCursor<'a> {
    pub fn new(rule: &'a VisualizerRule, resolved: &Resolved) -> Self {
        Self::nested(rule, resolved, 0, Vec::new())
    }

    fn nested(
        rule: &'a VisualizerRule,
        resolved: &Resolved,
        depth: usize,
        mut chain: Vec<(u64, RuleId)>,
    ) -> Self {
        chain.push((resolved.handle.address, resolved.rule_match.rule));
        Self {
            rule,
            subject: resolved.handle,
            wildcards: resolved.rule_match.wildcards.clone(),
            depth,
            chain,
            item: 0,
            state: ItemState::Start,
        }
    }

    /// Rewind to the first child
    pub fn restart(&mut self) {
        self.item = 0;
        self.state = ItemState::Start;
    }

    /// Produce the next child, or `None` once every item is exhausted
    pub fn next(&mut self, driver: &PrintDriver<'a>) -> Option<Child> {
        let rule = self.rule;
        loop {
            let item = rule.expand.get(self.item)?;
            let state = std::mem::replace(&mut self.state, ItemState::Start);

            let produced = match state {
                ItemState::Start => self.enter(driver, item),
                ItemState::Array { size, next, base } => {
                    self.next_array_element(driver, item, size, next, base)
                }
                ItemState::IndexRange { size, next } => self.next_index(driver, item, size, next),
                ItemState::IndexList { next } => self.next_listed_index(driver, item, next),
                ItemState::Splice(mut inner) => match inner.next(driver) {
                    Some(child) => {
                        self.state = ItemState::Splice(inner);
                        Some(child)
                    }
                    None => {
                        self.advance();
                        None
                    }
                },
                ItemState::Fields { handle, next } => self.next_field(driver, handle, next),
            };

            if produced.is_some() {
                return produced;
            }
        }
    }

    fn advance(&mut self) {
        self.item += 1;
        self.state = ItemState::Start;
    }

    fn bindings(&self) -> BindingContext<'_> {
        BindingContext::new(self.subject).with_template_args(&self.wildcards)
    }

    fn eval(
        &self,
        driver: &PrintDriver<'_>,
        expr: &Expression,
        index: Option<i128>,
    ) -> Result<Value, ExpandError> {
        let parsed = expr.parsed.as_ref().map_err(|e| ExpandError::Parse(e.clone()))?;
        let mut bindings = self.bindings();
        if let Some(index) = index {
            bindings = bindings.with_index(index);
        }
        Ok(Evaluator::new(driver.target(), bindings).eval_parsed(parsed)?)
    }

    fn eval_int(
        &self,
        driver: &PrintDriver<'_>,
        expr: &Expression,
        index: Option<i128>,
    ) -> Result<i128, ExpandError> {
        let value = self.load(driver, self.eval(driver, expr, index)?)?;
        value
            .to_i128()
            .ok_or_else(|| EvalError::type_mismatch("integer", value.type_name()).into())
    }

    fn load(&self, driver: &PrintDriver<'_>, value: Value) -> Result<Value, EvalError> {
        Evaluator::new(driver.target(), self.bindings()).load(value)
    }

    fn condition_holds(&self, driver: &PrintDriver<'_>, condition: Option<&Expression>) -> bool {
        let Some(condition) = condition else {
            return true;
        };
        let result = condition
            .parsed
            .as_ref()
            .map_err(|e| ExpandError::Parse(e.clone()))
            .and_then(|parsed| {
                Ok(Evaluator::new(driver.target(), self.bindings()).eval_bool(&parsed.expr)?)
            });
        match result {
            Ok(holds) => holds,
            Err(e) => {
                trace!("Condition '{}' failed: {}", condition.source, e);
                false
            }
        }
    }

    /// Evaluate a child expression; scalar lvalues are loaded right away so
    /// unreadable memory shows up on the child itself
    fn child_value(&self, driver: &PrintDriver<'_>, expr: &Expression, index: Option<i128>) -> ChildValue {
        match self.eval(driver, expr, index) {
            Ok(value) => self.materialize(driver, value),
            Err(e) => {
                trace!("Expand expression '{}' failed: {}", expr.source, e);
                ChildValue::Error(e)
            }
        }
    }

    fn materialize(&self, driver: &PrintDriver<'_>, value: Value) -> ChildValue {
        let Value::Object(handle) = value else {
            return ChildValue::Value(value);
        };
        let scalar = driver
            .target()
            .describe_resolved(handle.ty)
            .map(|desc| desc.code.is_scalar());
        match scalar {
            Ok(true) => match self.load(driver, value) {
                Ok(loaded) => ChildValue::Value(loaded),
                Err(e) => ChildValue::Error(e.into()),
            },
            Ok(false) => ChildValue::Value(value),
            Err(e) => ChildValue::Error(EvalError::from(e).into()),
        }
    }

    fn enter(&mut self, driver: &PrintDriver<'a>, item: &'a ExpandItem) -> Option<Child> {
        if !self.condition_holds(driver, item.condition.as_ref()) {
            self.advance();
            return None;
        }

        match &item.kind {
            ExpandKind::Item { name, value } => {
                let value = self.child_value(driver, value, None);
                self.advance();
                Some(Child::new(name.clone(), value))
            }
            ExpandKind::ArrayItems { size, .. } => match self.eval_int(driver, size, None) {
                Ok(size) => {
                    self.state = ItemState::Array {
                        size: size.max(0),
                        next: 0,
                        base: None,
                    };
                    None
                }
                Err(e) => {
                    self.advance();
                    Some(Child::error("Size", e))
                }
            },
            ExpandKind::IndexListItems {
                indices: IndexSource::Size(size),
                ..
            } => match self.eval_int(driver, size, None) {
                Ok(size) => {
                    self.state = ItemState::IndexRange {
                        size: size.max(0),
                        next: 0,
                    };
                    None
                }
                Err(e) => {
                    self.advance();
                    Some(Child::error("Size", e))
                }
            },
            ExpandKind::IndexListItems {
                indices: IndexSource::Indices(_),
                ..
            } => {
                self.state = ItemState::IndexList { next: 0 };
                None
            }
            ExpandKind::ExpandedItem { value } => match self.splice(driver, value) {
                Ok(state) => {
                    self.state = state;
                    None
                }
                Err(child) => {
                    self.advance();
                    Some(child)
                }
            },
            ExpandKind::Synthetic {
                name,
                display_strings,
            } => {
                let text = driver
                    .render_display(display_strings, self.bindings())
                    .unwrap_or_default();
                self.advance();
                Some(Child::new(name.clone(), ChildValue::Text(text)))
            }
        }
    }

    fn next_array_element(
        &mut self,
        driver: &PrintDriver<'a>,
        item: &'a ExpandItem,
        size: i128,
        next: i128,
        base: Option<(u64, TypeId)>,
    ) -> Option<Child> {
        let ExpandKind::ArrayItems { value_pointer, .. } = &item.kind else {
            self.advance();
            return None;
        };
        if next >= size {
            self.advance();
            return None;
        }

        let (address, pointee) = match base {
            Some(base) => base,
            None => match self.array_base(driver, value_pointer) {
                Ok(base) => base,
                Err(e) => {
                    self.advance();
                    return Some(Child::error("[0]", e));
                }
            },
        };

        let name = format!("[{}]", next);
        let element = Evaluator::new(driver.target(), self.bindings())
            .offset_pointer(address, pointee, next);
        match element {
            Ok(element) => {
                let value = self.materialize(driver, Value::Object(ValueHandle::new(element, pointee)));
                self.state = ItemState::Array {
                    size,
                    next: next + 1,
                    base: Some((address, pointee)),
                };
                Some(Child::new(name, value))
            }
            Err(e) => {
                self.advance();
                Some(Child::error(name, e))
            }
        }
    }

    fn array_base(
        &self,
        driver: &PrintDriver<'_>,
        value_pointer: &Expression,
    ) -> Result<(u64, TypeId), ExpandError> {
        let value = self.eval(driver, value_pointer, Some(0))?;
        match self.load(driver, value)? {
            Value::Pointer { address, pointee } => Ok((address, pointee)),
            other => Err(EvalError::type_mismatch("pointer", other.type_name()).into()),
        }
    }

    fn next_index(
        &mut self,
        driver: &PrintDriver<'a>,
        item: &'a ExpandItem,
        size: i128,
        next: i128,
    ) -> Option<Child> {
        let ExpandKind::IndexListItems { value_node, .. } = &item.kind else {
            self.advance();
            return None;
        };
        if next >= size {
            self.advance();
            return None;
        }

        let value = self.child_value(driver, value_node, Some(next));
        self.state = ItemState::IndexRange {
            size,
            next: next + 1,
        };
        Some(Child::new(format!("[{}]", next), value))
    }

    fn next_listed_index(
        &mut self,
        driver: &PrintDriver<'a>,
        item: &'a ExpandItem,
        next: usize,
    ) -> Option<Child> {
        let ExpandKind::IndexListItems {
            indices: IndexSource::Indices(indices),
            value_node,
        } = &item.kind
        else {
            self.advance();
            return None;
        };
        let Some(index_expr) = indices.get(next) else {
            self.advance();
            return None;
        };

        let child = match self.eval_int(driver, index_expr, None) {
            Ok(index) => Child::new(
                format!("[{}]", index),
                self.child_value(driver, value_node, Some(index)),
            ),
            Err(e) => Child::error(format!("[{}]", index_expr.source), e),
        };
        self.state = ItemState::IndexList { next: next + 1 };
        Some(child)
    }

    /// Set up an `ExpandedItem`, or explain with a single child why it
    /// cannot be spliced
    fn splice(&self, driver: &PrintDriver<'a>, expr: &Expression) -> Result<ItemState<'a>, Child> {
        let name = || expr.source.clone();
        let marker = || Child::new(name(), ChildValue::Text(driver.config().cycle_marker.clone()));

        let value = self
            .eval(driver, expr, None)
            .and_then(|v| Ok(self.load(driver, v)?))
            .map_err(|e| Child::error(name(), e))?;
        let handle = match value {
            Value::Object(handle) => handle,
            Value::Pointer { address, pointee } if address != 0 => ValueHandle::new(address, pointee),
            Value::Pointer { .. } => return Err(Child::error(name(), EvalError::NullPointer)),
            other => {
                return Err(Child::error(
                    name(),
                    EvalError::type_mismatch("object", other.type_name()),
                ))
            }
        };

        if self.depth >= driver.config().max_expansion_depth {
            debug!("Expansion depth limit reached at '{}'", expr.source);
            return Err(marker());
        }

        let Ok(resolved) = driver.resolve(&handle) else {
            return Ok(ItemState::Fields { handle, next: 0 });
        };
        let key = (resolved.handle.address, resolved.rule_match.rule);
        if self.chain.contains(&key) {
            debug!("Cyclic expansion at '{}' (0x{:x})", expr.source, key.0);
            return Err(marker());
        }
        let Some(rule) = driver.store().rule(key.1) else {
            return Ok(ItemState::Fields { handle, next: 0 });
        };

        Ok(ItemState::Splice(Box::new(ExpandCursor::nested(
            rule,
            &resolved,
            self.depth + 1,
            self.chain.clone(),
        ))))
    }

    fn next_field(&mut self, driver: &PrintDriver<'a>, handle: ValueHandle, next: usize) -> Option<Child> {
        let target = driver.target();
        let field = match target.describe_resolved(handle.ty) {
            Ok(desc) => desc.fields.get(next),
            Err(e) => {
                self.advance();
                return Some(Child::error("[fields]", EvalError::from(e)));
            }
        };
        let Some(field) = field else {
            self.advance();
            return None;
        };

        let name = match &field.name {
            Some(name) => name.clone(),
            None => match target.describe_resolved(field.ty) {
                Ok(desc) => format!("[{}]", desc.display_name()),
                Err(_) => "[anonymous]".to_string(),
            },
        };
        self.state = ItemState::Fields {
            handle,
            next: next + 1,
        };
        let value = match handle.field(field) {
            Ok(member) => self.materialize(driver, Value::Object(member)),
            Err(e) => ChildValue::Error(EvalError::from(e).into()),
        };
        Some(Child::new(name, value))
    }
}
