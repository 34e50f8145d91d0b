//! Expression evaluator
//!
//! Evaluates expressions against a binding context and the introspection
//! boundary. Evaluation reads debuggee memory but never writes it, so the
//! same AST can be evaluated any number of times with different bindings.

use super::ast::{BinOp, Expr, Literal, ParsedExpr, UnaryOp};
use super::error::EvalError;
use super::value::Value;
use crate::introspect::{
    offset_address, FieldDescriptor, IntrospectError, Introspector, TypeCode, TypeId, ValueHandle,
    MAX_TYPE_CHAIN,
};

/// Nesting limit when searching base classes and anonymous members
const MAX_FIELD_DEPTH: usize = 16;

/// Special variables available to one evaluation
#[derive(Debug, Clone, Copy)]
pub struct BindingContext<'a> {
    /// The object being visualized (`this`)
    pub subject: ValueHandle,
    /// Loop variable `$i`
    pub index: Option<i128>,
    /// Wildcard template arguments, `$T1` first
    pub template_args: &'a [String],
}

impl<'a> BindingContext<'a> {
    pub fn new(subject: ValueHandle) -> Self {
        Self {
            subject,
            index: None,
            template_args: &[],
        }
    }

    pub fn with_template_args(mut self, template_args: &'a [String]) -> Self {
        self.template_args = template_args;
        self
    }

    pub fn with_index(mut self, index: i128) -> Self {
        self.index = Some(index);
        self
    }
}

/// Expression evaluator
pub struct Evaluator<'a> {
    target: &'a dyn Introspector,
    bindings: BindingContext<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(target: &'a dyn Introspector, bindings: BindingContext<'a>) -> Self {
        Self { target, bindings }
    }

    /// Evaluate a parsed expression; the format suffix is ignored
    pub fn eval_parsed(&self, parsed: &ParsedExpr) -> Result<Value, EvalError> {
        self.eval(&parsed.expr)
    }

    /// Evaluate to a truth value (conditions)
    pub fn eval_bool(&self, expr: &Expr) -> Result<bool, EvalError> {
        let value = self.load(self.eval(expr)?)?;
        value
            .truthy()
            .ok_or_else(|| EvalError::type_mismatch("scalar", value.type_name()))
    }

    /// Evaluate to an integer (sizes, indices)
    pub fn eval_int(&self, expr: &Expr) -> Result<i128, EvalError> {
        let value = self.load(self.eval(expr)?)?;
        value
            .to_i128()
            .ok_or_else(|| EvalError::type_mismatch("integer", value.type_name()))
    }

    /// Evaluate an expression
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Ident(name) => {
                let subject = Value::Object(self.bindings.subject);
                self.member(subject, name).map_err(|e| match e {
                    EvalError::FieldNotFound { .. } => EvalError::unknown_ident(name),
                    other => other,
                })
            }
            Expr::This => Ok(Value::Pointer {
                address: self.bindings.subject.address,
                pointee: self.bindings.subject.ty,
            }),
            Expr::Var(name) => self.eval_var(name),
            Expr::Member { base, field } => {
                let base = self.eval(base)?;
                self.member(base, field)
            }
            Expr::Arrow { base, field } => {
                let base = self.load(self.eval(base)?)?;
                match base {
                    Value::Pointer { .. } => self.member(base, field),
                    other => Err(EvalError::type_mismatch("pointer", other.type_name())),
                }
            }
            Expr::Index { base, index } => {
                let base = self.load(self.eval(base)?)?;
                let index = self.eval_int(index)?;
                match base {
                    Value::Pointer { address, pointee } => {
                        let address = self.offset_pointer(address, pointee, index)?;
                        self.settle(ValueHandle::new(address, pointee))
                    }
                    other => Err(EvalError::type_mismatch("pointer or array", other.type_name())),
                }
            }
            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right),
            Expr::Unary { op, expr } => self.eval_unary(*op, expr),
            Expr::Literal(lit) => Ok(literal_to_value(lit)),
            Expr::Paren(inner) => self.eval(inner),
        }
    }

    fn eval_var(&self, name: &str) -> Result<Value, EvalError> {
        let unbound = || EvalError::UnboundVariable {
            name: name.to_string(),
        };

        if name == "$i" {
            return self.bindings.index.map(Value::Int).ok_or_else(unbound);
        }

        let position = name
            .strip_prefix("$T")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(unbound)?;
        let arg = self
            .bindings
            .template_args
            .get(position - 1)
            .ok_or_else(unbound)?;

        Ok(match arg.parse::<i128>() {
            Ok(v) => Value::Int(v),
            Err(_) => Value::String(arg.clone()),
        })
    }

    /// Convert an lvalue to the value it holds. Compound objects stay put,
    /// arrays decay to pointers to their first element.
    pub fn load(&self, value: Value) -> Result<Value, EvalError> {
        let Value::Object(handle) = value else {
            return Ok(value);
        };

        let desc = self.target.describe_resolved(handle.ty)?;
        match desc.code {
            TypeCode::Int
            | TypeCode::UInt
            | TypeCode::Float
            | TypeCode::Bool
            | TypeCode::Char
            | TypeCode::Enum
            | TypeCode::Pointer => {
                let scalar = self.target.read_scalar(&handle)?;
                Ok(Value::from_scalar(scalar, desc.target))
            }
            TypeCode::Reference => {
                let mut current = handle;
                for _ in 0..MAX_TYPE_CHAIN {
                    match self.settle(current)? {
                        Value::Object(referent) if referent != current => {
                            let code = self.target.describe_resolved(referent.ty)?.code;
                            if code != TypeCode::Reference {
                                return self.load(Value::Object(referent));
                            }
                            current = referent;
                        }
                        other => return Ok(other),
                    }
                }
                Err(IntrospectError::TypeCycle(handle.ty.0).into())
            }
            TypeCode::Array => match desc.target {
                Some(element) => Ok(Value::Pointer {
                    address: handle.address,
                    pointee: element,
                }),
                None => Ok(Value::Object(handle)),
            },
            _ => Ok(Value::Object(handle)),
        }
    }

    /// Follow references so that `handle` names the referent
    fn settle(&self, handle: ValueHandle) -> Result<Value, EvalError> {
        let desc = self.target.describe_resolved(handle.ty)?;
        match (desc.code, desc.target) {
            (TypeCode::Reference, Some(target)) => {
                let Value::Pointer { address, .. } =
                    Value::from_scalar(self.target.read_scalar(&handle)?, Some(target))
                else {
                    return Err(EvalError::type_mismatch("reference", desc.display_name()));
                };
                if address == 0 {
                    return Err(EvalError::NullPointer);
                }
                Ok(Value::Object(ValueHandle::new(address, target)))
            }
            _ => Ok(Value::Object(handle)),
        }
    }

    /// Resolve `field` on an object, or on the pointee of a pointer
    pub fn member(&self, base: Value, field: &str) -> Result<Value, EvalError> {
        let handle = match self.load(base)? {
            Value::Object(handle) => handle,
            Value::Pointer { address, pointee } => {
                if address == 0 {
                    return Err(EvalError::NullPointer);
                }
                ValueHandle::new(address, pointee)
            }
            other => return Err(EvalError::type_mismatch("object", other.type_name())),
        };

        let mut found = self.find_field(handle.ty, field, 0)?;
        if found.is_none() {
            let dynamic = self.target.dynamic_type(&handle)?;
            if dynamic != handle.ty {
                found = self.find_field(dynamic, field, 0)?;
            }
        }

        let Some((bit_offset, descriptor)) = found else {
            let type_name = self
                .target
                .describe_resolved(handle.ty)?
                .display_name()
                .to_string();
            return Err(EvalError::FieldNotFound {
                field: field.to_string(),
                type_name,
            });
        };

        let member = handle.member(descriptor.ty, bit_offset, descriptor.bit_size)?;
        self.settle(member)
    }

    /// Direct fields first, then anonymous members and base classes in
    /// declaration order. Returns the accumulated bit offset.
    fn find_field(
        &self,
        ty: TypeId,
        name: &str,
        depth: usize,
    ) -> Result<Option<(u64, FieldDescriptor)>, EvalError> {
        if depth > MAX_FIELD_DEPTH {
            return Ok(None);
        }

        let desc = self.target.describe_resolved(ty)?;
        if let Some(field) = desc.fields.iter().find(|f| f.name.as_deref() == Some(name)) {
            return Ok(Some((field.bit_offset, field.clone())));
        }

        let nested = desc
            .fields
            .iter()
            .filter(|f| f.base_class || f.name.as_deref().map_or(true, str::is_empty));
        for field in nested {
            if let Some((offset, found)) = self.find_field(field.ty, name, depth + 1)? {
                return Ok(Some((offset_address(field.bit_offset, offset)?, found)));
            }
        }

        Ok(None)
    }

    /// Advance a pointer by `count` elements
    pub fn offset_pointer(&self, address: u64, pointee: TypeId, count: i128) -> Result<u64, EvalError> {
        let desc = self.target.describe_resolved(pointee)?;
        // void* arithmetic steps by bytes
        let size = match (desc.code, desc.size) {
            (TypeCode::Void, _) | (_, 0) => 1,
            (_, size) => size as i128,
        };

        count
            .checked_mul(size)
            .and_then(|delta| (address as i128).checked_add(delta))
            .and_then(|target| u64::try_from(target).ok())
            .ok_or_else(|| EvalError::overflow("pointer arithmetic"))
    }

    fn eval_unary(&self, op: UnaryOp, expr: &Expr) -> Result<Value, EvalError> {
        match op {
            UnaryOp::AddressOf => match self.eval(expr)? {
                Value::Object(handle) if handle.bits.is_none() => Ok(Value::Pointer {
                    address: handle.address,
                    pointee: handle.ty,
                }),
                Value::Object(_) => Err(EvalError::invalid_op("&", "bitfield", "")),
                other => Err(EvalError::type_mismatch("lvalue", other.type_name())),
            },
            UnaryOp::Deref => match self.load(self.eval(expr)?)? {
                Value::Pointer { address, pointee } => {
                    if address == 0 {
                        return Err(EvalError::NullPointer);
                    }
                    if self.target.describe_resolved(pointee)?.code == TypeCode::Void {
                        return Err(EvalError::type_mismatch("typed pointer", "void*"));
                    }
                    self.settle(ValueHandle::new(address, pointee))
                }
                other => Err(EvalError::type_mismatch("pointer", other.type_name())),
            },
            UnaryOp::Neg => match self.load(self.eval(expr)?)? {
                Value::Float(v) => Ok(Value::Float(-v)),
                other => match other.to_i128() {
                    Some(v) => v
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| EvalError::overflow("-")),
                    None => Err(EvalError::invalid_op("-", other.type_name(), "")),
                },
            },
            UnaryOp::Not => {
                let value = self.load(self.eval(expr)?)?;
                match value.truthy() {
                    Some(v) => Ok(Value::Bool(!v)),
                    None => Err(EvalError::invalid_op("!", value.type_name(), "")),
                }
            }
            UnaryOp::BitNot => {
                let value = self.load(self.eval(expr)?)?;
                match value.to_i128() {
                    Some(v) => Ok(Value::Int(!v)),
                    None => Err(EvalError::invalid_op("~", value.type_name(), "")),
                }
            }
        }
    }

    fn eval_binary(&self, left: &Expr, op: BinOp, right: &Expr) -> Result<Value, EvalError> {
        // Short-circuit like C
        match op {
            BinOp::And => {
                return Ok(Value::Bool(self.eval_bool(left)? && self.eval_bool(right)?));
            }
            BinOp::Or => {
                return Ok(Value::Bool(self.eval_bool(left)? || self.eval_bool(right)?));
            }
            _ => {}
        }

        let l = self.load(self.eval(left)?)?;
        let r = self.load(self.eval(right)?)?;
        self.apply_binop(&l, op, &r)
    }

    /// Apply binary operator to loaded values
    fn apply_binop(&self, left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
        if let Some(result) = self.apply_pointer_arithmetic(left, op, right)? {
            return Ok(result);
        }

        match op {
            // Arithmetic operations
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                apply_arithmetic(left, op, right)
            }
            // Comparison operations
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                apply_comparison(left, op, right)
            }
            // Logical operations
            BinOp::And | BinOp::Or => apply_logical(left, op, right),
            // Bitwise operations
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                apply_bitwise(left, op, right)
            }
        }
    }

    fn apply_pointer_arithmetic(
        &self,
        left: &Value,
        op: BinOp,
        right: &Value,
    ) -> Result<Option<Value>, EvalError> {
        let result = match (left, op, right) {
            (Value::Pointer { address, pointee }, BinOp::Add, n)
            | (n, BinOp::Add, Value::Pointer { address, pointee })
                if n.to_i128().is_some() =>
            {
                let count = n.to_i128().unwrap_or_default();
                Value::Pointer {
                    address: self.offset_pointer(*address, *pointee, count)?,
                    pointee: *pointee,
                }
            }
            (Value::Pointer { address, pointee }, BinOp::Sub, n) if n.to_i128().is_some() => {
                let count = n
                    .to_i128()
                    .and_then(i128::checked_neg)
                    .ok_or_else(|| EvalError::overflow("-"))?;
                Value::Pointer {
                    address: self.offset_pointer(*address, *pointee, count)?,
                    pointee: *pointee,
                }
            }
            (
                Value::Pointer { address: a, pointee },
                BinOp::Sub,
                Value::Pointer { address: b, .. },
            ) => {
                let size = self.offset_pointer(0, *pointee, 1)? as i128;
                Value::Int((*a as i128 - *b as i128) / size)
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}

/// Convert literal to Value
fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::Bool(v) => Value::Bool(*v),
        Literal::Char(v) => Value::Char(*v),
        Literal::String(v) => Value::String(v.clone()),
    }
}

fn invalid(op: BinOp, left: &Value, right: &Value) -> EvalError {
    EvalError::invalid_op(op.as_str(), left.type_name(), right.type_name())
}

fn is_float(left: &Value, right: &Value) -> bool {
    matches!(left, Value::Float(_)) || matches!(right, Value::Float(_))
}

fn apply_arithmetic(left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
    // Integer arithmetic
    if !is_float(left, right) {
        if let (Some(l), Some(r)) = (left.to_i128(), right.to_i128()) {
            let result = match op {
                BinOp::Add => l.checked_add(r),
                BinOp::Sub => l.checked_sub(r),
                BinOp::Mul => l.checked_mul(r),
                BinOp::Div | BinOp::Rem if r == 0 => return Err(EvalError::DivisionByZero),
                BinOp::Div => l.checked_div(r),
                BinOp::Rem => l.checked_rem(r),
                _ => return Err(invalid(op, left, right)),
            };
            return result
                .map(Value::Int)
                .ok_or_else(|| EvalError::overflow(op.as_str()));
        }
    }

    // Float arithmetic
    if let (Some(l), Some(r)) = (left.to_f64(), right.to_f64()) {
        let result = match op {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div => l / r,
            BinOp::Rem => l % r,
            _ => return Err(invalid(op, left, right)),
        };
        return Ok(Value::Float(result));
    }

    Err(invalid(op, left, right))
}

fn apply_comparison(left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
    // Pointers compare by address, also against integer constants (`p != 0`)
    let as_address = |v: &Value| match v {
        Value::Pointer { address, .. } => Value::Int(*address as i128),
        other => other.clone(),
    };
    let (left, right) = (as_address(left), as_address(right));

    if let (Value::String(l), Value::String(r)) = (&left, &right) {
        return match op {
            BinOp::Eq => Ok(Value::Bool(l == r)),
            BinOp::Ne => Ok(Value::Bool(l != r)),
            _ => Err(invalid(op, &left, &right)),
        };
    }

    let ordering = if !is_float(&left, &right) {
        match (left.to_i128(), right.to_i128()) {
            (Some(l), Some(r)) => Some(l.cmp(&r)),
            _ => None,
        }
    } else {
        match (left.to_f64(), right.to_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        }
    };

    let Some(ordering) = ordering else {
        // NaN compares unequal to everything
        if is_float(&left, &right) && left.to_f64().is_some() && right.to_f64().is_some() {
            return Ok(Value::Bool(op == BinOp::Ne));
        }
        return Err(invalid(op, &left, &right));
    };

    let result = match op {
        BinOp::Eq => ordering.is_eq(),
        BinOp::Ne => ordering.is_ne(),
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => return Err(invalid(op, &left, &right)),
    };
    Ok(Value::Bool(result))
}

fn apply_logical(left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
    let (Some(l), Some(r)) = (left.truthy(), right.truthy()) else {
        return Err(invalid(op, left, right));
    };

    Ok(Value::Bool(match op {
        BinOp::And => l && r,
        _ => l || r,
    }))
}

fn apply_bitwise(left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
    let (Some(l), Some(r)) = (left.to_i128(), right.to_i128()) else {
        return Err(invalid(op, left, right));
    };

    let shift = || {
        u32::try_from(r)
            .ok()
            .filter(|s| *s < 128)
            .ok_or_else(|| EvalError::overflow(op.as_str()))
    };

    let result = match op {
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
        BinOp::Shl => l << shift()?,
        BinOp::Shr => l >> shift()?,
        _ => return Err(invalid(op, left, right)),
    };
    Ok(Value::Int(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse_expr;
    use crate::introspect::fixtures::{self, Fixture};
    use crate::introspect::TypeDescriptor;

    fn eval_with(fixture: &Fixture, subject: ValueHandle, input: &str) -> Result<Value, EvalError> {
        let expr = parse_expr(input).unwrap();
        let eval = Evaluator::new(&fixture.snapshot, BindingContext::new(subject));
        eval.eval(&expr.expr).and_then(|v| eval.load(v))
    }

    #[test]
    fn test_literal_eval() {
        let fixture = fixtures::build();
        let point = fixture.point();
        assert_eq!(eval_with(&fixture, point, "42").unwrap(), Value::Int(42));
        assert_eq!(eval_with(&fixture, point, "true").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_arithmetic() {
        let fixture = fixtures::build();
        let point = fixture.point();
        assert_eq!(eval_with(&fixture, point, "10 + 5").unwrap(), Value::Int(15));
        assert_eq!(eval_with(&fixture, point, "10 - 5 * 2").unwrap(), Value::Int(0));
        assert_eq!(eval_with(&fixture, point, "7 % 4").unwrap(), Value::Int(3));
        assert_eq!(eval_with(&fixture, point, "1.5 * 2").unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_field_arithmetic() {
        let fixture = fixtures::build();
        let point = fixture.point();
        assert_eq!(eval_with(&fixture, point, "x + 1").unwrap(), Value::Int(6));
        assert_eq!(eval_with(&fixture, point, "this->y").unwrap(), Value::Int(-2));
        assert_eq!(eval_with(&fixture, point, "(*this).x * y").unwrap(), Value::Int(-10));
    }

    #[test]
    fn test_comparison() {
        let fixture = fixtures::build();
        let point = fixture.point();
        assert_eq!(eval_with(&fixture, point, "10 > 5").unwrap(), Value::Bool(true));
        assert_eq!(eval_with(&fixture, point, "x == 5 && y < 0").unwrap(), Value::Bool(true));
        assert_eq!(eval_with(&fixture, point, "x != 5 || y > 0").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_unknown_identifier() {
        let fixture = fixtures::build();
        let result = eval_with(&fixture, fixture.point(), "z + 1");
        assert!(matches!(result, Err(EvalError::UnknownIdentifier { ref name }) if name == "z"));
    }

    #[test]
    fn test_pointer_subscript_and_difference() {
        let fixture = fixtures::build();
        let vector = fixture.vector();
        assert_eq!(eval_with(&fixture, vector, "_first[2]").unwrap(), Value::Int(30));
        assert_eq!(eval_with(&fixture, vector, "*(_first + 1)").unwrap(), Value::Int(20));
        assert_eq!(eval_with(&fixture, vector, "_last - _first").unwrap(), Value::Int(3));
        assert_eq!(eval_with(&fixture, vector, "_first != 0").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_loop_variable() {
        let fixture = fixtures::build();
        let expr = parse_expr("_first[$i]").unwrap();
        let bindings = BindingContext::new(fixture.vector()).with_index(1);
        let eval = Evaluator::new(&fixture.snapshot, bindings);
        let value = eval.load(eval.eval_parsed(&expr).unwrap()).unwrap();
        assert_eq!(value, Value::Int(20));
    }

    #[test]
    fn test_unbound_loop_variable() {
        let fixture = fixtures::build();
        let result = eval_with(&fixture, fixture.vector(), "$i");
        assert!(matches!(result, Err(EvalError::UnboundVariable { .. })));
    }

    #[test]
    fn test_template_argument_variable() {
        let fixture = fixtures::build();
        let args = vec!["int".to_string(), "16".to_string()];
        let bindings = BindingContext::new(fixture.point()).with_template_args(&args);
        let eval = Evaluator::new(&fixture.snapshot, bindings);

        let expr = parse_expr("$T2 * 2").unwrap();
        assert_eq!(eval.eval_parsed(&expr).unwrap(), Value::Int(32));

        let expr = parse_expr("$T1").unwrap();
        assert_eq!(
            eval.eval_parsed(&expr).unwrap(),
            Value::String("int".to_string())
        );
    }

    #[test]
    fn test_base_class_and_anonymous_members() {
        let fixture = fixtures::build();
        let derived = fixture.derived();
        assert_eq!(eval_with(&fixture, derived, "id").unwrap(), Value::Int(7));
        assert_eq!(eval_with(&fixture, derived, "raw").unwrap(), Value::Int(9));
        assert_eq!(eval_with(&fixture, derived, "value").unwrap(), Value::Int(11));
    }

    #[test]
    fn test_bitfield_member() {
        let fixture = fixtures::build();
        let derived = fixture.derived();
        assert_eq!(eval_with(&fixture, derived, "flags").unwrap(), Value::Int(5));
        assert!(matches!(
            eval_with(&fixture, derived, "&flags"),
            Err(EvalError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_arrow_chain_through_pointers() {
        let fixture = fixtures::build();
        let node = fixture.node();
        assert_eq!(eval_with(&fixture, node, "next->value").unwrap(), Value::Int(2));
        assert_eq!(
            eval_with(&fixture, node, "next->next->value").unwrap(),
            Value::Int(1)
        );
        // `.` on a pointer dereferences it
        assert_eq!(eval_with(&fixture, node, "next.value").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_arrow_on_non_pointer() {
        let fixture = fixtures::build();
        let result = eval_with(&fixture, fixture.point(), "x->y");
        assert!(matches!(result, Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn test_unreadable_memory_propagates() {
        let fixture = fixtures::build();
        let result = eval_with(&fixture, fixture.vector(), "_first[100000]");
        assert!(matches!(result, Err(EvalError::Introspect(_))));
    }

    #[test]
    fn test_member_past_address_space_end() {
        let mut fixture = fixtures::build();
        fixture.snapshot.write_u64(fixtures::NODE + 8, u64::MAX);
        let node = fixture.node();
        assert!(matches!(
            eval_with(&fixture, node, "next->value"),
            Err(EvalError::Introspect(IntrospectError::UnreadableMemory { .. }))
        ));
        assert!(matches!(
            eval_with(&fixture, node, "next->next"),
            Err(EvalError::Introspect(IntrospectError::AddressOverflow { .. }))
        ));
    }

    #[test]
    fn test_dangling_member_type() {
        let mut fixture = fixtures::build();
        let broken = fixture.snapshot.add_type(TypeDescriptor::structure(
            "Broken",
            4,
            vec![FieldDescriptor::new("gone", TypeId(999), 0)],
        ));
        fixture.snapshot.write_i32(0x9000, 1);
        let result = eval_with(&fixture, ValueHandle::new(0x9000, broken), "gone");
        assert!(matches!(
            result,
            Err(EvalError::Introspect(IntrospectError::UnknownType(999)))
        ));
    }

    #[test]
    fn test_reference_cycle() {
        let mut fixture = fixtures::build();
        let next = TypeId(fixture.snapshot.types.len() as u32 + 1);
        let first = fixture.snapshot.add_type(TypeDescriptor::reference(next));
        fixture.snapshot.add_type(TypeDescriptor::reference(first));
        let holder = fixture.snapshot.add_type(TypeDescriptor::structure(
            "Holder",
            8,
            vec![FieldDescriptor::new("r", first, 0)],
        ));
        fixture.snapshot.write_u64(0x9000, 0x9100);
        fixture.snapshot.write_u64(0x9100, 0x9000);

        let result = eval_with(&fixture, ValueHandle::new(0x9000, holder), "r");
        assert!(matches!(
            result,
            Err(EvalError::Introspect(IntrospectError::TypeCycle(_)))
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let fixture = fixtures::build();
        let result = eval_with(&fixture, fixture.point(), "10 / 0");
        assert!(matches!(result, Err(EvalError::DivisionByZero)));
    }

    #[test]
    fn test_address_of_member() {
        let fixture = fixtures::build();
        let point = fixture.point();
        let value = eval_with(&fixture, point, "&y").unwrap();
        assert!(matches!(value, Value::Pointer { address, .. } if address == point.address + 4));
    }

    #[test]
    fn test_condition_truthiness() {
        let fixture = fixtures::build();
        let expr = parse_expr("_size").unwrap();
        let eval = Evaluator::new(&fixture.snapshot, BindingContext::new(fixture.vector()));
        assert!(eval.eval_bool(&expr.expr).unwrap());

        let expr = parse_expr("_size - 3").unwrap();
        assert!(!eval.eval_bool(&expr.expr).unwrap());
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let fixture = fixtures::build();
        let expr = parse_expr("_first[1] + _size").unwrap();
        let eval = Evaluator::new(&fixture.snapshot, BindingContext::new(fixture.vector()));
        let first = eval.eval_int(&expr.expr).unwrap();
        let second = eval.eval_int(&expr.expr).unwrap();
        assert_eq!(first, 23);
        assert_eq!(first, second);
    }
}
