//! Binary field descriptions for device protocol records.
//!
//! `(def-field name type modifier...)` builds a [`DeviceField`] wrapped in a
//! host object. Supported types are `uint8`, `uint16` and `uint32`. Modifiers:
//!
//! - `(repeat n)`: the field occurs `n` times in the record
//! - `(range lo hi)`: valid values lie in `lo..=hi`
//! - `(values a b ...)` or `(values list)`: valid values are listed explicitly
//! - `(deferred-validation modifier)`: `modifier` is evaluated at validation
//!   time instead of definition time, so it may refer to bindings that do not
//!   exist yet
//!
//! Modifier arguments are evaluated in the defining frame.

use tracing::debug;

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::builtinops::Arity;
use crate::evaluator::{Environment, Interpreter};

/// Tag of the host objects produced by `def-field`
pub const DEVICE_FIELD_TAG: &str = "device-field";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Uint8,
    Uint16,
    Uint32,
}

impl FieldType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "uint8" => Some(FieldType::Uint8),
            "uint16" => Some(FieldType::Uint16),
            "uint32" => Some(FieldType::Uint32),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Uint8 => "uint8",
            FieldType::Uint16 => "uint16",
            FieldType::Uint32 => "uint32",
        }
    }

    /// Width in bytes
    pub fn size(self) -> usize {
        match self {
            FieldType::Uint8 => 1,
            FieldType::Uint16 => 2,
            FieldType::Uint32 => 4,
        }
    }

    fn holds(self, value: NumberType) -> bool {
        match self {
            FieldType::Uint8 => u8::try_from(value).is_ok(),
            FieldType::Uint16 => u16::try_from(value).is_ok(),
            FieldType::Uint32 => u32::try_from(value).is_ok(),
        }
    }
}

/// A restriction on the values a field may hold
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Range { low: NumberType, high: NumberType },
    Values(Vec<NumberType>),
}

impl Constraint {
    pub fn accepts(&self, value: NumberType) -> bool {
        match self {
            Constraint::Range { low, high } => (*low..=*high).contains(&value),
            Constraint::Values(allowed) => allowed.contains(&value),
        }
    }
}

enum Modifier {
    Repeat(usize),
    Constraint(Constraint),
    Deferred(Value),
}

/// One field of a device record
#[derive(Debug)]
pub struct DeviceField {
    name: String,
    field_type: FieldType,
    repeat_count: usize,
    constraints: Vec<Constraint>,
    /// Unevaluated modifiers, resolved on every validation
    deferred: Vec<Value>,
}

impl DeviceField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn repeat_count(&self) -> usize {
        self.repeat_count
    }

    /// Bytes occupied by every repetition of the field
    pub fn size(&self) -> usize {
        self.field_type.size().saturating_mul(self.repeat_count)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Whether `value` fits the field's type and satisfies every constraint.
    ///
    /// Deferred modifiers are evaluated in `env` now; a failure there is an error,
    /// not a rejection.
    pub fn validate(
        &self,
        value: NumberType,
        interp: &mut Interpreter,
        env: &Environment,
    ) -> Result<bool, Error> {
        if !self.field_type.holds(value) {
            return Ok(false);
        }
        if !self.constraints.iter().all(|c| c.accepts(value)) {
            return Ok(false);
        }

        for form in &self.deferred {
            match parse_modifier(interp, form, env)? {
                Modifier::Constraint(constraint) => {
                    if !constraint.accepts(value) {
                        return Ok(false);
                    }
                }
                Modifier::Repeat(_) | Modifier::Deferred(_) => {
                    return Err(Error::EvalError(format!(
                        "deferred-validation needs a range or values modifier, but got {form}"
                    )));
                }
            }
        }
        Ok(true)
    }
}

fn expect_count(modifier: &str, args: &[Value], arity: Arity) -> Result<(), Error> {
    if arity.accepts(args.len()) {
        Ok(())
    } else {
        Err(Error::arity_error_with_expr(arity, args.len(), modifier))
    }
}

fn eval_integer(
    interp: &mut Interpreter,
    expr: &Value,
    env: &Environment,
) -> Result<NumberType, Error> {
    NumberType::try_from(interp.eval(expr, env)?)
}

fn parse_modifier(
    interp: &mut Interpreter,
    form: &Value,
    env: &Environment,
) -> Result<Modifier, Error> {
    let parts = match form {
        Value::Pair(_) => form.list_to_vec()?,
        _ => {
            return Err(Error::TypeError(format!(
                "def-field modifiers are lists, but got {form}"
            )));
        }
    };
    let Value::Symbol(head) = &parts[0] else {
        return Err(Error::TypeError(format!(
            "def-field modifier needs a name, but got {}",
            parts[0]
        )));
    };
    let args = &parts[1..];

    match head.as_str() {
        "repeat" => {
            expect_count("repeat", args, Arity::Exact(1))?;
            let count = eval_integer(interp, &args[0], env)?;
            match usize::try_from(count) {
                Ok(n) if n >= 1 => Ok(Modifier::Repeat(n)),
                _ => Err(Error::DomainError(format!(
                    "repeat needs a positive count, but got {count}"
                ))),
            }
        }
        "range" => {
            expect_count("range", args, Arity::Exact(2))?;
            let low = eval_integer(interp, &args[0], env)?;
            let high = eval_integer(interp, &args[1], env)?;
            if low > high {
                return Err(Error::DomainError(format!(
                    "range needs low <= high, but got {low} and {high}"
                )));
            }
            Ok(Modifier::Constraint(Constraint::Range { low, high }))
        }
        "values" => {
            expect_count("values", args, Arity::AtLeast(1))?;
            let mut evaluated = args
                .iter()
                .map(|arg| interp.eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            // A single list argument supplies the allowed values itself
            if evaluated.len() == 1 && evaluated[0].is_pair() {
                evaluated = evaluated[0].list_to_vec()?;
            }
            let allowed = evaluated
                .into_iter()
                .map(NumberType::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Modifier::Constraint(Constraint::Values(allowed)))
        }
        "deferred-validation" => {
            expect_count("deferred-validation", args, Arity::Exact(1))?;
            Ok(Modifier::Deferred(args[0].clone()))
        }
        other => Err(Error::EvalError(format!("Unknown def-field modifier: {other}"))),
    }
}

/// `(def-field name type modifier...)`
fn eval_def_field(
    interp: &mut Interpreter,
    operands: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let Value::Symbol(name) = &operands[0] else {
        return Err(Error::TypeError(format!(
            "def-field needs a field name, but got {}",
            operands[0]
        )));
    };
    let field_type = match &operands[1] {
        Value::Symbol(type_name) => FieldType::from_name(type_name.as_str()).ok_or_else(|| {
            Error::DomainError(format!("Unknown field type: {type_name}"))
        })?,
        other => {
            return Err(Error::TypeError(format!(
                "def-field needs a type name, but got {other}"
            )));
        }
    };

    let mut field = DeviceField {
        name: name.to_string(),
        field_type,
        repeat_count: 1,
        constraints: Vec::new(),
        deferred: Vec::new(),
    };

    for form in &operands[2..] {
        match parse_modifier(interp, form, env)? {
            Modifier::Repeat(n) => field.repeat_count = n,
            Modifier::Constraint(constraint) => field.constraints.push(constraint),
            Modifier::Deferred(inner) => field.deferred.push(inner),
        }
    }

    // The total size must be reportable as a script integer
    let fits = field_type
        .size()
        .checked_mul(field.repeat_count)
        .is_some_and(|size| NumberType::try_from(size).is_ok());
    if !fits {
        return Err(Error::DomainError(format!(
            "def-field {name}: {} repeats of {} is too large",
            field.repeat_count,
            field_type.name()
        )));
    }

    debug!(field = %field.name, field_type = field_type.name(), size = field.size(), "defined device field");
    Ok(Value::object(DEVICE_FIELD_TAG, field))
}

fn field_arg<'a>(name: &str, value: &'a Value) -> Result<&'a DeviceField, Error> {
    match value {
        Value::Object(obj) if obj.tag() == DEVICE_FIELD_TAG => obj
            .downcast_ref::<DeviceField>()
            .ok_or_else(|| Error::TypeError(format!("{name}: malformed device field"))),
        other => Err(Error::TypeError(format!(
            "{name} needs a device field, but got {other}"
        ))),
    }
}

/// `(validate-field field value)`
fn builtin_validate_field(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    let field = field_arg("validate-field", &args[0])?;
    let value = NumberType::try_from(args[1].clone())?;
    field.validate(value, interp, env).map(Value::Bool)
}

fn builtin_field_size(
    _interp: &mut Interpreter,
    args: Vec<Value>,
    _env: &Environment,
) -> Result<Value, Error> {
    let size = field_arg("field-size", &args[0])?.size();
    NumberType::try_from(size)
        .map(Value::Integer)
        .map_err(|_| Error::DomainError("field size overflow".into()))
}

pub(super) fn register(interp: &mut Interpreter) {
    interp.register_special_form("def-field", Arity::AtLeast(2), eval_def_field);
    interp.register("validate-field", Arity::Exact(2), builtin_validate_field);
    interp.register("field-size", Arity::Exact(1), builtin_field_size);
}

#[cfg(all(test, feature = "scheme"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    /// Evaluate a `def-field` form and validate each candidate value
    fn verdicts(interp: &mut Interpreter, source: &str, candidates: &[NumberType]) -> Vec<bool> {
        let value = interp.eval_str(source).unwrap();
        let global = interp.global().clone();
        let obj = value.object_value().clone();
        let field = obj.downcast_ref::<DeviceField>().unwrap();
        candidates
            .iter()
            .map(|&v| field.validate(v, interp, &global).unwrap())
            .collect()
    }

    #[test]
    fn test_basic_field() {
        let mut interp = Interpreter::new();
        let value = interp.eval_str("(def-field test uint8)").unwrap();
        let obj = value.object_value();
        assert_eq!(obj.tag(), DEVICE_FIELD_TAG);
        let field = obj.downcast_ref::<DeviceField>().unwrap();
        assert_eq!(field.name(), "test");
        assert_eq!(field.field_type(), FieldType::Uint8);
        assert_eq!(field.repeat_count(), 1);
        assert_eq!(field.size(), 1);
    }

    #[test]
    fn test_field_with_repeat() {
        let mut interp = Interpreter::new();
        let value = interp.eval_str("(def-field test uint16 (repeat 3))").unwrap();
        let field = value.object_value().clone();
        let field = field.downcast_ref::<DeviceField>().unwrap();
        assert_eq!(field.repeat_count(), 3);
        assert_eq!(field.size(), 6);
    }

    #[test]
    fn test_field_with_range() {
        let mut interp = Interpreter::new();
        assert_eq!(
            verdicts(&mut interp, "(def-field test uint8 (range 3 5))", &[2, 3, 4, 5, 6, 42]),
            [false, true, true, true, false, false]
        );
    }

    #[test]
    fn test_field_with_values() {
        let mut interp = Interpreter::new();
        let candidates = [2, 3, 4, 5, 6, 7, 8, 9, 10, 42];
        let expected = [false, true, false, true, false, true, false, true, false, false];
        assert_eq!(
            verdicts(&mut interp, "(def-field test uint8 (values 3 5 7 9))", &candidates),
            expected
        );
        assert_eq!(
            verdicts(&mut interp, "(def-field test uint8 (values '(3 5 7 9)))", &candidates),
            expected
        );
    }

    #[test]
    fn test_modifier_arguments_are_evaluated() {
        let mut interp = Interpreter::new();
        interp.eval_str("(define lo 10) (define allowed (list 1 2))").unwrap();
        assert_eq!(
            verdicts(&mut interp, "(def-field a uint8 (range lo (+ lo 5)))", &[9, 10, 15, 16]),
            [false, true, true, false]
        );
        assert_eq!(
            verdicts(&mut interp, "(def-field b uint8 (values allowed))", &[1, 2, 3]),
            [true, true, false]
        );
    }

    #[test]
    fn test_field_with_deferred_values() {
        let mut interp = Interpreter::new();
        assert_eq!(
            verdicts(
                &mut interp,
                "(def-field test uint8 (deferred-validation (values 3)))",
                &[2, 3, 4]
            ),
            [false, true, false]
        );
    }

    #[test]
    fn test_deferred_validation_sees_later_bindings() {
        let mut interp = Interpreter::new();
        interp
            .eval_str("(define f (def-field test uint8 (deferred-validation (range 0 limit))))")
            .unwrap();

        // Not yet bound: validation fails rather than rejecting
        let err = interp.eval_str("(validate-field f 1)").unwrap_err();
        assert!(matches!(err, Error::UnboundSymbol(name) if name == "limit"));

        interp.eval_str("(define limit 4)").unwrap();
        assert_eq!(interp.eval_str("(validate-field f 4)").unwrap(), Value::Bool(true));
        assert_eq!(interp.eval_str("(validate-field f 5)").unwrap(), Value::Bool(false));

        interp.eval_str("(set! limit 10)").unwrap();
        assert_eq!(interp.eval_str("(validate-field f 5)").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_type_width_bounds_validation() {
        let mut interp = Interpreter::new();
        assert_eq!(
            verdicts(&mut interp, "(def-field w uint16)", &[-1, 0, 65535, 65536]),
            [false, true, true, false]
        );
        assert_eq!(
            verdicts(&mut interp, "(def-field d uint32)", &[4_294_967_295, 4_294_967_296]),
            [true, false]
        );
    }

    #[test]
    fn test_def_field_errors() {
        let mut interp = Interpreter::new();
        let cases = [
            ("(def-field test uint64)", "Unknown field type: uint64"),
            ("(def-field \"test\" uint8)", "needs a field name"),
            ("(def-field test)", "def-field expected at least 2 arguments"),
            ("(def-field test uint8 (bogus 1))", "Unknown def-field modifier: bogus"),
            ("(def-field test uint8 repeat)", "modifiers are lists"),
            ("(def-field test uint8 (repeat 0))", "positive count"),
            (
                "(def-field test uint32 (repeat 4611686018427387904))",
                "4611686018427387904 repeats of uint32 is too large",
            ),
            (
                "(field-size (def-field test uint16 (repeat 9223372036854775807)))",
                "is too large",
            ),
            ("(def-field test uint8 (range 5 3))", "low <= high"),
            ("(def-field test uint8 (range 1))", "range expected 2 arguments, got 1"),
            ("(def-field test uint8 (values 1 'a))", "expected integer"),
            ("(validate-field 5 1)", "validate-field needs a device field"),
        ];
        for (source, expected) in cases {
            let msg = interp.eval_str(source).unwrap_err().to_string();
            assert!(msg.contains(expected), "{source}: {msg}");
        }
    }

    #[test]
    fn test_field_size_primitive() {
        let mut interp = Interpreter::new();
        let size = interp
            .eval_str("(field-size (def-field test uint32 (repeat 2)))")
            .unwrap();
        assert_eq!(size, Value::Integer(8));
    }
}
