//! Numeric primitives.
//!
//! Integers stay integers until a float joins the computation; from then on the
//! fold continues in floating point. Every operand is type-checked before any
//! arithmetic happens.

use crate::Error;
use crate::ast::{Number, NumberType, Value};
use crate::builtinops::Arity;
use crate::evaluator::Interpreter;
use crate::evaluator::intooperation::NumIter;

/// Combine two numbers, checked in the integer case
fn combine(
    a: Number,
    b: Number,
    int_op: fn(NumberType, NumberType) -> Option<NumberType>,
    float_op: fn(f64, f64) -> f64,
    what: &str,
) -> Result<Number, Error> {
    match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => int_op(x, y)
            .map(Number::Integer)
            .ok_or_else(|| Error::EvalError(format!("Integer overflow in {what}"))),
        _ => Ok(Number::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn builtin_add(args: NumIter<'_>) -> Result<Number, Error> {
    args.into_iter().try_fold(Number::Integer(0), |sum, n| {
        combine(sum, n, NumberType::checked_add, |x, y| x + y, "addition")
    })
}

fn builtin_sub(first: Number, rest: NumIter<'_>) -> Result<Number, Error> {
    let mut iter = rest.peekable();

    if iter.peek().is_none() {
        return match first {
            Number::Integer(n) => n
                .checked_neg()
                .map(Number::Integer)
                .ok_or_else(|| Error::EvalError("Integer overflow in negation".into())),
            Number::Float(x) => Ok(Number::Float(-x)),
        };
    }

    iter.try_fold(first, |acc, n| {
        combine(acc, n, NumberType::checked_sub, |x, y| x - y, "subtraction")
    })
}

fn builtin_mul(args: NumIter<'_>) -> Result<Number, Error> {
    args.into_iter().try_fold(Number::Integer(1), |product, n| {
        combine(product, n, NumberType::checked_mul, |x, y| x * y, "multiplication")
    })
}

/// Left-to-right division: truncating for integers, float once a float appears
fn builtin_div(first: Number, rest: NumIter<'_>) -> Result<Number, Error> {
    let mut acc = first;
    for divisor in rest {
        if divisor.is_zero() {
            return Err(Error::DivideByZero);
        }
        acc = combine(acc, divisor, NumberType::checked_div, |x, y| x / y, "division")?;
    }
    Ok(acc)
}

fn builtin_quotient(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0 {
        return Err(Error::DivideByZero);
    }
    a.checked_div(b)
        .ok_or_else(|| Error::EvalError("Integer overflow in quotient".into()))
}

/// Result takes the sign of the dividend
fn builtin_remainder(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0 {
        return Err(Error::DivideByZero);
    }
    Ok(a.checked_rem(b).unwrap_or(0))
}

/// Result takes the sign of the divisor
fn builtin_modulo(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    let r = builtin_remainder(a, b)?;
    if r != 0 && (r < 0) != (b < 0) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn builtin_abs(n: Number) -> Result<Number, Error> {
    match n {
        Number::Integer(i) => i
            .checked_abs()
            .map(Number::Integer)
            .ok_or_else(|| Error::EvalError("Integer overflow in abs".into())),
        Number::Float(x) => Ok(Number::Float(x.abs())),
    }
}

fn builtin_max(first: Number, rest: NumIter<'_>) -> Number {
    rest.fold(first, |best, n| if n.as_f64() > best.as_f64() { n } else { best })
}

fn builtin_min(first: Number, rest: NumIter<'_>) -> Number {
    rest.fold(first, |best, n| if n.as_f64() < best.as_f64() { n } else { best })
}

fn compare(a: Number, b: Number) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

macro_rules! numeric_comparison {
    ($name:ident, $($ordering:pat_param)|+) => {
        fn $name(first: Number, rest: NumIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !matches!(compare(prev, current), $(Some($ordering))|+) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_eq, std::cmp::Ordering::Equal);
numeric_comparison!(builtin_lt, std::cmp::Ordering::Less);
numeric_comparison!(builtin_gt, std::cmp::Ordering::Greater);
numeric_comparison!(builtin_le, std::cmp::Ordering::Less | std::cmp::Ordering::Equal);
numeric_comparison!(builtin_ge, std::cmp::Ordering::Greater | std::cmp::Ordering::Equal);

fn builtin_ne(a: Number, b: Number) -> bool {
    compare(a, b) != Some(std::cmp::Ordering::Equal)
}

fn builtin_is_number(v: Value) -> bool {
    v.is_number()
}

fn builtin_is_integer(v: Value) -> bool {
    v.is_integer()
}

fn builtin_is_float(v: Value) -> bool {
    v.is_float()
}

fn builtin_is_zero(n: Number) -> bool {
    n.is_zero()
}

fn builtin_is_even(n: NumberType) -> bool {
    n % 2 == 0
}

fn builtin_is_odd(n: NumberType) -> bool {
    n % 2 != 0
}

pub(super) fn register(interp: &mut Interpreter) {
    type Fold = (NumIter<'static>,);
    type HeadFold = (Number, NumIter<'static>);

    interp.register_variadic_builtin_operation::<_, Fold>("+", Arity::Any, builtin_add);
    interp.register_variadic_builtin_operation::<_, Fold>("*", Arity::Any, builtin_mul);
    interp.register_variadic_builtin_operation::<_, HeadFold>("-", Arity::AtLeast(1), builtin_sub);
    interp.register_variadic_builtin_operation::<_, HeadFold>("/", Arity::AtLeast(1), builtin_div);

    interp.register_builtin_operation::<_, (NumberType, NumberType)>("quotient", builtin_quotient);
    interp.register_builtin_operation::<_, (NumberType, NumberType)>("remainder", builtin_remainder);
    interp.register_builtin_operation::<_, (NumberType, NumberType)>("modulo", builtin_modulo);
    interp.register_builtin_operation::<_, (Number,)>("abs", builtin_abs);
    interp.register_variadic_builtin_operation::<_, HeadFold>("max", Arity::AtLeast(1), builtin_max);
    interp.register_variadic_builtin_operation::<_, HeadFold>("min", Arity::AtLeast(1), builtin_min);

    interp.register_variadic_builtin_operation::<_, HeadFold>("=", Arity::AtLeast(2), builtin_eq);
    interp.register_variadic_builtin_operation::<_, HeadFold>("<", Arity::AtLeast(2), builtin_lt);
    interp.register_variadic_builtin_operation::<_, HeadFold>(">", Arity::AtLeast(2), builtin_gt);
    interp.register_variadic_builtin_operation::<_, HeadFold>("<=", Arity::AtLeast(2), builtin_le);
    interp.register_variadic_builtin_operation::<_, HeadFold>(">=", Arity::AtLeast(2), builtin_ge);
    interp.register_builtin_operation::<_, (Number, Number)>("!=", builtin_ne);

    interp.register_builtin_operation::<_, (Value,)>("number?", builtin_is_number);
    interp.register_builtin_operation::<_, (Value,)>("integer?", builtin_is_integer);
    interp.register_builtin_operation::<_, (Value,)>("float?", builtin_is_float);
    interp.register_builtin_operation::<_, (Number,)>("zero?", builtin_is_zero);
    interp.register_builtin_operation::<_, (NumberType,)>("even?", builtin_is_even);
    interp.register_builtin_operation::<_, (NumberType,)>("odd?", builtin_is_odd);
}

#[cfg(all(test, feature = "scheme"))]
mod tests {
    use super::super::test_support::TestResult::*;
    use super::super::test_support::{eval_err, run_cases, success};

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_arithmetic_data_driven() {
        run_cases(vec![
            // === ADDITION / MULTIPLICATION ===
            ("(+)", success(0)),
            ("(+ 5)", success(5)),
            ("(+ 1 2 3 4)", success(10)),
            ("(+ 1 2.5)", success(3.5)),
            ("(*)", success(1)),
            ("(* 2 3 4)", success(24)),
            ("(* 2 0.5)", success(1.0)),
            ("(+ 9223372036854775807 1)", SpecificError("Integer overflow in addition")),
            ("(* 4611686018427387904 2)", SpecificError("Integer overflow in multiplication")),
            // === SUBTRACTION ===
            ("(- 5)", success(-5)),
            ("(- 2.5)", success(-2.5)),
            ("(- 10 1 2)", success(7)),
            ("(- 10 0.5)", success(9.5)),
            ("(-)", SpecificError("expected at least 1 arguments, got 0")),
            ("(- -9223372036854775808)", SpecificError("Integer overflow in negation")),
            // === DIVISION ===
            ("(/ 100 5 2)", success(10)),
            ("(/ 7 2)", success(3)),
            ("(/ -7 2)", success(-3)),
            ("(/ 7 2.0)", success(3.5)),
            ("(/ 1 0)", SpecificError("Division by zero")),
            ("(/ 1.5 0.0)", SpecificError("Division by zero")),
            ("(/ 10)", success(10)),
            ("(/ 2.5)", success(2.5)),
            ("(/ \"x\")", SpecificError("expected number")),
            ("(/)", SpecificError("/ expected at least 1 arguments, got 0")),
            ("(/ -9223372036854775808 -1)", SpecificError("Integer overflow in division")),
            ("(quotient 17 5)", success(3)),
            ("(quotient -17 5)", success(-3)),
            ("(quotient 1 0)", SpecificError("Division by zero")),
            ("(remainder 17 5)", success(2)),
            ("(remainder -17 5)", success(-2)),
            ("(modulo -17 5)", success(3)),
            ("(modulo 17 -5)", success(-3)),
            ("(modulo 15 5)", success(0)),
            ("(modulo 3 0)", SpecificError("Division by zero")),
            // === TYPE CHECKING ===
            ("(+ 1 \"2\")", SpecificError("expected number")),
            ("(+ 1 'a 2)", SpecificError("expected number")),
            ("(- \"x\")", Failure),
            ("(quotient 7.0 2)", Failure),
            // === ABS / MIN / MAX ===
            ("(abs -5)", success(5)),
            ("(abs 5)", success(5)),
            ("(abs -2.5)", success(2.5)),
            ("(max 1 5 3)", success(5)),
            ("(max 1 2.5)", success(2.5)),
            ("(min 4 -2 7)", success(-2)),
            ("(min 3)", success(3)),
            // === COMPARISONS ===
            ("(< 1 2 3)", success(true)),
            ("(< 1 3 2)", success(false)),
            ("(> 3 2 1)", success(true)),
            ("(<= 1 1 2)", success(true)),
            ("(>= 2 2 3)", success(false)),
            ("(= 2 2 2)", success(true)),
            ("(= 2 2.0)", success(true)),
            ("(= 1 2)", success(false)),
            ("(< 1.5 2)", success(true)),
            ("(!= 1 2)", success(true)),
            ("(!= 2 2)", success(false)),
            ("(< 1)", SpecificError("expected at least 2 arguments")),
            ("(< 1 \"2\")", SpecificError("expected number")),
            // === PREDICATES ===
            ("(number? 1)", success(true)),
            ("(number? 1.5)", success(true)),
            ("(number? \"1\")", success(false)),
            ("(integer? 1)", success(true)),
            ("(integer? 1.0)", success(false)),
            ("(float? 1.0)", success(true)),
            ("(zero? 0)", success(true)),
            ("(zero? 0.0)", success(true)),
            ("(zero? 3)", success(false)),
            ("(even? 4)", success(true)),
            ("(even? -3)", success(false)),
            ("(odd? -3)", success(true)),
        ]);
    }

    #[test]
    fn test_whole_call_fails_before_arithmetic() {
        assert!(matches!(
            eval_err("(+ 9223372036854775807 1 \"x\")"),
            crate::Error::TypeError(_)
        ));
        assert!(matches!(eval_err("(/ 5 0 \"x\")"), crate::Error::TypeError(_)));
        assert!(matches!(eval_err("(/ 5 0)"), crate::Error::DivideByZero));
    }
}
