//! Pair, list and generic sequence primitives.
//!
//! The sequence operations (`map`, `filter`, `sort`, ...) accept lists and
//! vectors alike and answer with the kind they were given.

use std::rc::Rc;

use super::{
    Seq, element_index, expect_function, find_item, map_columns, merge_sort, reduce_items, select,
};
use crate::Error;
use crate::ast::{NumberType, Value};
use crate::builtinops::Arity;
use crate::evaluator::intooperation::ValueIter;
use crate::evaluator::{Environment, Interpreter};

fn builtin_car(value: Value) -> Result<Value, Error> {
    match value {
        Value::Pair(pair) => Ok(pair.head()),
        Value::Nil => Ok(Value::Nil),
        other => Err(Error::TypeError(format!("car needs a pair, but got {other}"))),
    }
}

fn builtin_cdr(value: Value) -> Result<Value, Error> {
    match value {
        Value::Pair(pair) => Ok(pair.tail()),
        Value::Nil => Ok(Value::Nil),
        other => Err(Error::TypeError(format!("cdr needs a pair, but got {other}"))),
    }
}

fn builtin_cons(head: Value, tail: Value) -> Value {
    Value::cons(head, tail)
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::list(args.cloned().collect())
}

fn builtin_set_car(pair: Value, value: Value) -> Result<Value, Error> {
    match pair {
        Value::Pair(pair) => {
            pair.set_head(value.clone());
            Ok(value)
        }
        other => Err(Error::TypeError(format!("set-car! needs a pair, but got {other}"))),
    }
}

fn builtin_set_cdr(pair: Value, value: Value) -> Result<Value, Error> {
    match pair {
        Value::Pair(pair) => {
            pair.set_tail(value.clone());
            Ok(value)
        }
        other => Err(Error::TypeError(format!("set-cdr! needs a pair, but got {other}"))),
    }
}

fn builtin_length(value: Value) -> Result<NumberType, Error> {
    let len = Seq::from_value("length", &value)?.items().len();
    NumberType::try_from(len).map_err(|_| Error::DomainError("length does not fit an integer".into()))
}

/// Copies every argument but the last, which becomes the shared tail
fn builtin_append(args: ValueIter<'_>) -> Result<Value, Error> {
    let mut lists: Vec<&Value> = args.collect();
    let Some(tail) = lists.pop() else {
        return Ok(Value::Nil);
    };

    let mut items = Vec::new();
    for list in lists {
        if !list.is_list() {
            return Err(Error::TypeError(format!("append needs lists, but got {list}")));
        }
        items.extend(list.list_to_vec()?);
    }
    Ok(Value::list_with_tail(items, tail.clone()))
}

fn builtin_reverse(list: Value) -> Result<Value, Error> {
    let mut items = list.list_to_vec()?;
    items.reverse();
    Ok(Value::list(items))
}

fn builtin_nth(seq: Value, index: NumberType) -> Result<Value, Error> {
    let seq = Seq::from_value("nth", &seq)?;
    let i = element_index("nth", index, seq.items().len())?;
    Ok(seq.items()[i].clone())
}

macro_rules! positional_accessor {
    ($name:ident, $label:literal, $index:literal, $count:literal) => {
        fn $name(seq: Value) -> Result<Value, Error> {
            builtin_nth(seq, $index).map_err(|err| match err {
                Error::IndexError(_) => Error::IndexError(
                    concat!($label, " needs at least ", $count, " elements").to_owned(),
                ),
                other => other,
            })
        }
    };
}

positional_accessor!(builtin_first, "first", 0, 1);
positional_accessor!(builtin_second, "second", 1, 2);
positional_accessor!(builtin_third, "third", 2, 3);

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

/// Same object for pairs, vectors, functions and host objects; same value otherwise
fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Pair(x), Value::Pair(y)) => Rc::ptr_eq(x, y),
        (Value::Vector(x), Value::Vector(y)) => Rc::ptr_eq(x, y),
        (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
        (Value::Primitive(x), Value::Primitive(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Pair(_) | Value::Vector(_) | Value::Closure(_), _)
        | (Value::Primitive(_) | Value::Object(_), _) => false,
        _ => a == b,
    }
}

fn builtin_eq(a: Value, b: Value) -> bool {
    identical(&a, &b)
}

fn builtin_equal(a: Value, b: Value) -> bool {
    a == b
}

// =====================================================================
// Sequence operations that call back into scripts
// =====================================================================

fn builtin_map(interp: &mut Interpreter, args: Vec<Value>, env: &Environment) -> Result<Value, Error> {
    expect_function("map", &args[0])?;
    let seqs = args[1..]
        .iter()
        .map(|arg| Seq::from_value("map", arg))
        .collect::<Result<Vec<_>, _>>()?;
    let columns: Vec<Vec<Value>> = seqs.iter().map(|seq| seq.items().to_vec()).collect();
    let results = map_columns(interp, &args[0], &columns, env)?;
    Ok(seqs[0].rebuild(results))
}

fn builtin_for_each(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("for-each", &args[0])?;
    let columns = args[1..]
        .iter()
        .map(|arg| Seq::from_value("for-each", arg).map(|seq| seq.items().to_vec()))
        .collect::<Result<Vec<_>, _>>()?;
    map_columns(interp, &args[0], &columns, env)?;
    Ok(Value::Nil)
}

fn filter_like(
    name: &str,
    keep: bool,
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    expect_function(name, &args[0])?;
    let seq = Seq::from_value(name, &args[1])?;
    let selected = select(interp, &args[0], seq.items(), keep, env)?;
    Ok(seq.rebuild(selected))
}

fn builtin_filter(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    filter_like("filter", true, interp, &args, env)
}

fn builtin_remove(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    filter_like("remove", false, interp, &args, env)
}

/// `(reduce f initial seq)`
fn builtin_reduce(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("reduce", &args[0])?;
    let seq = Seq::from_value("reduce", &args[2])?;
    reduce_items(interp, &args[0], args[1].clone(), seq.items(), env)
}

fn builtin_find(interp: &mut Interpreter, args: Vec<Value>, env: &Environment) -> Result<Value, Error> {
    expect_function("find", &args[0])?;
    let seq = Seq::from_value("find", &args[1])?;
    find_item(interp, &args[0], seq.items(), env)
}

/// `(sort seq less?)`, returning a new sorted sequence
fn builtin_sort(interp: &mut Interpreter, args: Vec<Value>, env: &Environment) -> Result<Value, Error> {
    let seq = Seq::from_value("sort", &args[0])?;
    expect_function("sort", &args[1])?;
    let sorted = merge_sort(interp, seq.items().to_vec(), &args[1], env)?;
    Ok(seq.rebuild(sorted))
}

macro_rules! type_predicate {
    ($name:ident, $method:ident) => {
        fn $name(value: Value) -> bool {
            value.$method()
        }
    };
}

type_predicate!(builtin_is_nil, is_nil);
type_predicate!(builtin_is_pair, is_pair);
type_predicate!(builtin_is_list, is_list);
type_predicate!(builtin_is_symbol, is_symbol);
type_predicate!(builtin_is_string, is_string);
type_predicate!(builtin_is_boolean, is_boolean);
type_predicate!(builtin_is_function, is_function);
type_predicate!(builtin_is_object, is_object);

pub(super) fn register(interp: &mut Interpreter) {
    interp.register_builtin_operation::<_, (Value,)>("car", builtin_car);
    interp.register_builtin_operation::<_, (Value,)>("cdr", builtin_cdr);
    interp.register_builtin_operation::<_, (Value, Value)>("cons", builtin_cons);
    interp.register_variadic_builtin_operation::<_, (ValueIter<'static>,)>("list", Arity::Any, builtin_list);
    interp.register_builtin_operation::<_, (Value, Value)>("set-car!", builtin_set_car);
    interp.register_builtin_operation::<_, (Value, Value)>("set-cdr!", builtin_set_cdr);
    interp.register_builtin_operation::<_, (Value,)>("length", builtin_length);
    interp.register_variadic_builtin_operation::<_, (ValueIter<'static>,)>(
        "append",
        Arity::Any,
        builtin_append,
    );
    interp.register_builtin_operation::<_, (Value,)>("reverse", builtin_reverse);
    interp.register_builtin_operation::<_, (Value, NumberType)>("nth", builtin_nth);
    interp.register_builtin_operation::<_, (Value,)>("first", builtin_first);
    interp.register_builtin_operation::<_, (Value,)>("second", builtin_second);
    interp.register_builtin_operation::<_, (Value,)>("third", builtin_third);

    interp.register_builtin_operation::<_, (Value,)>("null?", builtin_is_nil);
    interp.register_builtin_operation::<_, (Value,)>("nil?", builtin_is_nil);
    interp.register_builtin_operation::<_, (Value,)>("pair?", builtin_is_pair);
    interp.register_builtin_operation::<_, (Value,)>("list?", builtin_is_list);
    interp.register_builtin_operation::<_, (Value,)>("symbol?", builtin_is_symbol);
    interp.register_builtin_operation::<_, (Value,)>("string?", builtin_is_string);
    interp.register_builtin_operation::<_, (Value,)>("boolean?", builtin_is_boolean);
    interp.register_builtin_operation::<_, (Value,)>("function?", builtin_is_function);
    interp.register_builtin_operation::<_, (Value,)>("object?", builtin_is_object);

    interp.register_builtin_operation::<_, (Value,)>("not", builtin_not);
    interp.register_builtin_operation::<_, (Value, Value)>("eq?", builtin_eq);
    interp.register_builtin_operation::<_, (Value, Value)>("equal?", builtin_equal);

    interp.register("map", Arity::AtLeast(2), builtin_map);
    interp.register("for-each", Arity::AtLeast(2), builtin_for_each);
    interp.register("filter", Arity::Exact(2), builtin_filter);
    interp.register("remove", Arity::Exact(2), builtin_remove);
    interp.register("reduce", Arity::Exact(3), builtin_reduce);
    interp.register("find", Arity::Exact(2), builtin_find);
    interp.register("sort", Arity::Exact(2), builtin_sort);
}

#[cfg(all(test, feature = "scheme"))]
mod tests {
    use super::super::test_support::TestResult::*;
    use super::super::test_support::{eval_err, run_cases, success};
    use crate::ast::{Value, nil, sym, val};

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_list_primitives_data_driven() {
        run_cases(vec![
            // === CONSTRUCTION AND ACCESS ===
            ("(cons 1 2)", success(Value::cons(1, 2))),
            ("(cons 1 '(2 3))", success([1, 2, 3])),
            ("(list)", success(nil())),
            ("(list 1 (+ 1 1) 3)", success([1, 2, 3])),
            ("(car '(1 2))", success(1)),
            ("(cdr '(1 2))", success([2])),
            ("(car '())", success(nil())),
            ("(cdr '())", success(nil())),
            ("(car 5)", SpecificError("car needs a pair")),
            ("(cdr \"s\")", SpecificError("cdr needs a pair")),
            ("(car '(1) '(2))", SpecificError("car expected 1 arguments, got 2")),
            // === MUTATION IS SHARED ===
            ("(define p (list 1 2))", Anything),
            ("(define q p)", Anything),
            ("(set-car! p 10)", success(10)),
            ("q", success([10, 2])),
            ("(set-cdr! p '(3 4))", success([3, 4])),
            ("q", success([10, 3, 4])),
            ("(set-car! 5 1)", SpecificError("set-car! needs a pair")),
            // === LENGTH / APPEND / REVERSE ===
            ("(length '())", success(0)),
            ("(length '(1 2 3))", success(3)),
            ("(length #(1 2))", success(2)),
            ("(length 5)", SpecificError("length needs a list or vector")),
            ("(length '(1 . 2))", Failure),
            ("(append)", success(nil())),
            ("(append '(1 2) '(3) '() '(4))", success([1, 2, 3, 4])),
            ("(append '(1) 2)", success(Value::cons(1, 2))),
            ("(append 1 '(2))", SpecificError("append needs lists")),
            ("(reverse '(1 2 3))", success([3, 2, 1])),
            ("(reverse '())", success(nil())),
            // === POSITIONAL ACCESS ===
            ("(nth '(a b c) 0)", success(sym("a"))),
            ("(nth '(a b c) 2)", success(sym("c"))),
            ("(nth #(a b c) 1)", success(sym("b"))),
            ("(nth '(a b c) 3)", SpecificError("Index error: nth: index 3 out of range")),
            ("(nth '(a b c) -1)", SpecificError("Index error")),
            ("(first '(1 2 3))", success(1)),
            ("(second #(1 2 3))", success(2)),
            ("(third '(1 2 3))", success(3)),
            ("(third '(1 2))", SpecificError("third needs at least 3 elements")),
            // === PREDICATES ===
            ("(null? '())", success(true)),
            ("(nil? '(1))", success(false)),
            ("(pair? '(1))", success(true)),
            ("(pair? '())", success(false)),
            ("(list? '())", success(true)),
            ("(list? '(1 . 2))", success(false)),
            ("(symbol? 'a)", success(true)),
            ("(string? \"a\")", success(true)),
            ("(boolean? #f)", success(true)),
            ("(boolean? '())", success(false)),
            ("(function? car)", success(true)),
            ("(function? (lambda (x) x))", success(true)),
            ("(function? 'car)", success(false)),
            ("(object? 1)", success(false)),
            // === LOGIC AND EQUALITY ===
            ("(not #f)", success(true)),
            ("(not '())", success(false)),
            ("(not 0)", success(false)),
            ("(eq? 'a 'a)", success(true)),
            ("(eq? 2 2)", success(true)),
            ("(eq? p p)", success(true)),
            ("(eq? '(1) '(1))", success(false)),
            ("(equal? '(1 (2)) '(1 (2)))", success(true)),
            ("(equal? #(1 2) #(1 2))", success(true)),
            ("(equal? \"a\" \"b\")", success(false)),
        ]);
    }

    #[test]
    fn test_sequence_operations_data_driven() {
        run_cases(vec![
            ("(map (lambda (x) (* x x)) '(1 2 3))", success([1, 4, 9])),
            ("(map + '(1 2 3) '(10 20))", success([11, 22])),
            ("(map car '())", success(nil())),
            (
                "(map (lambda (x) (+ x 1)) #(1 2))",
                EvalResult(Value::vector(vec![val(2), val(3)])),
            ),
            ("(map 5 '(1))", SpecificError("map needs a function")),
            ("(map car 5)", SpecificError("map needs a list or vector")),
            ("(define total 0)", Anything),
            ("(for-each (lambda (x) (set! total (+ total x))) '(1 2 3))", success(nil())),
            ("total", success(6)),
            ("(filter odd? '(1 2 3 4 5))", success([1, 3, 5])),
            ("(remove odd? '(1 2 3 4 5))", success([2, 4])),
            ("(filter odd? #(1 2 3))", EvalResult(Value::vector(vec![val(1), val(3)]))),
            ("(reduce + 0 '(1 2 3 4))", success(10)),
            ("(reduce + 0 '())", success(0)),
            ("(reduce + 0 '(7))", success(7)),
            ("(reduce - 0 #(10 1 2))", success(7)),
            ("(find even? '(1 3 4 6))", success(4)),
            ("(find even? '(1 3))", success(false)),
            ("(sort '(3 1 2) <)", success([1, 2, 3])),
            ("(sort #(3 1 2) >)", EvalResult(Value::vector(vec![val(3), val(2), val(1)]))),
            ("(sort '() <)", success(nil())),
            ("(sort '(1 \"a\") <)", SpecificError("expected number")),
        ]);
    }

    #[test]
    fn test_sort_is_stable() {
        let result = crate::Interpreter::new()
            .eval_str(
                "(sort '((1 a) (0 b) (1 c) (0 d))
                       (lambda (x y) (< (car x) (car y))))",
            )
            .unwrap_or_else(|e| panic!("sort failed: {e}"));
        assert_eq!(result.to_string(), "((0 b) (0 d) (1 a) (1 c))");
    }

    #[test]
    fn test_car_of_non_pair_is_type_error() {
        assert!(matches!(eval_err("(car 5)"), crate::Error::TypeError(_)));
    }

    #[test]
    fn test_circular_lists_fail_cleanly() {
        run_cases(vec![
            ("(define x (list 1 2))", Anything),
            ("(set-cdr! (cdr x) x)", Anything),
            ("(list? x)", success(false)),
            ("(pair? x)", success(true)),
            ("(car (cdr (cdr x)))", success(1)),
            ("(length x)", SpecificError("(1 2 . #<cycle>)")),
            ("(reverse x)", Failure),
            ("(map car x)", SpecificError("needs a list or vector")),
            ("(append x '(3))", SpecificError("append needs lists")),
            ("(equal? x x)", success(true)),
        ]);
    }
}

