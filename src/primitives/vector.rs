//! Vector primitives.
//!
//! A vector's length is fixed once created. The `!` primitives rewrite slots in
//! place and are seen through every reference; everything else builds a new
//! vector. Indexes outside the vector are `IndexError`s, never clamped.

use std::cell::RefCell;
use std::rc::Rc;

use super::{
    bound_index, element_index, expect_function, find_item, map_columns, merge_sort, reduce_items,
    select,
};
use crate::Error;
use crate::ast::{NumberType, Value};
use crate::builtinops::Arity;
use crate::evaluator::intooperation::ValueIter;
use crate::evaluator::{Environment, Interpreter};

type Cells = Rc<RefCell<Vec<Value>>>;

fn vector_arg<'a>(name: &str, value: &'a Value) -> Result<&'a Cells, Error> {
    match value {
        Value::Vector(cells) => Ok(cells),
        other => Err(Error::TypeError(format!(
            "{name} needs a vector, but got {other}"
        ))),
    }
}

/// Snapshot of a vector's elements, so callbacks may touch the vector freely
fn elements(name: &str, value: &Value) -> Result<Vec<Value>, Error> {
    Ok(vector_arg(name, value)?.borrow().clone())
}

fn new_size(name: &str, size: NumberType) -> Result<usize, Error> {
    usize::try_from(size)
        .map_err(|_| Error::DomainError(format!("{name} needs a non-negative size, but got {size}")))
}

// =====================================================================
// Construction and conversion
// =====================================================================

fn builtin_make_vector(size: NumberType, mut fill: ValueIter<'_>) -> Result<Value, Error> {
    let size = new_size("make-vector", size)?;
    let fill = fill.next().cloned().unwrap_or(Value::Nil);
    Ok(Value::vector(vec![fill; size]))
}

fn builtin_vector(args: ValueIter<'_>) -> Value {
    Value::vector(args.cloned().collect())
}

fn builtin_vector_copy(v: Value) -> Result<Value, Error> {
    Ok(Value::vector(elements("vector-copy", &v)?))
}

fn builtin_list_to_vector(list: Value) -> Result<Value, Error> {
    if !list.is_list() {
        return Err(Error::TypeError(format!(
            "list->vector needs a list, but got {list}"
        )));
    }
    Ok(Value::vector(list.list_to_vec()?))
}

fn builtin_vector_to_list(v: Value) -> Result<Value, Error> {
    Ok(Value::list(elements("vector->list", &v)?))
}

/// `(make-initialized-vector size f)`: slot `i` holds `(f i)`
fn builtin_make_initialized_vector(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    let size = NumberType::try_from(args[0].clone())?;
    let size = new_size("make-initialized-vector", size)?;
    expect_function("make-initialized-vector", &args[1])?;

    let mut items = Vec::with_capacity(size);
    for i in 0..size {
        let index = NumberType::try_from(i).map_err(|_| Error::DomainError("index overflow".into()))?;
        items.push(interp.apply_without_eval(&args[1], vec![Value::Integer(index)], env)?);
    }
    Ok(Value::vector(items))
}

/// A longer copy; the new slots hold Nil
fn builtin_vector_grow(v: Value, size: NumberType) -> Result<Value, Error> {
    let mut items = elements("vector-grow", &v)?;
    let size = new_size("vector-grow", size)?;
    if size <= items.len() {
        return Err(Error::DomainError(format!(
            "vector-grow needs a size larger than {}, but got {size}",
            items.len()
        )));
    }
    items.resize(size, Value::Nil);
    Ok(Value::vector(items))
}

// =====================================================================
// Access
// =====================================================================

fn builtin_is_vector(v: Value) -> bool {
    v.is_vector()
}

fn builtin_vector_length(v: Value) -> Result<NumberType, Error> {
    let len = vector_arg("vector-length", &v)?.borrow().len();
    NumberType::try_from(len).map_err(|_| Error::DomainError("vector too long".into()))
}

fn builtin_vector_ref(v: Value, index: NumberType) -> Result<Value, Error> {
    let items = vector_arg("vector-ref", &v)?.borrow();
    let i = element_index("vector-ref", index, items.len())?;
    Ok(items[i].clone())
}

fn builtin_vector_set(v: Value, index: NumberType, value: Value) -> Result<Value, Error> {
    let mut items = vector_arg("vector-set!", &v)?.borrow_mut();
    let i = element_index("vector-set!", index, items.len())?;
    items[i] = value.clone();
    Ok(value)
}

macro_rules! vector_position {
    ($name:ident, $label:literal, $index:literal) => {
        fn $name(v: Value) -> Result<Value, Error> {
            let items = vector_arg($label, &v)?.borrow();
            let i = element_index($label, $index, items.len())?;
            Ok(items[i].clone())
        }
    };
}

vector_position!(builtin_vector_first, "vector-first", 0);
vector_position!(builtin_vector_second, "vector-second", 1);
vector_position!(builtin_vector_third, "vector-third", 2);
vector_position!(builtin_vector_fourth, "vector-fourth", 3);
vector_position!(builtin_vector_fifth, "vector-fifth", 4);
vector_position!(builtin_vector_sixth, "vector-sixth", 5);
vector_position!(builtin_vector_seventh, "vector-seventh", 6);
vector_position!(builtin_vector_eighth, "vector-eighth", 7);
vector_position!(builtin_vector_ninth, "vector-ninth", 8);
vector_position!(builtin_vector_tenth, "vector-tenth", 9);

/// `(subvector v start end)`: elements `start..end`
fn builtin_subvector(v: Value, start: NumberType, end: NumberType) -> Result<Value, Error> {
    let items = vector_arg("subvector", &v)?.borrow();
    let start = bound_index("subvector", start, 0, items.len())?;
    let end = bound_index("subvector", end, start, items.len())?;
    Ok(Value::vector(items[start..end].to_vec()))
}

fn builtin_vector_head(v: Value, end: NumberType) -> Result<Value, Error> {
    let items = vector_arg("vector-head", &v)?.borrow();
    let end = bound_index("vector-head", end, 0, items.len())?;
    Ok(Value::vector(items[..end].to_vec()))
}

fn builtin_vector_tail(v: Value, start: NumberType) -> Result<Value, Error> {
    let items = vector_arg("vector-tail", &v)?.borrow();
    let start = bound_index("vector-tail", start, 0, items.len())?;
    Ok(Value::vector(items[start..].to_vec()))
}

// =====================================================================
// In-place mutation
// =====================================================================

fn builtin_vector_fill(v: Value, value: Value) -> Result<Value, Error> {
    vector_arg("vector-fill!", &v)?.borrow_mut().fill(value);
    Ok(v)
}

fn builtin_subvector_fill(
    v: Value,
    start: NumberType,
    end: NumberType,
    value: Value,
) -> Result<Value, Error> {
    {
        let mut items = vector_arg("subvector-fill!", &v)?.borrow_mut();
        let len = items.len();
        let start = bound_index("subvector-fill!", start, 0, len)?;
        let end = bound_index("subvector-fill!", end, start, len)?;
        items[start..end].fill(value);
    }
    Ok(v)
}

/// Copy `src[start..end]` into `dst` at `at`, one slot at a time in the given
/// direction. The direction matters when source and destination overlap.
fn move_subvector(
    name: &str,
    src: &Value,
    start: NumberType,
    end: NumberType,
    dst: &Value,
    at: NumberType,
    descending: bool,
) -> Result<(), Error> {
    let src_cells = vector_arg(name, src)?;
    let dst_cells = vector_arg(name, dst)?;

    let src_len = src_cells.borrow().len();
    let start = bound_index(name, start, 0, src_len)?;
    let end = bound_index(name, end, start, src_len)?;
    let dst_len = dst_cells.borrow().len();
    let at = bound_index(name, at, 0, dst_len)?;

    let count = end - start;
    if count > dst_len - at {
        return Err(Error::IndexError(format!(
            "{name}: {count} elements do not fit at index {at} of a vector of length {dst_len}"
        )));
    }

    let order: Vec<usize> = if descending {
        (0..count).rev().collect()
    } else {
        (0..count).collect()
    };

    if Rc::ptr_eq(src_cells, dst_cells) {
        let mut items = dst_cells.borrow_mut();
        for k in order {
            items[at + k] = items[start + k].clone();
        }
    } else {
        let source = src_cells.borrow();
        let mut target = dst_cells.borrow_mut();
        for k in order {
            target[at + k] = source[start + k].clone();
        }
    }
    Ok(())
}

fn builtin_subvector_move_left(
    src: Value,
    start: NumberType,
    end: NumberType,
    dst: Value,
    at: NumberType,
) -> Result<Value, Error> {
    move_subvector("subvector-move-left!", &src, start, end, &dst, at, false)?;
    Ok(dst)
}

fn builtin_subvector_move_right(
    src: Value,
    start: NumberType,
    end: NumberType,
    dst: Value,
    at: NumberType,
) -> Result<Value, Error> {
    move_subvector("subvector-move-right!", &src, start, end, &dst, at, true)?;
    Ok(dst)
}

// =====================================================================
// Higher-order operations
// =====================================================================

fn builtin_vector_map(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("vector-map", &args[0])?;
    let columns = args[1..]
        .iter()
        .map(|v| elements("vector-map", v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::vector(map_columns(interp, &args[0], &columns, env)?))
}

fn builtin_vector_for_each(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("vector-for-each", &args[0])?;
    let columns = args[1..]
        .iter()
        .map(|v| elements("vector-for-each", v))
        .collect::<Result<Vec<_>, _>>()?;
    map_columns(interp, &args[0], &columns, env)?;
    Ok(Value::Nil)
}

/// `(vector-reduce f initial v)`
fn builtin_vector_reduce(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("vector-reduce", &args[0])?;
    let items = elements("vector-reduce", &args[2])?;
    reduce_items(interp, &args[0], args[1].clone(), &items, env)
}

fn builtin_vector_filter(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("vector-filter", &args[0])?;
    let items = elements("vector-filter", &args[1])?;
    Ok(Value::vector(select(interp, &args[0], &items, true, env)?))
}

fn builtin_vector_remove(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("vector-remove", &args[0])?;
    let items = elements("vector-remove", &args[1])?;
    Ok(Value::vector(select(interp, &args[0], &items, false, env)?))
}

fn builtin_vector_find(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    expect_function("vector-find", &args[0])?;
    let items = elements("vector-find", &args[1])?;
    find_item(interp, &args[0], &items, env)
}

/// `(vector-sort v less?)`: a sorted copy
fn builtin_vector_sort(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    let items = elements("vector-sort", &args[0])?;
    expect_function("vector-sort", &args[1])?;
    Ok(Value::vector(merge_sort(interp, items, &args[1], env)?))
}

/// `(vector-sort! v less?)`: sorts the slots of `v` and returns it
fn builtin_vector_sort_in_place(
    interp: &mut Interpreter,
    args: Vec<Value>,
    env: &Environment,
) -> Result<Value, Error> {
    let items = elements("vector-sort!", &args[0])?;
    expect_function("vector-sort!", &args[1])?;
    let sorted = merge_sort(interp, items, &args[1], env)?;

    let cells = vector_arg("vector-sort!", &args[0])?;
    let mut slots = cells.borrow_mut();
    for (slot, value) in slots.iter_mut().zip(sorted) {
        *slot = value;
    }
    drop(slots);
    Ok(args[0].clone())
}

pub(super) fn register(interp: &mut Interpreter) {
    interp.register_variadic_builtin_operation::<_, (NumberType, ValueIter<'static>)>(
        "make-vector",
        Arity::OneOf(vec![1, 2]),
        builtin_make_vector,
    );
    interp.register_variadic_builtin_operation::<_, (ValueIter<'static>,)>(
        "vector",
        Arity::Any,
        builtin_vector,
    );
    interp.register_builtin_operation::<_, (Value,)>("vector-copy", builtin_vector_copy);
    interp.register_builtin_operation::<_, (Value,)>("list->vector", builtin_list_to_vector);
    interp.register_builtin_operation::<_, (Value,)>("vector->list", builtin_vector_to_list);
    interp.register(
        "make-initialized-vector",
        Arity::Exact(2),
        builtin_make_initialized_vector,
    );
    interp.register_builtin_operation::<_, (Value, NumberType)>("vector-grow", builtin_vector_grow);

    interp.register_builtin_operation::<_, (Value,)>("vector?", builtin_is_vector);
    interp.register_builtin_operation::<_, (Value,)>("vector-length", builtin_vector_length);
    interp.register_builtin_operation::<_, (Value, NumberType)>("vector-ref", builtin_vector_ref);
    interp.register_builtin_operation::<_, (Value, NumberType, Value)>(
        "vector-set!",
        builtin_vector_set,
    );

    let positions: [(&str, fn(Value) -> Result<Value, Error>); 10] = [
        ("vector-first", builtin_vector_first),
        ("vector-second", builtin_vector_second),
        ("vector-third", builtin_vector_third),
        ("vector-fourth", builtin_vector_fourth),
        ("vector-fifth", builtin_vector_fifth),
        ("vector-sixth", builtin_vector_sixth),
        ("vector-seventh", builtin_vector_seventh),
        ("vector-eighth", builtin_vector_eighth),
        ("vector-ninth", builtin_vector_ninth),
        ("vector-tenth", builtin_vector_tenth),
    ];
    for (name, accessor) in positions {
        interp.register_builtin_operation::<_, (Value,)>(name, accessor);
    }

    interp.register_builtin_operation::<_, (Value, NumberType, NumberType)>(
        "subvector",
        builtin_subvector,
    );
    interp.register_builtin_operation::<_, (Value, NumberType)>("vector-head", builtin_vector_head);
    interp.register_builtin_operation::<_, (Value, NumberType)>("vector-tail", builtin_vector_tail);

    interp.register_builtin_operation::<_, (Value, Value)>("vector-fill!", builtin_vector_fill);
    interp.register_builtin_operation::<_, (Value, NumberType, NumberType, Value)>(
        "subvector-fill!",
        builtin_subvector_fill,
    );
    interp.register_builtin_operation::<_, (Value, NumberType, NumberType, Value, NumberType)>(
        "subvector-move-left!",
        builtin_subvector_move_left,
    );
    interp.register_builtin_operation::<_, (Value, NumberType, NumberType, Value, NumberType)>(
        "subvector-move-right!",
        builtin_subvector_move_right,
    );

    interp.register("vector-map", Arity::AtLeast(2), builtin_vector_map);
    interp.register("vector-for-each", Arity::AtLeast(2), builtin_vector_for_each);
    interp.register("vector-reduce", Arity::Exact(3), builtin_vector_reduce);
    interp.register("vector-filter", Arity::Exact(2), builtin_vector_filter);
    interp.register("vector-remove", Arity::Exact(2), builtin_vector_remove);
    interp.register("vector-find", Arity::Exact(2), builtin_vector_find);
    interp.register("vector-sort", Arity::Exact(2), builtin_vector_sort);
    interp.register("vector-sort!", Arity::Exact(2), builtin_vector_sort_in_place);
}
