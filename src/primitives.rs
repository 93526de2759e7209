//! Primitive libraries installed by [`Interpreter::new`].
//!
//! Everything here is client code: each library goes through the same public
//! registration calls a host program would use.

mod arithmetic;
pub mod device;
mod list;
mod vector;

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::{Environment, Interpreter};

pub(crate) fn register_all(interp: &mut Interpreter) {
    arithmetic::register(interp);
    list::register(interp);
    vector::register(interp);
    device::register(interp);
}

/// Fail unless `value` can be called with evaluated arguments
fn expect_function(name: &str, value: &Value) -> Result<(), Error> {
    if value.is_function() {
        Ok(())
    } else {
        Err(Error::TypeError(format!(
            "{name} needs a function, but got {value}"
        )))
    }
}

/// An index that must address an existing element of a sequence of `len`
fn element_index(name: &str, index: NumberType, len: usize) -> Result<usize, Error> {
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(i),
        _ => Err(Error::IndexError(format!(
            "{name}: index {index} out of range for length {len}"
        ))),
    }
}

/// A boundary position in `lo..=hi`, as used for slices and sizes
fn bound_index(name: &str, index: NumberType, lo: usize, hi: usize) -> Result<usize, Error> {
    match usize::try_from(index) {
        Ok(i) if (lo..=hi).contains(&i) => Ok(i),
        _ => Err(Error::IndexError(format!(
            "{name}: index {index} out of bounds ({lo}-{hi})"
        ))),
    }
}

/// A sequence argument seen as a flat list of elements
enum Seq {
    List(Vec<Value>),
    Vector(Vec<Value>),
}

impl Seq {
    fn from_value(name: &str, value: &Value) -> Result<Self, Error> {
        match value {
            Value::Vector(items) => Ok(Seq::Vector(items.borrow().clone())),
            _ if value.is_list() => Ok(Seq::List(value.list_to_vec()?)),
            _ => Err(Error::TypeError(format!(
                "{name} needs a list or vector, but got {value}"
            ))),
        }
    }

    fn items(&self) -> &[Value] {
        match self {
            Seq::List(items) | Seq::Vector(items) => items,
        }
    }

    /// Rebuild a sequence of the same kind from new elements
    fn rebuild(&self, items: Vec<Value>) -> Value {
        match self {
            Seq::List(_) => Value::list(items),
            Seq::Vector(_) => Value::vector(items),
        }
    }
}

// =====================================================================
// Higher-order helpers shared by the list and vector libraries
// =====================================================================

/// Apply `func` across `columns` in lockstep, stopping at the shortest
fn map_columns(
    interp: &mut Interpreter,
    func: &Value,
    columns: &[Vec<Value>],
    env: &Environment,
) -> Result<Vec<Value>, Error> {
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut results = Vec::with_capacity(rows);
    for row in 0..rows {
        let args = columns.iter().map(|column| column[row].clone()).collect();
        results.push(interp.apply_without_eval(func, args, env)?);
    }
    Ok(results)
}

/// Elements for which `pred` is truthy (`keep`) or not (`!keep`)
fn select(
    interp: &mut Interpreter,
    pred: &Value,
    items: &[Value],
    keep: bool,
    env: &Environment,
) -> Result<Vec<Value>, Error> {
    let mut selected = Vec::new();
    for item in items {
        let verdict = interp.apply_without_eval(pred, vec![item.clone()], env)?;
        if verdict.is_truthy() == keep {
            selected.push(item.clone());
        }
    }
    Ok(selected)
}

/// Left fold seeded by the first element; `initial` only for an empty input
fn reduce_items(
    interp: &mut Interpreter,
    func: &Value,
    initial: Value,
    items: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let Some((first, rest)) = items.split_first() else {
        return Ok(initial);
    };
    let mut acc = first.clone();
    for item in rest {
        acc = interp.apply_without_eval(func, vec![acc, item.clone()], env)?;
    }
    Ok(acc)
}

/// First element satisfying `pred`, or `#f`
fn find_item(
    interp: &mut Interpreter,
    pred: &Value,
    items: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    for item in items {
        if interp
            .apply_without_eval(pred, vec![item.clone()], env)?
            .is_truthy()
        {
            return Ok(item.clone());
        }
    }
    Ok(Value::Bool(false))
}

/// Stable merge sort; `less(a, b)` truthy puts `a` first
fn merge_sort(
    interp: &mut Interpreter,
    items: Vec<Value>,
    less: &Value,
    env: &Environment,
) -> Result<Vec<Value>, Error> {
    if items.len() <= 1 {
        return Ok(items);
    }

    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(interp, left, less, env)?;
    let right = merge_sort(interp, right, less, env)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        // Ties keep the left element first
        let take_right = interp
            .apply_without_eval(less, vec![r.clone(), l.clone()], env)?
            .is_truthy();
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}
