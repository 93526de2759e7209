use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Number, Value};
use crate::evaluator::{Environment, Interpreter};

// NOTE: This module is internal plumbing for the evaluator.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` used at runtime.
//
// Typed operations never see the interpreter or the calling frame;
// primitives that need to call back into scripts (map, sort, ...)
// register an `OperationFn` directly through `Interpreter::register`.

/// Canonical erased primitive signature used by the evaluator.
///
/// Primitives receive the interpreter (for re-entrant `apply`), ownership
/// of their evaluated argument vector, and the calling frame.
pub type OperationFn = dyn Fn(&mut Interpreter, Vec<Value>, &Environment) -> Result<Value, Error>;

// =====================================================================
// Internal machinery for fixed-arity argument conversion
// =====================================================================

/// Core trait used by the fixed-arity adapters to turn `Value` nodes
/// into strongly-typed parameters.
///
/// The associated `Param<'a>` type is the parameter type as seen by
/// the builtin for a given lifetime of the local `Value` slots used
/// during argument conversion.
pub trait FromParam {
    type Param<'a>;

    /// Convert a single argument into this parameter type, either
    /// borrowing from the slot (`&str`) or moving out of it.
    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, Value::Nil))
    }
}

// Blanket implementation for by-value parameters obtainable through
// `TryFrom<Value>` (see `ast.rs`): i64, f64, bool, String, Number, Symbol.
impl<T> FromParam for T
where
    Value: TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        let owned = std::mem::replace(value, Value::Nil);
        owned.try_into()
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        if let Value::String(s) = value {
            Ok(s.as_str())
        } else {
            Err(Error::TypeError(format!("expected string, got {value}")))
        }
    }
}

// =====================================================================
// Generic typed iterator over the rest arguments
// =====================================================================

/// Marker trait describing how to view a `Value` slice as a typed
/// iterator. Implementations validate the whole slice up front, so a
/// bad element anywhere fails the call before the builtin sees any.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project<'a>(v: &'a Value) -> Self::Item<'a>;
}

/// Iterator over rest arguments, parameterized by a [`ValueElementKind`]
/// that determines the element type and validation.
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }
}

impl<'a, K> Iterator for TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.inner.next()?;
        Some(K::project(v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for TypedValueIter<'_, K> where K: ValueElementKind {}
impl<K> FusedIterator for TypedValueIter<'_, K> where K: ValueElementKind {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = Number;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        match slice.iter().find(|v| !v.is_number()) {
            Some(bad) => Err(Error::TypeError(format!("expected number, got {bad}"))),
            None => Ok(()),
        }
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        match v {
            Value::Integer(n) => Number::Integer(*n),
            _ => Number::Float(v.float_value()),
        }
    }
}

#[doc(hidden)]
pub struct StringKind;

impl ValueElementKind for StringKind {
    type Item<'a> = &'a str;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        match slice.iter().find(|v| !v.is_string()) {
            Some(bad) => Err(Error::TypeError(format!("expected string, got {bad}"))),
            None => Ok(()),
        }
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        v.string_value()
    }
}

/// Borrowed iterator over the rest arguments as raw values.
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Rest arguments narrowed to [`Number`]; any non-number fails the call
/// before the builtin runs.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Rest arguments narrowed to `&str`.
pub type StringIter<'a> = TypedValueIter<'a, StringKind>;

// =====================================================================
// Rest-parameter support for variadic operations
// =====================================================================

/// Core trait used to construct rest-parameter values from a slice of
/// arguments.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

// =====================================================================
// Return-type adaptation for builtin functions
// =====================================================================

/// Normalizes builtin return types to the canonical `Result<Value, Error>`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Converts a strongly-typed Rust function or closure into the erased
/// [`OperationFn`], parameterized by an argument tuple type.
///
/// The argument count is fixed by the signature and exposed as
/// [`IntoOperation::ARITY`] so registration can declare it.
pub trait IntoOperation<Args> {
    const ARITY: usize;

    fn into_operation(self) -> Rc<OperationFn>;
}

/// Operations whose signature ends in a rest parameter (`ValueIter`,
/// `NumIter` or `StringIter`), optionally after a fixed prefix of
/// `FromParam` parameters. Arity must be declared at registration.
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Rc<OperationFn>;
}

// =====================================================================
// Variadic adapters using iterator-based rest parameters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Rc<OperationFn> {
        Rc::new(
            move |_: &mut Interpreter, args: Vec<Value>, _: &Environment| {
                let rest_param: <I as FromRest>::Param<'_> =
                    <I as FromRest>::from_rest(&args[..])?;
                (self)(rest_param).into_value_result()
            },
        )
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of `FromParam`
/// parameters followed by a single rest parameter.
macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Rc<OperationFn> {
                Rc::new(move |_: &mut Interpreter, mut args: Vec<Value>, _: &Environment| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            (self)( $( $p ),+, rest_param ).into_value_result()
                        }
                        _ => Err(Error::arity_error(crate::builtinops::Arity::AtLeast($prefix), len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, v0, p0: A1, v1, p1: A2);
impl_into_variadic_operation_for_prefix_and_rest!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for functions of various arities.
///
/// The evaluator has already checked the count against the declared arity;
/// the slice pattern re-checks it so a mis-declared registration fails with
/// an `ArityError` instead of a panic.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            const ARITY: usize = $arity;

            fn into_operation(self) -> Rc<OperationFn> {
                Rc::new(move |_: &mut Interpreter, mut args: Vec<Value>, _: &Environment| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            (self)( $( $p ),+ ).into_value_result()
                        }
                        _ => Err(Error::arity_error($arity, len)),
                    }
                })
            }
        }
    };
}

// 0-arg functions / closures
impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + 'static,
    R: IntoValueResult,
{
    const ARITY: usize = 0;

    fn into_operation(self) -> Rc<OperationFn> {
        Rc::new(
            move |_: &mut Interpreter, args: Vec<Value>, _: &Environment| {
                if !args.is_empty() {
                    return Err(Error::arity_error(0, args.len()));
                }
                (self)().into_value_result()
            },
        )
    }
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
impl_into_operation_for_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);
impl_into_operation_for_arity!(4, v0, p0: A1, v1, p1: A2, v2, p2: A3, v3, p3: A4);
impl_into_operation_for_arity!(5, v0, p0: A1, v1, p1: A2, v2, p2: A3, v3, p3: A4, v4, p4: A5);
