//! This module defines the core value types of the interpreter. The main enum,
//! [`Value`], is the single tagged union used for both data and code: numbers,
//! strings, interned symbols, mutable cons cells, vectors, closures, primitives and
//! opaque host objects. Ergonomic helpers such as [`val`], [`sym`] and [`nil`] are
//! provided for convenient construction in tests. Conversion traits cover common Rust
//! types, so `Value::from([1, 2, 3])` builds a proper list and `i64::try_from(v)`
//! unwraps an integer with a typed error on mismatch.
//!
//! Sharing semantics follow the runtime model: cloning a pair, vector, closure or
//! object clones a handle, so in-place mutation through one handle is observed
//! through every other.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use internment::Intern;

use crate::Error;
use crate::builtinops::{Arity, BuiltinOp};
use crate::evaluator::Environment;

/// Type alias for integer values in the interpreter
pub(crate) type NumberType = i64;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$%&:.^~@";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
#[cfg_attr(not(feature = "scheme"), expect(dead_code))]
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if (first_char == '-' || first_char == '.')
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name != "."
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Interned identifier.
///
/// Two symbols with the same name share one allocation, so equality and hashing
/// are pointer operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(Intern<String>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Intern::from_ref(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

/// Mutable cons cell.
///
/// Both slots are independently mutable through a shared handle; `set-car!` on one
/// reference is visible through all of them.
pub struct Pair {
    head: RefCell<Value>,
    tail: RefCell<Value>,
}

impl Pair {
    pub fn new(head: Value, tail: Value) -> Self {
        Pair {
            head: RefCell::new(head),
            tail: RefCell::new(tail),
        }
    }

    pub fn head(&self) -> Value {
        self.head.borrow().clone()
    }

    pub fn tail(&self) -> Value {
        self.tail.borrow().clone()
    }

    pub fn set_head(&self, value: Value) {
        *self.head.borrow_mut() = value;
    }

    pub fn set_tail(&self, value: Value) {
        *self.tail.borrow_mut() = value;
    }
}

// Long lists would otherwise be freed recursively, one native frame per cell.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut next = std::mem::replace(self.tail.get_mut(), Value::Nil);
        while let Value::Pair(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => next = std::mem::replace(pair.tail.get_mut(), Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// User-defined function: parameters, body and the frame it closes over.
///
/// The captured frame is a shared handle, so assignments made through it after the
/// closure was created are visible inside the closure and vice versa.
pub struct Closure {
    params: Vec<Symbol>,
    rest: Option<Symbol>,
    body: Vec<Value>,
    env: Environment,
    name: RefCell<Option<Symbol>>,
}

impl Closure {
    pub(crate) fn new(
        params: Vec<Symbol>,
        rest: Option<Symbol>,
        body: Vec<Value>,
        env: Environment,
    ) -> Self {
        Closure {
            params,
            rest,
            body,
            env,
            name: RefCell::new(None),
        }
    }

    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    pub fn rest_param(&self) -> Option<Symbol> {
        self.rest
    }

    pub fn body(&self) -> &[Value] {
        &self.body
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn name(&self) -> Option<Symbol> {
        *self.name.borrow()
    }

    /// Functions take the name of the first `define` that binds them
    pub(crate) fn name_if_anonymous(&self, name: Symbol) {
        let mut slot = self.name.borrow_mut();
        if slot.is_none() {
            *slot = Some(name);
        }
    }

    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.params.len()),
            None => Arity::Exact(self.params.len()),
        }
    }
}

/// Opaque host payload carried through scripts untouched.
pub struct HostObject {
    tag: String,
    payload: Box<dyn Any>,
}

impl HostObject {
    pub fn new<T: Any>(tag: impl Into<String>, payload: T) -> Self {
        HostObject {
            tag: tag.into(),
            payload: Box::new(payload),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

/// Numeric view of a value, used by arithmetic and typed numeric parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(NumberType),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Integer(n) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }
}

/// Core value type of the interpreter
///
/// To build values in code, use the conversions and helpers:
/// - `val(42)` for atoms, `sym("name")` for symbols, `nil()` for the empty list
/// - `val([1, 2, 3])` for homogeneous proper lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
/// - [`Value::vector`] for vectors
#[derive(Clone)]
pub enum Value {
    /// The empty list; distinct from `#f` and truthy
    Nil,
    Bool(bool),
    Integer(NumberType),
    Float(f64),
    String(String),
    Symbol(Symbol),
    Pair(Rc<Pair>),
    /// Fixed-length, mutable, index-addressable sequence
    Vector(Rc<RefCell<Vec<Value>>>),
    Closure(Rc<Closure>),
    Primitive(Rc<BuiltinOp>),
    Object(Rc<HostObject>),
}

impl Value {
    pub fn cons(head: impl Into<Value>, tail: impl Into<Value>) -> Value {
        Value::Pair(Rc::new(Pair::new(head.into(), tail.into())))
    }

    /// Build a list whose final tail is `tail` (Nil gives a proper list)
    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Value {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Self::list_with_tail(items, Value::Nil)
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(RefCell::new(items)))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn object<T: Any>(tag: impl Into<String>, payload: T) -> Value {
        Value::Object(Rc::new(HostObject::new(tag, payload)))
    }

    // Predicates

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    /// True for Nil and for pair chains terminated by Nil; false for circular chains
    pub fn is_list(&self) -> bool {
        self.walk_list(|_| {}) == ListEnd::Nil
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Value::Vector(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Closures and primitives (special forms included)
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Primitive(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Everything except `#f` is true; Nil and 0 included
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Vector(_) => "vector",
            Value::Closure(_) => "function",
            Value::Primitive(_) => "primitive",
            Value::Object(_) => "object",
        }
    }

    // Accessors. Callers check the matching predicate first; a mistagged value
    // here is a bug in the caller, not a script error.

    pub fn integer_value(&self) -> NumberType {
        match self {
            Value::Integer(n) => *n,
            other => panic!("integer_value called on {}", other.type_name()),
        }
    }

    /// Integers are widened, so this is valid whenever `is_number` holds
    pub fn float_value(&self) -> f64 {
        match self {
            Value::Float(x) => *x,
            Value::Integer(n) => *n as f64,
            other => panic!("float_value called on {}", other.type_name()),
        }
    }

    pub fn boolean_value(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => panic!("boolean_value called on {}", other.type_name()),
        }
    }

    pub fn string_value(&self) -> &str {
        match self {
            Value::String(s) => s,
            other => panic!("string_value called on {}", other.type_name()),
        }
    }

    pub fn symbol_value(&self) -> Symbol {
        match self {
            Value::Symbol(s) => *s,
            other => panic!("symbol_value called on {}", other.type_name()),
        }
    }

    pub fn pair_value(&self) -> &Rc<Pair> {
        match self {
            Value::Pair(p) => p,
            other => panic!("pair_value called on {}", other.type_name()),
        }
    }

    pub fn vector_value(&self) -> &Rc<RefCell<Vec<Value>>> {
        match self {
            Value::Vector(v) => v,
            other => panic!("vector_value called on {}", other.type_name()),
        }
    }

    pub fn closure_value(&self) -> &Rc<Closure> {
        match self {
            Value::Closure(c) => c,
            other => panic!("closure_value called on {}", other.type_name()),
        }
    }

    pub fn primitive_value(&self) -> &Rc<BuiltinOp> {
        match self {
            Value::Primitive(op) => op,
            other => panic!("primitive_value called on {}", other.type_name()),
        }
    }

    pub fn object_value(&self) -> &Rc<HostObject> {
        match self {
            Value::Object(o) => o,
            other => panic!("object_value called on {}", other.type_name()),
        }
    }

    // List helpers

    /// Iterate the heads of a pair chain, stopping at the first non-pair tail
    pub fn list_iter(&self) -> ListIter {
        ListIter {
            current: self.clone(),
        }
    }

    /// Collect a proper list into a Vec; anything else is a TypeError
    pub fn list_to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        match self.walk_list(|head| items.push(head)) {
            ListEnd::Nil => Ok(items),
            ListEnd::Other => Err(Error::TypeError(format!(
                "expected a proper list, but got {self}"
            ))),
            ListEnd::Cycle => Err(Error::TypeError(format!(
                "expected a proper list, but got a circular list {self}"
            ))),
        }
    }

    /// Visit the heads of a pair chain until its tail is not a pair or the chain
    /// comes back on itself.
    ///
    /// `slow` advances one pair for every two taken by `current`; they can only
    /// meet inside a cycle.
    fn walk_list(&self, mut visit: impl FnMut(Value)) -> ListEnd {
        let mut current = self.clone();
        let mut slow = self.clone();
        let mut steps = 0usize;
        loop {
            match &current {
                Value::Nil => return ListEnd::Nil,
                Value::Pair(pair) => {
                    visit(pair.head());
                    let next = pair.tail();
                    current = next;
                }
                _ => return ListEnd::Other,
            }

            steps += 1;
            if steps % 2 == 0
                && let Value::Pair(pair) = &slow
            {
                let next = pair.tail();
                slow = next;
            }
            if let (Value::Pair(a), Value::Pair(b)) = (&slow, &current)
                && Rc::ptr_eq(a, b)
            {
                return ListEnd::Cycle;
            }
        }
    }
}

/// How a pair chain ends
#[derive(Debug, PartialEq)]
enum ListEnd {
    Nil,
    /// A non-pair, non-nil tail (improper list)
    Other,
    Cycle,
}

/// Iterator over the elements of a (possibly improper) list
pub struct ListIter {
    current: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let Value::Pair(pair) = &self.current else {
            return None;
        };
        let head = pair.head();
        let tail = pair.tail();
        self.current = tail;
        Some(head)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::Pair(_) => write!(f, "List({self})"),
            Value::Vector(_) => write!(f, "Vector({self})"),
            Value::Closure(c) => write!(f, "Closure(params={:?}, rest={:?})", c.params, c.rest),
            Value::Primitive(op) => write!(f, "Primitive({})", op.name),
            Value::Object(o) => write!(f, "Object({})", o.tag),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Printer::default())
    }
}

/// Nesting beyond this is elided when printing
const MAX_DISPLAY_DEPTH: usize = 128;

/// Containers on the path from the printed root to the current element
#[derive(Default)]
struct Printer {
    open: HashSet<usize>,
    depth: usize,
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, printer: &mut Printer) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
        Value::Integer(n) => write!(f, "{n}"),
        Value::Float(x) => {
            if x.is_finite() && x.fract() == 0.0 {
                write!(f, "{x:.1}")
            } else {
                write!(f, "{x}")
            }
        }
        Value::String(s) => {
            write!(f, "\"")?;
            for ch in s.chars() {
                match ch {
                    '"' => write!(f, "\\\"")?,
                    '\\' => write!(f, "\\\\")?,
                    '\n' => write!(f, "\\n")?,
                    '\t' => write!(f, "\\t")?,
                    '\r' => write!(f, "\\r")?,
                    c => write!(f, "{c}")?,
                }
            }
            write!(f, "\"")
        }
        Value::Symbol(s) => write!(f, "{s}"),
        Value::Pair(pair) => {
            let id = Rc::as_ptr(pair) as usize;
            if printer.open.contains(&id) {
                return write!(f, "#<cycle>");
            }
            if printer.depth >= MAX_DISPLAY_DEPTH {
                return write!(f, "(...)");
            }
            printer.depth += 1;
            let mut spine = Vec::new();
            let result = write_pair_chain(f, pair, printer, &mut spine);
            for id in spine {
                printer.open.remove(&id);
            }
            printer.depth -= 1;
            result
        }
        Value::Vector(items) => {
            let id = Rc::as_ptr(items) as usize;
            if printer.open.contains(&id) {
                return write!(f, "#<cycle>");
            }
            if printer.depth >= MAX_DISPLAY_DEPTH {
                return write!(f, "#(...)");
            }
            printer.open.insert(id);
            printer.depth += 1;
            let result = write_vector_items(f, &items.borrow(), printer);
            printer.depth -= 1;
            printer.open.remove(&id);
            result
        }
        Value::Closure(c) => match c.name() {
            Some(name) => write!(f, "#<function:{name}>"),
            None => write!(f, "#<function:anonymous>"),
        },
        Value::Primitive(op) => write!(f, "#<primitive:{}>", op.name),
        Value::Object(o) => write!(f, "#<object:{}>", o.tag),
    }
}

/// Write `(a b . c)`; every spine pair entered is recorded in `spine` so the
/// caller can close it again
fn write_pair_chain(
    f: &mut fmt::Formatter<'_>,
    first: &Rc<Pair>,
    printer: &mut Printer,
    spine: &mut Vec<usize>,
) -> fmt::Result {
    printer.open.insert(Rc::as_ptr(first) as usize);
    spine.push(Rc::as_ptr(first) as usize);

    write!(f, "(")?;
    write_value(f, &first.head(), printer)?;
    let mut tail = first.tail();
    loop {
        match tail {
            Value::Nil => break,
            Value::Pair(next) => {
                let id = Rc::as_ptr(&next) as usize;
                if !printer.open.insert(id) {
                    write!(f, " . #<cycle>")?;
                    break;
                }
                spine.push(id);
                write!(f, " ")?;
                write_value(f, &next.head(), printer)?;
                tail = next.tail();
            }
            other => {
                write!(f, " . ")?;
                write_value(f, &other, printer)?;
                break;
            }
        }
    }
    write!(f, ")")
}

fn write_vector_items(
    f: &mut fmt::Formatter<'_>,
    items: &[Value],
    printer: &mut Printer,
) -> fmt::Result {
    write!(f, "#(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write_value(f, item, printer)?;
    }
    write!(f, ")")
}

/// Structural equality for data, identity for callables and host objects
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structurally_equal(self, other, &mut HashSet::new())
    }
}

/// `seen` holds the container pairs already under comparison. Meeting one again
/// means both sides repeat the same way from there, so it counts as equal.
fn structurally_equal(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::Pair(a), Value::Pair(b)) => {
            let (mut left, mut right) = (a.clone(), b.clone());
            loop {
                if Rc::ptr_eq(&left, &right)
                    || !seen.insert((Rc::as_ptr(&left) as usize, Rc::as_ptr(&right) as usize))
                {
                    return true;
                }
                if !structurally_equal(&left.head(), &right.head(), seen) {
                    return false;
                }
                match (left.tail(), right.tail()) {
                    (Value::Pair(l), Value::Pair(r)) => {
                        left = l;
                        right = r;
                    }
                    (l, r) => return structurally_equal(&l, &r, seen),
                }
            }
        }
        (Value::Vector(a), Value::Vector(b)) => {
            if Rc::ptr_eq(a, b) || !seen.insert((Rc::as_ptr(a) as usize, Rc::as_ptr(b) as usize)) {
                return true;
            }
            let (left, right) = (a.borrow(), b.borrow());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(l, r)| structurally_equal(l, r, seen))
        }
        (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
        (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

/// Operations with nothing useful to return produce Nil
impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into Rust types.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(Error::TypeError(format!("expected integer, got {other}"))),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<f64, Error> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Integer(n) => Ok(n as f64),
            other => Err(Error::TypeError(format!("expected number, got {other}"))),
        }
    }
}

impl TryFrom<Value> for Number {
    type Error = Error;

    fn try_from(value: Value) -> Result<Number, Error> {
        match value {
            Value::Integer(n) => Ok(Number::Integer(n)),
            Value::Float(x) => Ok(Number::Float(x)),
            other => Err(Error::TypeError(format!("expected number, got {other}"))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<bool, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Error::TypeError(format!("expected boolean, got {other}"))),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<String, Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::TypeError(format!("expected string, got {other}"))),
        }
    }
}

impl TryFrom<Value> for Symbol {
    type Error = Error;

    fn try_from(value: Value) -> Result<Symbol, Error> {
        match value {
            Value::Symbol(s) => Ok(s),
            other => Err(Error::TypeError(format!("expected symbol, got {other}"))),
        }
    }
}

/// Helper function for creating symbols - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list (nil)
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Nil
}
