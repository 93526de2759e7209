//! Primitive registry: arity contracts and the callable wrapper bound into frames.
//!
//! Every native callable visible to scripts is a [`BuiltinOp`] stored in a
//! [`Value::Primitive`]. Registration binds it into a frame under its name; a later
//! registration under the same name replaces the earlier binding, which is how hosts
//! and test suites stub behaviour.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive evaluated arguments (e.g., `+`, `car`, `vector-ref`)
//! - **Special Forms**: receive raw operand expressions and decide what to evaluate
//!   (e.g., `if`, `define`, `lambda`)
//!
//! Special forms live in the same registry as functions, so they can be replaced the
//! same way. The core forms are listed in [`core_special_forms`].
//!
//! ## Arity
//!
//! Each op declares an [`Arity`]. The evaluator checks the argument count against it
//! on every call, before the native body runs; a mismatch is an `ArityError` and the
//! body never executes.
//!
//! ```text
//! "2"     exactly two
//! ">=1"   at least one
//! "1|2"   one or two
//! "*"     any number
//! ```

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::Error;
use crate::ast::Value;
use crate::evaluator::intooperation::OperationFn;
use crate::evaluator::{
    Environment, Interpreter, eval_and, eval_begin, eval_cond, eval_define, eval_if,
    eval_lambda, eval_let, eval_or, eval_quote, eval_set,
};

/// Declared acceptable argument-count shape of a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// A short set of acceptable exact counts
    OneOf(Vec<usize>),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
            Arity::OneOf(counts) => counts.contains(&count),
            Arity::Any => true,
        }
    }

    /// Check the given number of arguments against this contract
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(self.clone(), count))
        }
    }
}

impl From<usize> for Arity {
    fn from(n: usize) -> Self {
        Arity::Exact(n)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::OneOf(counts) => match counts.split_last() {
                Some((last, [])) => write!(f, "{last}"),
                Some((last, init)) => {
                    let init: Vec<String> = init.iter().map(ToString::to_string).collect();
                    write!(f, "{} or {last}", init.join(", "))
                }
                None => write!(f, "no"),
            },
            Arity::Any => write!(f, "any number of"),
        }
    }
}

impl FromStr for Arity {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Error> {
        let spec = spec.trim();
        let bad_spec = || Error::DomainError(format!("invalid arity spec '{spec}'"));
        let count = |s: &str| s.trim().parse::<usize>().map_err(|_| bad_spec());

        if spec == "*" {
            Ok(Arity::Any)
        } else if let Some(lower) = spec.strip_prefix(">=") {
            Ok(Arity::AtLeast(count(lower)?))
        } else if spec.contains('|') {
            let mut counts = spec.split('|').map(count).collect::<Result<Vec<_>, _>>()?;
            counts.sort_unstable();
            counts.dedup();
            Ok(Arity::OneOf(counts))
        } else {
            Ok(Arity::Exact(count(spec)?))
        }
    }
}

/// Signature of a special form: raw operands and the frame they appear in
pub type SpecialFormFn = fn(&mut Interpreter, &[Value], &Environment) -> Result<Value, Error>;

/// Represents the implementation of a primitive (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Takes evaluated arguments via the canonical erased builtin signature
    Function(Rc<OperationFn>),
    /// Takes unevaluated operands and the calling frame
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// A named native callable with its arity contract
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    pub name: String,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl BuiltinOp {
    pub fn function(name: impl Into<String>, arity: Arity, func: Rc<OperationFn>) -> Self {
        BuiltinOp {
            name: name.into(),
            op_kind: OpKind::Function(func),
            arity,
        }
    }

    pub fn special_form(name: impl Into<String>, arity: Arity, form: SpecialFormFn) -> Self {
        BuiltinOp {
            name: name.into(),
            op_kind: OpKind::SpecialForm(form),
            arity,
        }
    }

    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check the argument count, naming this op in the error
    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        if self.arity.accepts(arg_count) {
            Ok(())
        } else {
            Err(Error::arity_error_with_expr(
                self.arity.clone(),
                arg_count,
                self.name.clone(),
            ))
        }
    }
}

/// The special forms every interpreter starts with.
///
/// Kept as a single table for ease of auditing; [`Interpreter`] binds each entry into
/// its global frame at construction.
pub(crate) fn core_special_forms() -> Vec<BuiltinOp> {
    vec![
        BuiltinOp::special_form("quote", Arity::Exact(1), eval_quote),
        // A third branch is an arity failure, not silently ignored
        BuiltinOp::special_form("if", Arity::OneOf(vec![2, 3]), eval_if),
        BuiltinOp::special_form("cond", Arity::Any, eval_cond),
        BuiltinOp::special_form("define", Arity::AtLeast(1), eval_define),
        BuiltinOp::special_form("set!", Arity::Exact(2), eval_set),
        BuiltinOp::special_form("lambda", Arity::AtLeast(2), eval_lambda),
        BuiltinOp::special_form("let", Arity::AtLeast(2), eval_let),
        BuiltinOp::special_form("begin", Arity::Any, eval_begin),
        BuiltinOp::special_form("and", Arity::Any, eval_and),
        BuiltinOp::special_form("or", Arity::Any, eval_or),
    ]
}
