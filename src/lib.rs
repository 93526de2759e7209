//! emblisp - an embeddable Lisp scripting runtime
//!
//! This crate provides a small dynamically typed Lisp that a host program links in,
//! extends with native primitives, and drives through a stable evaluation API.
//! Scripts call into host behaviour through registered primitives, and the host
//! calls back into scripts through [`evaluator::Interpreter::apply`] and
//! [`evaluator::Interpreter::apply_without_eval`].
//!
//! ```scheme
//! (define (square x) (* x x))
//! (vector-map square (vector 1 2 3))  ; => #(1 4 9)
//! (if '() "nil is truthy" "unreachable")
//! ```
//!
//! ## Runtime model
//!
//! - Values are a closed tagged union ([`ast::Value`]); lists are chains of mutable,
//!   shared cons cells terminated by nil.
//! - Scopes are reference-counted frames with interior mutability, so closures
//!   share (rather than copy) the bindings they capture.
//! - Every evaluation runs against an explicit [`evaluator::Interpreter`] context
//!   holding the global frame, the configuration and the debug controller. Several
//!   interpreters may coexist in one process.
//! - The debug controller can pause evaluation on an error, on a single step, or on
//!   an explicit `(debug)` call, and resume it with a substitute result.
//!
//! ## Modules
//!
//! - `ast`: value representation, constructors, predicates and accessors
//! - `evaluator`: the eval/apply loop, special forms and environment frames
//! - `builtinops`: arity contracts and the primitive registry
//! - `debugger`: the interactive debug controller
//! - `primitives`: arithmetic, list, vector and device-field libraries
//! - `scheme`: S-expression reader (feature `scheme`)

use std::fmt;

use crate::builtinops::Arity;

/// Maximum nesting accepted by the reader before it gives up
pub const MAX_PARSE_DEPTH: usize = 64;

/// Default bound on nested evaluation, see [`evaluator::InterpreterConfig`]
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input found after a complete expression
    TrailingContent,
    /// No reader is compiled into this build
    Unavailable,
}

/// A structured error describing a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Snippet of the input around the failure (at most 100 chars)
    pub context: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, context: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
        }
    }

    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }

    /// Create a ParseError with context extracted from `input` around `error_offset`
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");
        Self::new(kind, message, Some(display_context))
    }
}

/// Error types for the interpreter
///
/// Every script-level fault is one of these; the runtime never panics on bad input.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    /// An operation received a value of the wrong kind
    TypeError(String),
    /// Lookup or assignment of a name with no binding in the frame chain
    UnboundSymbol(String),
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },
    /// Vector or list position outside the valid range
    IndexError(String),
    /// Argument of the right kind but outside the operation's domain
    DomainError(String),
    DivideByZero,
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: impl Into<Arity>, got: usize) -> Self {
        Error::ArityError {
            expected: expected.into(),
            got,
            expression: None,
        }
    }

    /// Create an ArityError naming the callee or expression that was misapplied
    pub fn arity_error_with_expr(
        expected: impl Into<Arity>,
        got: usize,
        expression: impl Into<String>,
    ) -> Self {
        Error::ArityError {
            expected: expected.into(),
            got,
            expression: Some(expression.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UnboundSymbol(name) => write!(f, "Unbound symbol: {name}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr} expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: function expected {expected} arguments but got {got}"
                ),
            },
            Error::IndexError(msg) => write!(f, "Index error: {msg}"),
            Error::DomainError(msg) => write!(f, "Domain error: {msg}"),
            Error::DivideByZero => write!(f, "Division by zero"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod debugger;
pub mod evaluator;
pub mod primitives;

#[cfg(feature = "scheme")]
pub mod scheme;

pub use ast::Value;
pub use evaluator::{Environment, Interpreter, InterpreterConfig};
