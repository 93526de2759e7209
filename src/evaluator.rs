//! The Eval/Apply loop.
//!
//! All evaluation runs against an explicit [`Interpreter`]: it owns the global
//! frame, the configuration and the [`DebugController`], so nothing about a running
//! script lives in process-wide state.

pub mod environment;
pub mod intooperation;

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::Error;
use crate::ast::{Closure, Pair, Symbol, Value};
use crate::builtinops::{Arity, BuiltinOp, OpKind, SpecialFormFn, core_special_forms};
use crate::debugger::{self, DebugController};
use intooperation::{IntoOperation, IntoVariadicOperation};

pub use environment::Environment;

/// Runtime configuration for an [`Interpreter`]
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Nested evaluations beyond this fail with an `EvalError`
    pub max_eval_depth: usize,
    /// A human is attached to the debugger's input
    pub interactive: bool,
    /// Enter the debugger when an evaluation fails (needs `interactive`)
    pub break_on_error: bool,
    /// Echo every evaluated form and its result to the debugger output
    pub trace: bool,
    /// Prefix character of debugger commands
    pub command_prefix: char,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_eval_depth: crate::DEFAULT_MAX_EVAL_DEPTH,
            interactive: false,
            break_on_error: true,
            trace: false,
            command_prefix: ':',
        }
    }
}

/// An evaluation context: global frame, debug controller and configuration.
///
/// Dropping the interpreter tears down every frame created under its global frame,
/// which releases closures that captured the frame they are stored in.
pub struct Interpreter {
    global: Environment,
    debugger: DebugController,
    config: InterpreterConfig,
    depth: usize,
}

impl Interpreter {
    /// An interpreter with every primitive library installed
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let mut interp = Self::minimal(config);
        crate::primitives::register_all(&mut interp);
        interp
    }

    /// Only the special forms and the debugger primitives; hosts add the rest
    pub fn minimal(config: InterpreterConfig) -> Self {
        let mut interp = Interpreter {
            global: Environment::new(),
            debugger: DebugController::new(&config),
            config,
            depth: 0,
        };
        for op in core_special_forms() {
            interp.bind_op(op);
        }
        debugger::register_primitives(&mut interp);
        interp
    }

    pub fn global(&self) -> &Environment {
        &self.global
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn debugger(&self) -> &DebugController {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut DebugController {
        &mut self.debugger
    }

    /// Current nesting of `eval` calls
    pub fn depth(&self) -> usize {
        self.depth
    }

    // =================================================================
    // Registration
    // =================================================================

    /// Bind a native function in the global frame, replacing any earlier binding.
    ///
    /// The evaluator checks the argument count against `arity` before `func` runs.
    /// `func` receives the interpreter, so it can call back into scripts through
    /// [`Interpreter::apply_without_eval`], and the calling frame.
    pub fn register<F>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&mut Interpreter, Vec<Value>, &Environment) -> Result<Value, Error> + 'static,
    {
        self.bind_op(BuiltinOp::function(name, arity, Rc::new(func)));
    }

    /// Bind a form that receives its operands unevaluated
    pub fn register_special_form(&mut self, name: &str, arity: Arity, form: SpecialFormFn) {
        self.bind_op(BuiltinOp::special_form(name, arity, form));
    }

    /// Register a strongly-typed Rust function as a builtin operation using
    /// automatic argument extraction and result conversion.
    ///
    /// ```
    /// use emblisp::Interpreter;
    ///
    /// fn add(a: i64, b: i64) -> i64 { a + b }
    ///
    /// let mut interp = Interpreter::new();
    /// interp.register_builtin_operation::<_, (i64, i64)>("add2", add);
    /// ```
    ///
    /// Supported parameter types: `i64`, `f64`, `bool`, `String`, `&str`,
    /// [`crate::ast::Number`], [`crate::ast::Symbol`] and `Value`. Further scalar
    /// types participate by implementing `TryFrom<Value, Error = Error>`.
    ///
    /// The return type is anything `Into<Value>`, or `Result<R, Error>` of one.
    /// The arity is `Exact(n)` for an `n`-parameter function; conversion failures
    /// are `TypeError`s.
    pub fn register_builtin_operation<F, Args>(&mut self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        let arity = Arity::Exact(<F as IntoOperation<Args>>::ARITY);
        self.bind_op(BuiltinOp::function(name, arity, func.into_operation()));
    }

    /// Register a builtin whose signature ends in a rest parameter.
    ///
    /// Examples:
    /// - rest of all arguments as values: `fn(ValueIter<'_>) -> R`
    /// - numeric tail: `fn(NumIter<'_>) -> R`
    /// - fixed prefix plus numeric tail: `fn(i64, NumIter<'_>) -> R`
    ///
    /// The minimum and maximum counts are not derivable from the signature, so
    /// the [`Arity`] is given explicitly.
    pub fn register_variadic_builtin_operation<F, Args>(
        &mut self,
        name: &str,
        arity: Arity,
        func: F,
    ) where
        F: IntoVariadicOperation<Args>,
    {
        self.bind_op(BuiltinOp::function(name, arity, func.into_variadic_operation()));
    }

    fn bind_op(&mut self, op: BuiltinOp) {
        debug!(name = %op.name, arity = %op.arity, special = op.is_special_form(), "registering primitive");
        self.global
            .define(Symbol::new(&op.name), Value::Primitive(Rc::new(op)));
    }

    // =================================================================
    // Evaluation
    // =================================================================

    /// Evaluate `expr` in `env`
    pub fn eval(&mut self, expr: &Value, env: &Environment) -> Result<Value, Error> {
        if self.depth == 0 {
            self.debugger.unwinding = false;
        }
        if self.depth >= self.config.max_eval_depth {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {})",
                self.config.max_eval_depth
            )));
        }

        self.depth += 1;
        let result = self.eval_step(expr, env);
        self.depth -= 1;
        result
    }

    /// Parse every form in `source` and evaluate them in order in the global
    /// frame, returning the last result (Nil for empty input)
    #[cfg(feature = "scheme")]
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Error> {
        let forms = crate::scheme::parse_scheme_all(source)?;
        let global = self.global.clone();
        let mut last = Value::Nil;
        for form in &forms {
            last = self.eval(form, &global)?;
        }
        Ok(last)
    }

    fn eval_step(&mut self, expr: &Value, env: &Environment) -> Result<Value, Error> {
        if let Some(value) = self.step_hooks(expr, env) {
            return Ok(value);
        }

        match expr {
            Value::Symbol(name) => match env.lookup(*name) {
                Ok(value) => Ok(value),
                Err(err) => self.signal_error(err, env),
            },

            Value::Pair(pair) => {
                env.set_current_code(expr);
                let indent = "  ".repeat(self.depth.saturating_sub(1));
                if self.debugger.trace {
                    self.debugger.write_line(&format!("{indent}{expr}"));
                }

                let result = match self.eval_pair(pair, env) {
                    Ok(value) => Ok(value),
                    Err(err) => self.signal_error(add_context(err, expr), env),
                };

                if self.debugger.trace
                    && let Ok(value) = &result
                {
                    self.debugger.write_line(&format!("{indent}=> {value}"));
                }
                result
            }

            // Everything else evaluates to itself, Nil included
            _ => Ok(expr.clone()),
        }
    }

    /// Single-step and step-out pauses, taken before `expr` is evaluated
    fn step_hooks(&mut self, expr: &Value, env: &Environment) -> Option<Value> {
        if self.debugger.eval_in_debug_repl || self.debugger.paused.is_some() {
            return None;
        }

        let stepping_out = self
            .debugger
            .current_frame
            .as_ref()
            .and_then(Environment::parent)
            .is_some_and(|target| target.ptr_eq(env));

        if !self.debugger.single_step && !stepping_out {
            return None;
        }

        self.debugger.single_step = false;
        self.debugger.current_frame = None;
        trace!(%expr, frame = env.label(), "pausing before evaluation");
        self.debugger.write_line(&format!("Paused before: {expr}"));
        debugger::debug_repl(self, env);
        self.debugger.return_value.take()
    }

    fn eval_pair(&mut self, pair: &Pair, env: &Environment) -> Result<Value, Error> {
        let head = self.eval(&pair.head(), env)?;
        let operands = pair.tail().list_to_vec().map_err(|_| {
            Error::EvalError(format!("Improper argument list: {}", pair.tail()))
        })?;

        if !head.is_function() {
            return Err(Error::TypeError(format!("not a function: {head}")));
        }
        self.apply(&head, &operands, env)
    }

    /// Apply `func` to operand expressions.
    ///
    /// Functions and closures receive the operands evaluated left to right in
    /// `env`; a special form receives them as written.
    pub fn apply(
        &mut self,
        func: &Value,
        arg_exprs: &[Value],
        env: &Environment,
    ) -> Result<Value, Error> {
        if let Value::Primitive(op) = func
            && let OpKind::SpecialForm(form) = &op.op_kind
        {
            op.validate_arity(arg_exprs.len())?;
            return form(self, arg_exprs, env);
        }

        let args = arg_exprs
            .iter()
            .map(|arg| self.eval(arg, env))
            .collect::<Result<Vec<_>, _>>()?;
        self.apply_without_eval(func, args, env)
    }

    /// Apply `func` to arguments that are already values.
    ///
    /// This is the entry point for host code and for primitives that call back
    /// into scripts (`map`, `vector-sort`, ...).
    pub fn apply_without_eval(
        &mut self,
        func: &Value,
        args: Vec<Value>,
        env: &Environment,
    ) -> Result<Value, Error> {
        match func {
            Value::Primitive(op) => match &op.op_kind {
                OpKind::Function(native) => {
                    op.validate_arity(args.len())?;
                    native(self, args, env)
                }
                OpKind::SpecialForm(_) => Err(Error::TypeError(format!(
                    "special form {} cannot be applied to evaluated arguments",
                    op.name
                ))),
            },
            Value::Closure(closure) => self.apply_closure(closure, args),
            other => Err(Error::TypeError(format!("not a function: {other}"))),
        }
    }

    fn apply_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value, Error> {
        let label = closure
            .name()
            .map_or_else(|| "lambda".to_owned(), |name| name.to_string());

        let arity = closure.arity();
        if !arity.accepts(args.len()) {
            return Err(Error::arity_error_with_expr(arity, args.len(), label));
        }

        let frame = Environment::with_parent(closure.env(), label);
        let mut args = args.into_iter();
        for (param, arg) in closure.params().iter().zip(args.by_ref()) {
            frame.define(*param, arg);
        }
        if let Some(rest) = closure.rest_param() {
            frame.define(rest, Value::list(args.collect()));
        }

        eval_body(self, closure.body(), &frame)
    }

    /// Offer a failure to the debugger.
    ///
    /// With break-on-error and interactive mode on, prints the failure and runs the
    /// command loop in `env`. A value installed there with `:r` becomes the
    /// successful result; otherwise the failure propagates and is not offered
    /// again while it unwinds.
    pub fn signal_error(&mut self, error: Error, env: &Environment) -> Result<Value, Error> {
        if !self.debugger.should_break() {
            return Err(error);
        }

        warn!(%error, frame = env.label(), "evaluation failed; entering debugger");
        self.debugger.write_line(&format!("ERROR!  {error}"));
        debugger::debug_repl(self, env);

        match self.debugger.return_value.take() {
            Some(value) => Ok(value),
            None => {
                self.debugger.unwinding = true;
                Err(error)
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.global.teardown();
    }
}

/// Attach the failing expression to type and evaluation errors, innermost wins
fn add_context(error: Error, expr: &Value) -> Error {
    const MARKER: &str = "\n  Context: ";
    match error {
        Error::EvalError(msg) if !msg.contains(MARKER) => {
            Error::EvalError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        Error::TypeError(msg) if !msg.contains(MARKER) => {
            Error::TypeError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        other => other,
    }
}

/// Evaluate expressions in order and return the last value (Nil when empty)
fn eval_body(interp: &mut Interpreter, body: &[Value], env: &Environment) -> Result<Value, Error> {
    let mut last = Value::Nil;
    for expr in body {
        last = interp.eval(expr, env)?;
    }
    Ok(last)
}

/// Parameter list of a lambda: `(a b)`, `(a b . rest)` or a bare `args`
fn parse_params(spec: &Value) -> Result<(Vec<Symbol>, Option<Symbol>), Error> {
    let mut params: Vec<Symbol> = Vec::new();
    let check = |name: Symbol, params: &[Symbol]| {
        if params.contains(&name) {
            Err(Error::EvalError(format!("Duplicate parameter name: {name}")))
        } else {
            Ok(name)
        }
    };

    let mut current = spec.clone();
    loop {
        match current {
            Value::Nil => return Ok((params, None)),
            Value::Symbol(rest) => {
                let rest = check(rest, &params)?;
                return Ok((params, Some(rest)));
            }
            Value::Pair(pair) => {
                let Value::Symbol(name) = pair.head() else {
                    return Err(Error::TypeError(format!(
                        "Lambda parameters must be symbols, got {}",
                        pair.head()
                    )));
                };
                let name = check(name, &params)?;
                params.push(name);
                current = pair.tail();
            }
            other => {
                return Err(Error::TypeError(format!(
                    "Lambda parameters must be a list, got {other}"
                )));
            }
        }
    }
}

fn make_closure(params: &Value, body: &[Value], env: &Environment) -> Result<Rc<Closure>, Error> {
    let (params, rest) = parse_params(params)?;
    Ok(Rc::new(Closure::new(params, rest, body.to_vec(), env.clone())))
}

// =====================================================================
// Special forms
// =====================================================================

pub(crate) fn eval_quote(
    _interp: &mut Interpreter,
    args: &[Value],
    _env: &Environment,
) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

pub(crate) fn eval_if(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    match args {
        [condition, then_expr, rest @ ..] if rest.len() <= 1 => {
            if interp.eval(condition, env)?.is_truthy() {
                interp.eval(then_expr, env)
            } else {
                match rest {
                    [else_expr] => interp.eval(else_expr, env),
                    _ => Ok(Value::Nil),
                }
            }
        }
        _ => Err(Error::arity_error_with_expr(
            Arity::OneOf(vec![2, 3]),
            args.len(),
            "if",
        )),
    }
}

pub(crate) fn eval_cond(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let else_symbol = Symbol::new("else");
    for clause in args {
        let clause = clause
            .list_to_vec()
            .map_err(|_| Error::TypeError(format!("cond clause must be a list, got {clause}")))?;
        let Some((test, body)) = clause.split_first() else {
            return Err(Error::TypeError("cond clause must not be empty".to_owned()));
        };

        let test_value = match test {
            Value::Symbol(name) if *name == else_symbol => Value::Bool(true),
            _ => interp.eval(test, env)?,
        };
        if test_value.is_truthy() {
            return if body.is_empty() {
                Ok(test_value)
            } else {
                eval_body(interp, body, env)
            };
        }
    }
    Ok(Value::Nil)
}

pub(crate) fn eval_define(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name)] => {
            env.define(*name, Value::Nil);
            Ok(Value::Symbol(*name))
        }
        [Value::Symbol(name), expr] => {
            let value = interp.eval(expr, env)?;
            if let Value::Closure(closure) = &value {
                closure.name_if_anonymous(*name);
            }
            env.define(*name, value);
            Ok(Value::Symbol(*name))
        }
        [Value::Symbol(_), ..] => Err(Error::arity_error_with_expr(2, args.len(), "define")),
        // (define (name . params) body...)
        [Value::Pair(signature), body @ ..] => {
            let Value::Symbol(name) = signature.head() else {
                return Err(Error::TypeError(format!(
                    "define requires a symbol, got {}",
                    signature.head()
                )));
            };
            if body.is_empty() {
                return Err(Error::EvalError(format!("define of {name} has no body")));
            }
            let closure = make_closure(&signature.tail(), body, env)?;
            closure.name_if_anonymous(name);
            env.define(name, Value::Closure(closure));
            Ok(Value::Symbol(name))
        }
        [other, ..] => Err(Error::TypeError(format!(
            "define requires a symbol, got {other}"
        ))),
        [] => Err(Error::arity_error_with_expr(Arity::AtLeast(1), 0, "define")),
    }
}

pub(crate) fn eval_set(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = interp.eval(expr, env)?;
            env.assign(*name, value.clone())?;
            Ok(value)
        }
        [other, _] => Err(Error::TypeError(format!(
            "set! requires a symbol, got {other}"
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "set!")),
    }
}

pub(crate) fn eval_lambda(
    _interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    match args {
        [params, body @ ..] if !body.is_empty() => {
            Ok(Value::Closure(make_closure(params, body, env)?))
        }
        _ => Err(Error::arity_error_with_expr(
            Arity::AtLeast(2),
            args.len(),
            "lambda",
        )),
    }
}

pub(crate) fn eval_let(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let [bindings, body @ ..] = args else {
        return Err(Error::arity_error_with_expr(Arity::AtLeast(2), 0, "let"));
    };
    let bindings = bindings
        .list_to_vec()
        .map_err(|_| Error::TypeError(format!("let bindings must be a list, got {bindings}")))?;

    // Inits see the outer frame only
    let mut values = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        let (name, init) = match binding {
            Value::Symbol(name) => (*name, None),
            Value::Pair(pair) => match (pair.head(), pair.tail().list_to_vec()) {
                (Value::Symbol(name), Ok(rest)) if rest.len() <= 1 => {
                    (name, rest.into_iter().next())
                }
                _ => {
                    return Err(Error::TypeError(format!(
                        "malformed let binding: {binding}"
                    )));
                }
            },
            other => {
                return Err(Error::TypeError(format!(
                    "malformed let binding: {other}"
                )));
            }
        };
        let value = match init {
            Some(expr) => interp.eval(&expr, env)?,
            None => Value::Nil,
        };
        values.push((name, value));
    }

    let frame = Environment::with_parent(env, "let");
    for (name, value) in values {
        frame.define(name, value);
    }
    eval_body(interp, body, &frame)
}

pub(crate) fn eval_begin(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    eval_body(interp, args, env)
}

/// `and` returns the first false value or the last value; `(and)` is `#t`
pub(crate) fn eval_and(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let mut last = Value::Bool(true);
    for arg in args {
        last = interp.eval(arg, env)?;
        if !last.is_truthy() {
            return Ok(last);
        }
    }
    Ok(last)
}

/// `or` returns the first true value; `(or)` is `#f`
pub(crate) fn eval_or(
    interp: &mut Interpreter,
    args: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    for arg in args {
        let value = interp.eval(arg, env)?;
        if value.is_truthy() {
            return Ok(value);
        }
    }
    Ok(Value::Bool(false))
}

#[cfg(all(test, feature = "scheme"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{Number, nil, sym, val};
    use crate::evaluator::intooperation::{NumIter, StringIter, ValueIter};
    use crate::scheme::parse_scheme;

    fn eval_in(interp: &mut Interpreter, source: &str) -> Result<Value, Error> {
        let expr = parse_scheme(source).unwrap();
        let global = interp.global().clone();
        interp.eval(&expr, &global)
    }

    #[test]
    fn test_register_builtin_operation_add() {
        fn add(a: i64, b: i64) -> i64 {
            a + b
        }
        let mut interp = Interpreter::new();
        interp.register_builtin_operation::<_, (i64, i64)>("add2", add);
        assert_eq!(eval_in(&mut interp, "(add2 7 5)").unwrap(), val(12));

        let err = eval_in(&mut interp, "(add2 7)").unwrap_err();
        assert!(matches!(err, Error::ArityError { got: 1, .. }), "{err:?}");
        assert!(err.to_string().contains("add2 expected 2 arguments, got 1"));
    }

    #[test]
    fn test_register_builtin_operation_zero_arg() {
        fn forty_two() -> i64 {
            42
        }

        let mut interp = Interpreter::new();
        interp.register_builtin_operation::<_, ()>("forty-two", forty_two);
        assert_eq!(eval_in(&mut interp, "(forty-two)").unwrap(), val(42));
    }

    #[test]
    fn test_register_builtin_operation_result_builtin() {
        fn safe_div(a: i64, b: i64) -> Result<i64, Error> {
            if b == 0 {
                Err(Error::DivideByZero)
            } else {
                Ok(a / b)
            }
        }

        let mut interp = Interpreter::new();
        interp.register_builtin_operation::<_, (i64, i64)>("safe-div", safe_div);

        assert_eq!(eval_in(&mut interp, "(safe-div 6 3)").unwrap(), val(2));
        assert_eq!(
            eval_in(&mut interp, "(safe-div 1 0)").unwrap_err(),
            Error::DivideByZero
        );
        // Conversion failures are type errors
        let err = eval_in(&mut interp, "(safe-div \"6\" 3)").unwrap_err();
        assert!(matches!(err, Error::TypeError(_)), "{err:?}");
    }

    #[test]
    fn test_register_builtin_operation_borrowed_str() {
        fn shout(s: &str) -> String {
            s.to_uppercase()
        }

        let mut interp = Interpreter::new();
        interp.register_builtin_operation::<_, (&str,)>("shout", shout);
        assert_eq!(eval_in(&mut interp, "(shout \"hey\")").unwrap(), val("HEY"));
    }

    #[test]
    fn test_register_variadic_with_rest_values() {
        fn first_and_rest_count(mut args: ValueIter<'_>) -> Result<Value, Error> {
            let first = match args.next() {
                Some(Value::Integer(n)) => *n,
                Some(_) => return Err(Error::TypeError("first argument must be a number".into())),
                None => return Err(Error::arity_error(Arity::AtLeast(1), 0)),
            };
            let rest_count = args.count() as i64;
            Ok(val([first, rest_count]))
        }

        let mut interp = Interpreter::new();
        interp.register_variadic_builtin_operation::<_, (ValueIter<'static>,)>(
            "first-rest-count",
            Arity::AtLeast(1),
            first_and_rest_count,
        );
        assert_eq!(
            eval_in(&mut interp, "(first-rest-count 42 \"x\" #t 7)").unwrap(),
            val([42, 3])
        );
        let err = eval_in(&mut interp, "(first-rest-count)").unwrap_err();
        assert!(matches!(err, Error::ArityError { .. }), "{err:?}");
    }

    #[test]
    fn test_register_variadic_fixed_plus_rest() {
        fn weighted_sum(weight: i64, nums: NumIter<'_>) -> f64 {
            weight as f64 * nums.map(Number::as_f64).sum::<f64>()
        }
        fn join(sep: &str, parts: StringIter<'_>) -> String {
            parts.collect::<Vec<_>>().join(sep)
        }

        let mut interp = Interpreter::new();
        interp.register_variadic_builtin_operation::<_, (i64, NumIter<'static>)>(
            "weighted-sum",
            Arity::AtLeast(1),
            weighted_sum,
        );
        interp.register_variadic_builtin_operation::<_, (&str, StringIter<'static>)>(
            "join",
            Arity::AtLeast(1),
            join,
        );

        assert_eq!(eval_in(&mut interp, "(weighted-sum 2 1 2 3)").unwrap(), val(12.0));
        assert_eq!(
            eval_in(&mut interp, "(join \"-\" \"a\" \"b\")").unwrap(),
            val("a-b")
        );
        let err = eval_in(&mut interp, "(weighted-sum 2 1 \"x\")").unwrap_err();
        assert!(matches!(err, Error::TypeError(_)), "{err:?}");
    }

    #[test]
    fn test_registration_replaces_earlier_binding() {
        let mut interp = Interpreter::new();
        interp.register("car", Arity::Exact(1), |_, _, _| Ok(val("stubbed")));
        assert_eq!(eval_in(&mut interp, "(car '(1 2))").unwrap(), val("stubbed"));

        // Special forms are replaceable the same way
        fn always_seven(_: &mut Interpreter, _: &[Value], _: &Environment) -> Result<Value, Error> {
            Ok(val(7))
        }
        interp.register_special_form("if", Arity::Any, always_seven);
        assert_eq!(eval_in(&mut interp, "(if #f 1 2 3 4)").unwrap(), val(7));
    }

    #[test]
    fn test_arity_checked_before_native_body() {
        use std::cell::Cell;

        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let mut interp = Interpreter::new();
        interp.register("count-calls", Arity::OneOf(vec![1, 2]), move |_, _, _| {
            seen.set(seen.get() + 1);
            Ok(Value::Nil)
        });

        eval_in(&mut interp, "(count-calls 1)").unwrap();
        let err = eval_in(&mut interp, "(count-calls 1 2 3)").unwrap_err();
        assert!(err.to_string().contains("count-calls expected 1 or 2 arguments, got 3"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_apply_and_apply_without_eval() {
        let mut interp = Interpreter::new();
        eval_in(&mut interp, "(define (add3 a b c) (+ a b c))").unwrap();
        let global = interp.global().clone();
        let add3 = global.lookup(Symbol::new("add3")).unwrap();

        let result = interp
            .apply(&add3, &[val(1), parse_scheme("(* 2 3)").unwrap(), val(4)], &global)
            .unwrap();
        assert_eq!(result, val(11));

        // Values are passed through without evaluation
        let quoted = parse_scheme("(a b)").unwrap();
        let list = global.lookup(Symbol::new("list")).unwrap();
        let result = interp
            .apply_without_eval(&list, vec![quoted.clone(), sym("x")], &global)
            .unwrap();
        assert_eq!(result, val(vec![quoted, sym("x")]));

        let err = interp.apply_without_eval(&val(5), vec![], &global).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));

        let quote = global.lookup(Symbol::new("quote")).unwrap();
        let err = interp.apply_without_eval(&quote, vec![val(1)], &global).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
    }

    #[test]
    fn test_host_calls_back_into_scripts() {
        let mut interp = Interpreter::new();
        interp.register("call-twice", Arity::Exact(2), |interp, args, env| {
            let once = interp.apply_without_eval(&args[0], vec![args[1].clone()], env)?;
            interp.apply_without_eval(&args[0], vec![once], env)
        });
        assert_eq!(
            eval_in(&mut interp, "(call-twice (lambda (x) (* x 10)) 3)").unwrap(),
            val(300)
        );
    }

    #[test]
    fn test_eval_str_runs_every_form() {
        let mut interp = Interpreter::new();
        let result = interp
            .eval_str("(define x 2) ; comment\n(define y 3)\n(* x y)")
            .unwrap();
        assert_eq!(result, val(6));
        assert_eq!(interp.eval_str("").unwrap(), nil());
    }

    #[test]
    fn test_errors_carry_context() {
        let mut interp = Interpreter::new();
        let err = eval_in(&mut interp, "(+ 1 (car 5))").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("while evaluating: (car 5)"), "{msg}");
        assert!(!msg.contains("while evaluating: (+ 1 (car 5))"), "{msg}");
    }

    #[test]
    fn test_minimal_interpreter_has_only_core() {
        let mut interp = Interpreter::minimal(InterpreterConfig::default());
        assert_eq!(eval_in(&mut interp, "(if #t 'yes 'no)").unwrap(), sym("yes"));
        let err = eval_in(&mut interp, "(car '(1))").unwrap_err();
        assert!(matches!(err, Error::UnboundSymbol(name) if name == "car"));
    }

    #[test]
    fn test_dropping_interpreter_releases_self_referencing_frames() {
        let mut interp = Interpreter::new();
        eval_in(
            &mut interp,
            "(define (make-counter) (let ((n 0)) (define (next) (set! n (+ n 1)) n) next))",
        )
        .unwrap();
        eval_in(&mut interp, "(define c (make-counter))").unwrap();
        assert_eq!(eval_in(&mut interp, "(c)").unwrap(), val(1));

        let global = interp.global().clone();
        let closure = global.lookup(Symbol::new("c")).unwrap();
        let weak = Rc::downgrade(closure.closure_value());
        drop(closure);
        drop(global);
        drop(interp);
        assert!(weak.upgrade().is_none());
    }

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        Failure,                     // Evaluation should fail (any error)
        Anything,                    // Setup step; only success matters
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(val(value))
    }

    /// Macro for setup expressions like define
    macro_rules! test_setup {
        ($expr:expr) => {
            ($expr, Anything)
        };
    }

    /// Run tests in isolated interpreters with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let mut interp = Interpreter::new();
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &mut interp, &test_id);
            }
        }
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(input: &str, expected: &TestResult, interp: &mut Interpreter, test_id: &str) {
        let expr = match parse_scheme(input) {
            Ok(expr) => expr,
            Err(parse_err) => {
                panic!("{test_id}: unexpected parse error for '{input}': {parse_err:?}");
            }
        };
        let global = interp.global().clone();

        match (interp.eval(&expr, &global), expected) {
            (Ok(_), Anything) => {}
            (Ok(actual), EvalResult(expected_val)) => {
                assert_eq!(&actual, expected_val, "{test_id}: '{input}'");
            }
            (Err(_), Failure) => {}
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), Failure) => {
                panic!("{test_id}: expected error for '{input}', got {actual:?}");
            }
            (Ok(actual), SpecificError(expected_text)) => {
                panic!("{test_id}: expected error containing '{expected_text}', got {actual:?}");
            }
            (Err(err), EvalResult(expected_val)) => {
                panic!("{test_id}: expected {expected_val:?} for '{input}', got error {err:?}");
            }
            (Err(err), Anything) => {
                panic!("{test_id}: setup '{input}' failed: {err:?}");
            }
        }
    }

    /// Each case in a fresh interpreter
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let mut interp = Interpreter::new();
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &mut interp, &test_id);
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_special_forms_data_driven() {
        let test_cases = vec![
            // === SELF-EVALUATING FORMS ===
            ("42", success(42)),
            ("-271", success(-271)),
            ("2.5", success(2.5)),
            ("#t", success(true)),
            ("#f", success(false)),
            ("\"hello\"", success("hello")),
            ("\"with\\\"quotes\"", success("with\"quotes")),
            ("()", success(nil())), // Nil evaluates to itself
            ("#(1 2)", EvalResult(Value::vector(vec![val(1), val(2)]))),
            // === QUOTE ===
            ("(quote hello)", success(sym("hello"))),
            ("(quote (1 2 3))", success([1, 2, 3])),
            ("'(+ 1 2)", success([sym("+"), val(1), val(2)])),
            ("'()", success(nil())),
            ("''x", success([sym("quote"), sym("x")])),
            ("'(a . b)", EvalResult(Value::cons(sym("a"), sym("b")))),
            ("(quote)", SpecificError("quote expected 1 arguments, got 0")),
            ("(quote a b)", Failure),
            // === IF: truthiness is "not #f" ===
            ("(if #t 1 2)", success(1)),
            ("(if #f 1 2)", success(2)),
            ("(if 0 'yes 'no)", success(sym("yes"))),
            ("(if '() 'yes 'no)", success(sym("yes"))),
            ("(if \"\" 'yes 'no)", success(sym("yes"))),
            ("(if #f 1)", success(nil())),
            ("(if (> 5 3) \"greater\" \"lesser\")", success("greater")),
            // Only the chosen branch runs
            ("(if #t 1 undefined-var)", success(1)),
            ("(if #f undefined-var 2)", success(2)),
            // A third branch is an arity failure
            ("(if #t 1 2 3)", SpecificError("if expected 2 or 3 arguments, got 4")),
            ("(if #t)", Failure),
            // === COND ===
            ("(cond (#f 1) (#t 2))", success(2)),
            ("(cond ((= 1 2) 'a) ((= 1 1) 'b) (else 'c))", success(sym("b"))),
            ("(cond (#f 1) (else 'fallback))", success(sym("fallback"))),
            ("(cond (#f 1))", success(nil())),
            ("(cond (5))", success(5)), // Test value when the clause has no body
            ("(cond ((+ 1 1) 'a 'b))", success(sym("b"))),
            ("(cond 5)", Failure),
            // === AND / OR return the deciding value ===
            ("(and)", success(true)),
            ("(and 1 2 3)", success(3)),
            ("(and 1 #f 3)", success(false)),
            ("(and #f undefined-var)", success(false)),
            ("(or)", success(false)),
            ("(or #f 2 3)", success(2)),
            ("(or #f #f)", success(false)),
            ("(or '() #f)", success(nil())),
            ("(or 1 undefined-var)", success(1)),
            // === BEGIN ===
            ("(begin)", success(nil())),
            ("(begin 1 2 3)", success(3)),
            // === LAMBDA ===
            ("((lambda (x) (* x x)) 4)", success(16)),
            ("((lambda () 42))", success(42)),
            ("((lambda (a b . rest) rest) 1 2 3 4)", success([3, 4])),
            ("((lambda (a b . rest) rest) 1 2)", success(nil())),
            ("((lambda args args) 1 2 3)", success([1, 2, 3])),
            ("((lambda (x) 1 2 x) 9)", success(9)),
            ("((lambda (a b . rest) a) 1)", SpecificError("expected at least 2 arguments, got 1")),
            ("((lambda (x) x))", SpecificError("expected 1 arguments, got 0")),
            ("(lambda (x x) x)", SpecificError("Duplicate parameter name: x")),
            ("(lambda (a . a) a)", Failure),
            ("(lambda (1 2) 3)", Failure),
            ("(lambda \"params\" 42)", Failure),
            ("(lambda (x))", Failure),
            // === LET ===
            ("(let ((x 1) (y 2)) (+ x y))", success(3)),
            ("(let () 5)", success(5)),
            ("(let ((x 1)) (let ((x 2)) x))", success(2)),
            ("(let ((x)) x)", success(nil())),
            ("(let ((x 1 2)) x)", Failure),
            ("(let (5) 1)", Failure),
            ("(let x 1)", Failure),
            // === OPERATOR POSITION ===
            ("((if #t + *) 2 3)", success(5)),
            ("((if #f + *) 2 3)", success(6)),
            ("(5 1 2)", SpecificError("not a function: 5")),
            ("(\"f\")", Failure),
            ("(+ 1 . 2)", SpecificError("Improper argument list")),
            // === ERRORS ===
            ("undefined-var", SpecificError("Unbound symbol: undefined-var")),
            ("(set! undefined-var 1)", SpecificError("Unbound symbol: undefined-var")),
            ("(set! 5 1)", Failure),
            ("(define 123 42)", Failure),
            ("(define \"x\" 42)", Failure),
            ("(define x 1 2)", Failure),
            ("(define (f x))", Failure),
        ];

        run_comprehensive_tests(test_cases);

        let environment_test_cases = vec![
            // === DEFINE AND LOOKUP ===
            TestEnvironment(vec![
                ("(define x 42)", success(sym("x"))),
                ("x", success(42)),
                ("y", Failure),
                test_setup!("(define x 100)"),
                ("x", success(100)),
                test_setup!("(define unset)"),
                ("unset", success(nil())),
            ]),
            // === DEFINE SHORTHAND AND NAMING ===
            TestEnvironment(vec![
                test_setup!("(define (square x) (* x x))"),
                ("(square 5)", success(25)),
                test_setup!("(define (variadic first . rest) (list first rest))"),
                ("(variadic 1 2 3)", EvalResult(val(vec![val(1), val([2, 3])]))),
                test_setup!("(define anon (lambda (x) x))"),
                test_setup!("(define alias square)"),
                ("(square 1 2)", SpecificError("square expected 1 arguments, got 2")),
                ("(alias 1 2)", SpecificError("square expected 1 arguments, got 2")),
                ("(anon)", SpecificError("anon expected 1 arguments")),
            ]),
            // === SET! NEVER CREATES A BINDING ===
            TestEnvironment(vec![
                test_setup!("(define x 1)"),
                ("(set! x 5)", success(5)),
                ("x", success(5)),
                test_setup!("(define (shadow x) (set! x 10) x)"),
                ("(shadow 1)", success(10)),
                ("x", success(5)),
                test_setup!("(define (outer-set) (set! x 7))"),
                test_setup!("(outer-set)"),
                ("x", success(7)),
                ("(set! fresh 1)", SpecificError("Unbound symbol: fresh")),
                ("fresh", Failure),
            ]),
            // === SHADOWING ===
            TestEnvironment(vec![
                test_setup!("(define x 1)"),
                test_setup!("(define f (lambda (x) (+ x 10)))"),
                ("(f 5)", success(15)),
                ("x", success(1)),
                ("(let ((x 'inner)) x)", success(sym("inner"))),
                ("x", success(1)),
            ]),
            // === LET INITS SEE THE OUTER FRAME ===
            TestEnvironment(vec![
                test_setup!("(define x 1)"),
                ("(let ((x 2) (y x)) y)", success(1)),
                ("(let ((x 2)) (set! x 3) x)", success(3)),
                ("x", success(1)),
            ]),
            // === SHARED UPVALUES ===
            TestEnvironment(vec![
                test_setup!(
                    "(define (make-account balance)
                       (list (lambda (n) (set! balance (+ balance n)) balance)
                             (lambda () balance)))"
                ),
                test_setup!("(define acct (make-account 100))"),
                test_setup!("(define deposit (car acct))"),
                test_setup!("(define peek (car (cdr acct)))"),
                ("(peek)", success(100)),
                ("(deposit 25)", success(125)),
                ("(peek)", success(125)),
                // A second account has its own frame
                test_setup!("(define other (make-account 1))"),
                ("((car (cdr other)))", success(1)),
                ("(peek)", success(125)),
            ]),
            // === CLOSURES SEE LATER ASSIGNMENTS TO CAPTURED FRAMES ===
            TestEnvironment(vec![
                test_setup!("(define y 100)"),
                test_setup!("(define g (lambda () y))"),
                test_setup!("(define y 200)"),
                ("(g)", success(200)),
            ]),
            // === RECURSION ===
            TestEnvironment(vec![
                test_setup!("(define (factorial n) (if (= n 0) 1 (* n (factorial (- n 1)))))"),
                ("(factorial 10)", success(3628800)),
                test_setup!("(define (is-even n) (if (= n 0) #t (is-odd (- n 1))))"),
                test_setup!("(define (is-odd n) (if (= n 0) #f (is-even (- n 1))))"),
                ("(is-even 10)", success(true)),
                ("(is-odd 7)", success(true)),
                test_setup!(
                    "(define (countdown n) (if (<= n 0) (list) (cons n (countdown (- n 1)))))"
                ),
                ("(countdown 3)", success([3, 2, 1])),
            ]),
            // === HIGHER ORDER ===
            TestEnvironment(vec![
                test_setup!("(define twice (lambda (f x) (f (f x))))"),
                test_setup!("(define inc (lambda (x) (+ x 1)))"),
                ("(twice inc 5)", success(7)),
                test_setup!("(define my-add +)"),
                ("(my-add 10 20)", success(30)),
                ("(((lambda (x) (lambda (y) (+ x y))) 10) 5)", success(15)),
            ]),
        ];

        run_tests_in_environment(environment_test_cases);
    }

    #[test]
    fn test_evaluation_depth_limit() {
        let depth_test_environments = vec![TestEnvironment(vec![
            test_setup!("(define (make-deep depth) (if (= depth 0) 42 (+ 1 (make-deep (- depth 1)))))"),
            ("(make-deep 10)", success(52)),
            ("(make-deep 1000)", SpecificError("depth limit exceeded")),
            // The interpreter is usable afterwards
            ("(make-deep 5)", success(47)),
        ])];

        run_tests_in_environment(depth_test_environments);

        let mut shallow = Interpreter::with_config(InterpreterConfig {
            max_eval_depth: 4,
            ..InterpreterConfig::default()
        });
        let err = eval_in(&mut shallow, "(+ 1 (+ 1 (+ 1 (+ 1 (+ 1 1)))))").unwrap_err();
        assert!(err.to_string().contains("max: 4"), "{err}");
        assert_eq!(shallow.depth(), 0);
    }
}
