//! Cooperative debug controller: pause, inspect, resume.
//!
//! Evaluation pauses on three triggers: a failure routed through
//! [`Interpreter::signal_error`] while break-on-error is on, an explicit
//! `(debug)` call, and the single-step / step-out flags checked at every
//! evaluation entry. A pause runs a blocking command loop on the native stack of
//! the paused evaluation, reading lines from a [`LineSource`]. From there the user
//! can inspect frames, evaluate expressions in the paused frame, and resume,
//! optionally substituting a value for the expression that paused.
//!
//! ```text
//! D> :b              frame headers, innermost first
//! D> (* x 2)         evaluate in the paused frame
//! ==> 10
//! D> :r 42           resume; the paused expression yields 42
//! ```

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::Error;
use crate::ast::Value;
use crate::builtinops::Arity;
use crate::evaluator::{Environment, Interpreter, InterpreterConfig};

/// Blocking source of command lines for the debugger
pub trait LineSource {
    /// Show `prompt` and read one line without its terminator; `None` at end of input
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Reads from the process's standard input, prompting on standard output
#[derive(Debug, Default)]
pub struct StdinLineSource;

impl LineSource for StdinLineSource {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let mut stdout = io::stdout();
        if let Err(error) = write!(stdout, "{prompt}").and_then(|()| stdout.flush()) {
            warn!(%error, "could not write debugger prompt");
        }

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_owned()),
        }
    }
}

/// Pre-recorded input, one line per read
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedInput {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

/// One parsed line of debugger input
#[derive(Debug, Clone, PartialEq)]
pub enum DebugCommand {
    Help,
    Backtrace,
    Continue,
    Dump,
    BreakOnError(bool),
    Frame(usize),
    Quit,
    /// Evaluate the expression and resume with its value
    Return(String),
    Step,
    Trace(bool),
    StepOut,
    /// A line without the command prefix
    Eval(String),
}

impl DebugCommand {
    /// Parse a non-empty line; the error is the message shown to the user
    pub fn parse(line: &str, prefix: char) -> Result<DebugCommand, String> {
        let line = line.trim();
        let Some(command) = line.strip_prefix(prefix) else {
            return Ok(DebugCommand::Eval(line.to_owned()));
        };

        let mut chars = command.chars();
        let name = chars.next();
        let argument = chars.as_str().trim();

        let on_off = || match argument {
            "" => Err("Missing on/off.".to_owned()),
            "on" => Ok(true),
            "off" => Ok(false),
            _ => Err("on/off expected.".to_owned()),
        };

        match name {
            Some('?') => Ok(DebugCommand::Help),
            Some('b') => Ok(DebugCommand::Backtrace),
            Some('c') => Ok(DebugCommand::Continue),
            Some('d') => Ok(DebugCommand::Dump),
            Some('e') => on_off().map(DebugCommand::BreakOnError),
            Some('f') => match argument {
                "" => Err("Missing frame number.".to_owned()),
                n => n
                    .parse()
                    .map(DebugCommand::Frame)
                    .map_err(|_| format!("Bad frame number: '{n}'.")),
            },
            Some('q') => Ok(DebugCommand::Quit),
            Some('r') => match argument {
                "" => Err("Missing return expression.".to_owned()),
                expr => Ok(DebugCommand::Return(expr.to_owned())),
            },
            Some('s') => Ok(DebugCommand::Step),
            Some('t') => on_off().map(DebugCommand::Trace),
            Some('u') => Ok(DebugCommand::StepOut),
            _ => Err(format!(
                "Unknown command: '{line}'. Type '{prefix}?' for help."
            )),
        }
    }
}

/// Per-interpreter debugger state.
///
/// The evaluator reads the flags at every evaluation entry and on every failure.
pub struct DebugController {
    pub(crate) trace: bool,
    pub(crate) break_on_error: bool,
    pub(crate) interactive: bool,
    pub(crate) single_step: bool,
    /// Set while the command loop evaluates user input
    pub(crate) eval_in_debug_repl: bool,
    /// Frame that was paused when step-out was requested
    pub(crate) current_frame: Option<Environment>,
    pub(crate) paused: Option<Environment>,
    /// Value installed by `:r`, consumed by whoever paused
    pub(crate) return_value: Option<Value>,
    /// A failure the user let propagate; not offered again until the next top-level eval
    pub(crate) unwinding: bool,
    command_prefix: char,
    input: Box<dyn LineSource>,
    output: Box<dyn Write>,
    quit_handler: Box<dyn FnMut()>,
}

impl DebugController {
    pub fn new(config: &InterpreterConfig) -> Self {
        DebugController {
            trace: config.trace,
            break_on_error: config.break_on_error,
            interactive: config.interactive,
            single_step: false,
            eval_in_debug_repl: false,
            current_frame: None,
            paused: None,
            return_value: None,
            unwinding: false,
            command_prefix: config.command_prefix,
            input: Box::new(StdinLineSource),
            output: Box::new(io::stdout()),
            quit_handler: Box::new(|| std::process::exit(0)),
        }
    }

    pub fn trace(&self) -> bool {
        self.trace
    }

    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
    }

    pub fn break_on_error(&self) -> bool {
        self.break_on_error
    }

    pub fn set_break_on_error(&mut self, on: bool) {
        self.break_on_error = on;
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_interactive(&mut self, on: bool) {
        self.interactive = on;
    }

    /// Pause before the next evaluation
    pub fn set_single_step(&mut self, on: bool) {
        self.single_step = on;
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    pub fn set_input(&mut self, input: impl LineSource + 'static) {
        self.input = Box::new(input);
    }

    pub fn set_output(&mut self, output: impl Write + 'static) {
        self.output = Box::new(output);
    }

    /// Replace what `:q` does; the default exits the process. If the handler
    /// returns, the command loop resumes as if `:c` had been given.
    pub fn set_quit_handler(&mut self, handler: impl FnMut() + 'static) {
        self.quit_handler = Box::new(handler);
    }

    pub(crate) fn should_break(&self) -> bool {
        self.break_on_error
            && self.interactive
            && !self.eval_in_debug_repl
            && !self.unwinding
            && self.paused.is_none()
    }

    /// Drop a requested single step or step-out
    fn clear_pending_steps(&mut self) {
        self.single_step = false;
        self.current_frame = None;
    }

    /// Output failures are logged; the paused evaluation carries on regardless
    pub(crate) fn write_line(&mut self, line: &str) {
        if let Err(error) = writeln!(self.output, "{line}") {
            warn!(%error, "could not write debugger output");
        }
    }

    fn write_text(&mut self, text: &str) {
        if let Err(error) = write!(self.output, "{text}").and_then(|()| self.output.flush()) {
            warn!(%error, "could not write debugger output");
        }
    }

    fn help_text(&self) -> String {
        let p = self.command_prefix;
        format!(
            "Debugger commands:\n\
             {p}?        this help\n\
             {p}b        show frame headers\n\
             {p}c        continue\n\
             {p}d        dump every frame\n\
             {p}e on|off break on error\n\
             {p}f n      dump frame n\n\
             {p}q        quit\n\
             {p}r expr   return the value of expr from the paused expression\n\
             {p}s        single step\n\
             {p}t on|off trace evaluation\n\
             {p}u        step out to the enclosing frame\n\
             anything else is evaluated in the paused frame\n"
        )
    }
}

impl std::fmt::Debug for DebugController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugController")
            .field("trace", &self.trace)
            .field("break_on_error", &self.break_on_error)
            .field("interactive", &self.interactive)
            .field("single_step", &self.single_step)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

#[derive(PartialEq)]
enum Flow {
    Stay,
    Resume,
}

/// Run the command loop paused in `env` until the user resumes.
///
/// A value installed with `:r` is left in the controller for the caller that
/// paused to collect.
pub fn debug_repl(interp: &mut Interpreter, env: &Environment) {
    if interp.debugger().is_paused() {
        interp.debugger_mut().write_line("Debugger already active.");
        return;
    }

    debug!(frame = env.label(), "entering debugger");
    let dbg = interp.debugger_mut();
    dbg.paused = Some(env.clone());
    dbg.return_value = None;
    let prefix = dbg.command_prefix;
    dbg.write_line(&format!(
        "Debugger: {}    (type {prefix}? for help)",
        env.dump_header()
    ));

    // End of input behaves like continue
    while let Some(line) = interp.debugger_mut().input.read_line("D> ") {
        if line.trim().is_empty() {
            continue;
        }
        match DebugCommand::parse(&line, prefix) {
            Ok(command) => {
                if run_command(interp, env, command) == Flow::Resume {
                    break;
                }
            }
            Err(message) => interp.debugger_mut().write_line(&message),
        }
    }

    interp.debugger_mut().paused = None;
    debug!(frame = env.label(), "leaving debugger");
}

fn run_command(interp: &mut Interpreter, env: &Environment, command: DebugCommand) -> Flow {
    match command {
        DebugCommand::Help => {
            let help = interp.debugger().help_text();
            interp.debugger_mut().write_text(&help);
        }
        DebugCommand::Backtrace => interp.debugger_mut().write_text(&env.dump_headers()),
        DebugCommand::Dump => interp.debugger_mut().write_text(&env.dump()),
        DebugCommand::Frame(n) => interp
            .debugger_mut()
            .write_text(&env.dump_single_frame(n)),
        DebugCommand::Continue => {
            interp.debugger_mut().clear_pending_steps();
            return Flow::Resume;
        }
        DebugCommand::BreakOnError(on) => {
            let dbg = interp.debugger_mut();
            dbg.break_on_error = on;
            dbg.write_line(&format!("Break on error {}.", if on { "on" } else { "off" }));
        }
        DebugCommand::Trace(on) => {
            let dbg = interp.debugger_mut();
            dbg.trace = on;
            dbg.write_line(&format!("Trace {}.", if on { "on" } else { "off" }));
        }
        DebugCommand::Quit => {
            (interp.debugger_mut().quit_handler)();
            return Flow::Resume;
        }
        DebugCommand::Return(source) => match eval_while_paused(interp, env, &source) {
            Ok(value) => {
                let dbg = interp.debugger_mut();
                dbg.clear_pending_steps();
                dbg.return_value = Some(value);
                return Flow::Resume;
            }
            Err(err) => interp
                .debugger_mut()
                .write_line(&format!("Error in evaluation: {err}")),
        },
        DebugCommand::Step => {
            interp.debugger_mut().single_step = true;
            return Flow::Resume;
        }
        DebugCommand::StepOut => {
            if env.parent().is_none() {
                interp.debugger_mut().write_line("Already at top frame.");
            } else {
                interp.debugger_mut().current_frame = Some(env.clone());
                return Flow::Resume;
            }
        }
        DebugCommand::Eval(source) => {
            let message = match eval_while_paused(interp, env, &source) {
                Ok(value) => format!("==> {value}"),
                Err(err) => format!("Error in evaluation: {err}"),
            };
            interp.debugger_mut().write_line(&message);
        }
    }
    Flow::Stay
}

fn eval_while_paused(
    interp: &mut Interpreter,
    env: &Environment,
    source: &str,
) -> Result<Value, Error> {
    let expr = read_expression(source)?;
    let previous = std::mem::replace(&mut interp.debugger_mut().eval_in_debug_repl, true);
    let result = interp.eval(&expr, env);
    interp.debugger_mut().eval_in_debug_repl = previous;
    result
}

#[cfg(feature = "scheme")]
fn read_expression(source: &str) -> Result<Value, Error> {
    Ok(crate::scheme::parse_scheme(source)?)
}

#[cfg(not(feature = "scheme"))]
fn read_expression(_source: &str) -> Result<Value, Error> {
    Err(crate::ParseError::from_message(
        crate::ParseErrorKind::Unavailable,
        "this build has no reader",
    )
    .into())
}

/// Set a flag from an optional argument and report its value
fn toggle(args: &[Value], flag: &mut bool) -> Value {
    if let [value] = args {
        *flag = value.is_truthy();
    }
    Value::Bool(*flag)
}

/// `debug`, `debug-trace`, `debug-on-error` and `dump`
pub(crate) fn register_primitives(interp: &mut Interpreter) {
    interp.register("debug", Arity::Exact(0), |interp, _, env| {
        if !interp.debugger().interactive() {
            warn!(frame = env.label(), "(debug) ignored outside interactive mode");
            return Ok(Value::Nil);
        }
        debug_repl(interp, env);
        Ok(interp.debugger_mut().return_value.take().unwrap_or(Value::Nil))
    });

    interp.register("debug-trace", Arity::OneOf(vec![0, 1]), |interp, args, _| {
        Ok(toggle(&args, &mut interp.debugger_mut().trace))
    });

    interp.register("debug-on-error", Arity::OneOf(vec![0, 1]), |interp, args, _| {
        Ok(toggle(&args, &mut interp.debugger_mut().break_on_error))
    });

    interp.register("dump", Arity::Exact(0), |interp, _, env| {
        interp.debugger_mut().write_text(&env.dump());
        Ok(Value::Nil)
    });
}

#[cfg(test)]
mod command_tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        use DebugCommand::*;

        let cases: Vec<(&str, Result<DebugCommand, &str>)> = vec![
            (":?", Ok(Help)),
            (":b", Ok(Backtrace)),
            (":c", Ok(Continue)),
            ("  :c  ", Ok(Continue)),
            (":d", Ok(Dump)),
            (":e on", Ok(BreakOnError(true))),
            (":e off", Ok(BreakOnError(false))),
            (":e", Err("Missing on/off.")),
            (":e maybe", Err("on/off expected.")),
            (":f 2", Ok(Frame(2))),
            (":f", Err("Missing frame number.")),
            (":f x", Err("Bad frame number: 'x'.")),
            (":f -1", Err("Bad frame number: '-1'.")),
            (":q", Ok(Quit)),
            (":r (+ 1 2)", Ok(Return("(+ 1 2)".to_owned()))),
            (":r", Err("Missing return expression.")),
            (":s", Ok(Step)),
            (":t on", Ok(Trace(true))),
            (":t", Err("Missing on/off.")),
            (":u", Ok(StepOut)),
            ("(car x)", Ok(Eval("(car x)".to_owned()))),
            ("x", Ok(Eval("x".to_owned()))),
        ];

        for (line, expected) in cases {
            let actual = DebugCommand::parse(line, ':');
            match (&actual, &expected) {
                (Ok(a), Ok(e)) => assert_eq!(a, e, "line {line:?}"),
                (Err(a), Err(e)) => assert_eq!(a, e, "line {line:?}"),
                _ => panic!("line {line:?}: got {actual:?}, expected {expected:?}"),
            }
        }

        let unknown = DebugCommand::parse(":z", ':').unwrap_err();
        assert!(unknown.starts_with("Unknown command: ':z'"));
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(DebugCommand::parse(",c", ','), Ok(DebugCommand::Continue));
        assert_eq!(
            DebugCommand::parse(":c", ','),
            Ok(DebugCommand::Eval(":c".to_owned()))
        );
    }

    #[test]
    fn test_scripted_input_runs_dry() {
        let mut input = ScriptedInput::new(["one", "two"]);
        assert_eq!(input.read_line("D> ").as_deref(), Some("one"));
        assert_eq!(input.read_line("D> ").as_deref(), Some("two"));
        assert_eq!(input.read_line("D> "), None);
    }
}
