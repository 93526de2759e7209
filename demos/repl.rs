use emblisp::ast::Value;
use emblisp::scheme::parse_scheme_all;
use emblisp::{Environment, Error, Interpreter, InterpreterConfig, ParseErrorKind};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("emblisp: an embeddable Lisp");
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Errors open the debugger (D> prompt, :? for its commands).");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize line editor: {e}");
            return;
        }
    };
    let mut interp = Interpreter::with_config(InterpreterConfig {
        interactive: true,
        ..InterpreterConfig::default()
    });

    // Callable from scripts as (help)
    interp.register_builtin_operation::<_, ()>("help", print_help);

    // Lines accumulate until they form complete expressions
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "lisp> " } else { "  ... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    // Handle special commands
                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interp.global());
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');

                let forms = match parse_scheme_all(&pending) {
                    Ok(forms) => forms,
                    Err(Error::ParseError(e)) if e.kind == ParseErrorKind::Incomplete => continue,
                    Err(e) => {
                        println!("Error: {e}");
                        pending.clear();
                        continue;
                    }
                };

                let _ = rl.add_history_entry(pending.trim_end());
                pending.clear();

                let global = interp.global().clone();
                for form in &forms {
                    match interp.eval(form, &global) {
                        Ok(result) => println!("{result}"),
                        Err(e) => {
                            println!("Error: {e}");
                            break;
                        }
                    }
                }
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() -> Value {
    println!("emblisp REPL:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Discard a pending multi-line input, or exit");
    println!();
    println!("Debugging:");
    println!("  (debug)              - Pause here and open the debugger");
    println!("  (debug-on-error #f)  - Report errors instead of pausing");
    println!("  (debug-trace #t)     - Print every evaluation and its result");
    println!("  In the debugger, :? lists commands; :r expr resumes with a value");
    println!();
    println!("Examples:");
    println!("  (define (square x) (* x x))");
    println!("  (vector-map square #(1 2 3))");
    println!("  (sort '(3 1 2) <)");
    println!("  (def-field mode uint8 (values 1 2 4))");
    println!();

    Value::Nil
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate primitives from script-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Primitive(_) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Primitives ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<22}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
