use rcscheme::reader::parse_program;
use rcscheme::value::Function;
use rcscheme::{Environment, Error, Interpreter, ParseError, ParseErrorKind, Value, eval};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::env;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=rcscheme=debug shows define and top-level evaluation events
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = panic::catch_unwind(|| match env::args().nth(1) {
        Some(path) => run_file(&path),
        None => run_repl(),
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

/// Evaluate a source file and print one result per top-level form
fn run_file(path: &str) {
    let interp = Interpreter::new();
    match interp.eval_file(path) {
        Value::Error(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
        results => println!("{}", Interpreter::render_results(&results)),
    }
}

fn run_repl() {
    println!("rcscheme - a small Scheme");
    println!("Enter S-expressions like: (define (sq x) (* x x))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let interp = Interpreter::new();

    // Register custom function that can be called from user code for demonstration purposes
    interp.env().register_builtin("help", |_args| {
        print_help();
        Ok(Value::Void)
    });

    // Lines of a form that is still open
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "rcscheme> " } else { "...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() && pending.is_empty() {
                    continue;
                }

                // Handle special commands
                if pending.is_empty() {
                    match line {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interp.env());
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(line);
                pending.push('\n');

                let forms = match parse_program(&pending) {
                    Ok(forms) => forms,
                    // Keep reading until the open form is closed
                    Err(Error::Parse(ParseError {
                        kind: ParseErrorKind::Incomplete,
                        ..
                    })) => continue,
                    Err(e) => {
                        println!("Error: {e}");
                        pending.clear();
                        continue;
                    }
                };

                let _ = rl.add_history_entry(pending.trim());
                pending.clear();

                for form in forms {
                    match eval(interp.env(), form) {
                        // Don't print void values (e.g., from define)
                        Value::Void => {}
                        Value::Error(e) => println!("Error: {e}"),
                        result => println!("{result}"),
                    }
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
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

fn print_help() {
    println!("rcscheme:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  (define name expr)  (define (name params...) body...)");
    println!("  (lambda (params...) body...)");
    println!("  (if test then [else])  (cond (test expr...)... (else expr...))");
    println!("  (and expr...)  (or expr...)");
    println!();
    println!("Values:");
    println!("  Numbers: 42, -5, 2.5, 1e3");
    println!("  Booleans: #t #f (only #f is false)");
    println!("  Lists: built with cons and list, printed in dotted notation");
    println!();
    println!("Examples:");
    println!("  (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))");
    println!("  (fact 10)");
    println!("  ((lambda (x y) (+ x y)) 1 2)");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Function(Function::Builtin { .. }) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    // Print built-in functions
    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
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

    // Print user-defined values
    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
