//! rcscheme - evaluation core of a small Scheme
//!
//! This crate implements the heart of a minimal Scheme interpreter: a tagged value
//! representation, a reference-counted chain of lexical environments shared between
//! closures, and an evaluator for the special forms `define`, `lambda`, `cond`, `if`,
//! `and` and `or` plus ordinary function application.
//!
//! ```scheme
//! (define (fact n acc)            ; procedure definition sugar
//!   (if (= n 0) acc (fact (- n 1) (* n acc))))
//! (fact 20 1)                     ; tail call, runs in constant stack
//! (cond (#f 1) (else 2))          ; => 2
//! (and 1 2 #f 3)                  ; => #f, 3 is never evaluated
//! ```
//!
//! ## Semantics
//!
//! - Only `#f` is false. `0`, `0.0`, the empty list and `void` are all true.
//! - Closures capture their defining scope by reference: later `define`s in that
//!   scope are visible to the closure, parameter bindings are private to each call.
//! - The final expression of a lambda body, a `cond` clause, an `and`/`or` chain
//!   and both branches of `if` are evaluated in tail position by the evaluator's
//!   loop, so tail-recursive programs do not grow the host stack.
//! - Errors are values. A failing sub-evaluation stops its siblings and is handed
//!   back to the caller as [`Value::Error`](value::Value::Error).
//!
//! ## Modules
//!
//! - `value`: the value model and its canonical rendering
//! - `env`: reference-counted lexical environments
//! - `list`: pair/list protocol
//! - `special_form`: special-form recognition and handlers
//! - `evaluator`: `eval`, `apply` and the tail-call loop
//! - `builtins`: native function registry
//! - `reader`: S-expression reader (feature `reader`)
//! - `interpreter`: whole-program driver (feature `reader`)

use std::fmt;

use crate::value::ValueType;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum depth of nested non-tail evaluations.
/// Tail calls do not count against this limit. The native stack grows on demand
/// up to this depth.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
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

    /// Create a ParseError with context extracted from input at a given offset
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
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParseError: {}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Number of arguments accepted by a special form or builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    /// Validate an argument count against this arity
    pub fn validate(self, name: &str, got: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => (min..=max).contains(&got),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity(name, self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Error taxonomy of the interpreter.
///
/// Errors travel through the evaluator as `Result::Err` and are surfaced to the
/// driver as [`Value::Error`](value::Value::Error); the rendering of an error value
/// is exactly the `Display` text below.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{expected} expected. Got {found} (actual type={actual})")]
    Type {
        expected: ValueType,
        found: String,
        actual: ValueType,
    },
    #[error("ArityError: {name} expected {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: Arity,
        got: usize,
    },
    /// Malformed special-form syntax (bad clause, misplaced else, bad define head)
    #[error("{0}")]
    Structure(String),
    #[error("unrecognized special form: \"{0}\"")]
    UnrecognizedSpecialForm(String),
    #[error("Unbound variable: {0}")]
    Unbound(String),
    #[error("Cannot apply non-function: {0}")]
    NotCallable(String),
    #[error("Evaluation depth limit exceeded (max: {})", MAX_EVAL_DEPTH)]
    DepthExceeded,
    /// Failure raised by a builtin (overflow, division by zero, user `error`)
    #[error("{0}")]
    Eval(String),
    #[error("{0}")]
    Parse(ParseError),
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    pub fn arity(name: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::Arity {
            name: name.into(),
            expected,
            got,
        }
    }

    /// The uniform "expected type X, got type Y" error
    pub fn type_error(expected: ValueType, found: &value::Value) -> Self {
        Error::Type {
            expected,
            found: found.to_string(),
            actual: found.value_type(),
        }
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Error::Structure(message.into())
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

pub mod builtins;
pub mod env;
pub mod evaluator;
pub mod list;
pub mod special_form;
pub mod value;

#[cfg(feature = "reader")]
pub mod interpreter;

#[cfg(feature = "reader")]
pub mod reader;

pub use env::Environment;
pub use evaluator::{create_global_env, eval};
pub use value::Value;

#[cfg(feature = "reader")]
pub use interpreter::Interpreter;
