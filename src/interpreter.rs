//! Whole-program driver.
//!
//! An [`Interpreter`] owns a global environment populated with the builtins and
//! evaluates source text against it, one top-level form at a time.
//!
//! ```
//! use rcscheme::{Interpreter, Value};
//!
//! let interp = Interpreter::new();
//! interp.eval_str("(define (square x) (* x x))");
//! assert_eq!(interp.eval_str("(square 12)"), Value::Integer(144));
//! ```
//!
//! ## Releasing memory
//!
//! A function defined at top level is stored in the global scope and captures a
//! child of that same scope, which forms a reference cycle. Dropping the
//! interpreter clears the global bindings, which breaks every such cycle. Handles
//! obtained through [`Interpreter::env`] see an empty scope afterwards.

use std::fs;
use std::path::Path;

use crate::env::Environment;
use crate::evaluator::{create_global_env, eval};
use crate::reader::parse_program;
use crate::value::Value;
use crate::{Error, list};

pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            env: create_global_env(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Evaluate every top-level form and return the last result.
    ///
    /// Evaluation stops at the first form producing an error, which is returned.
    /// An empty program evaluates to `void`.
    pub fn eval_str(&self, source: &str) -> Value {
        let forms = match parse_program(source) {
            Ok(forms) => forms,
            Err(err) => return Value::Error(err),
        };

        let mut last = Value::Void;
        for (index, form) in forms.into_iter().enumerate() {
            tracing::debug!(index, "evaluating top-level form");
            last = eval(&self.env, form);
            if last.is_error() {
                tracing::debug!(index, error = %last, "top-level form failed");
                break;
            }
        }
        last
    }

    /// Evaluate every top-level form and return all results as a proper list.
    ///
    /// An error in one form is recorded in its slot and evaluation carries on
    /// with the next. A parse error yields a single error value.
    pub fn eval_all(&self, source: &str) -> Value {
        match parse_program(source) {
            Ok(forms) => forms
                .into_iter()
                .enumerate()
                .map(|(index, form)| {
                    tracing::debug!(index, "evaluating top-level form");
                    eval(&self.env, form)
                })
                .collect(),
            Err(err) => Value::Error(err),
        }
    }

    /// Read a source file and evaluate it with [`eval_all`](Self::eval_all)
    pub fn eval_file(&self, path: impl AsRef<Path>) -> Value {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading source file");
        match fs::read_to_string(path) {
            Ok(source) => self.eval_all(&source),
            Err(err) => Value::Error(Error::Io(format!("{}: {err}", path.display()))),
        }
    }

    /// Render each element of a result list on its own line
    pub fn render_results(results: &Value) -> String {
        list::iter(results)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.env.clear();
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::value::val;

    #[test]
    fn test_eval_str_returns_last_result() {
        let interp = Interpreter::new();
        assert_eq!(interp.eval_str("(define x 2) (define y 3) (* x y)"), val(6));
        assert_eq!(interp.eval_str(""), Value::Void);
        assert_eq!(interp.eval_str("(define z 1)"), Value::Void);
    }

    #[test]
    fn test_eval_str_stops_at_first_error() {
        let interp = Interpreter::new();
        let result = interp.eval_str("(define a 1) (car a) (define b 2)");
        assert_eq!(result.to_string(), "Cons expected. Got 1 (actual type=Integer)");
        assert!(interp.env().lookup("b").is_err());
    }

    #[test]
    fn test_eval_all_collects_every_result() {
        let interp = Interpreter::new();
        let results = interp.eval_all("(define a 1) (car a) (+ a 1)");
        let results = list::to_vec(results);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Value::Void);
        assert!(results[1].is_error());
        assert_eq!(results[2], val(2));
    }

    #[test]
    fn test_parse_errors_are_values() {
        let interp = Interpreter::new();
        let result = interp.eval_str("(+ 1");
        assert!(matches!(result, Value::Error(Error::Parse(_))));
        assert!(interp.eval_all("(+ 1").is_error());
    }

    #[test]
    fn test_missing_file() {
        let interp = Interpreter::new();
        let result = interp.eval_file("/nonexistent/program.scm");
        assert!(matches!(result, Value::Error(Error::Io(_))));
    }

    #[test]
    fn test_drop_releases_global_scope() {
        let interp = Interpreter::new();
        interp.eval_str("(define (loop n) (if (= n 0) 0 (loop (- n 1))))");
        interp.eval_str("(define make-adder (lambda (n) (lambda (x) (+ x n))))");
        interp.eval_str("(define add1 (make-adder 1))");
        assert_eq!(interp.eval_str("(add1 (loop 10))"), val(1));

        let weak = interp.env().downgrade();
        drop(interp);
        assert!(weak.is_released());
    }

    #[test]
    fn test_render_results() {
        let interp = Interpreter::new();
        let results = interp.eval_all("1 2.5 #t (car 1)");
        assert_eq!(
            Interpreter::render_results(&results),
            "1\n2.5\n#t\nCons expected. Got 1 (actual type=Integer)"
        );
        let single = interp.eval_all("(list 1 2)");
        assert_eq!(
            Interpreter::render_results(&single),
            "(1 . (2 . nil))"
        );
        assert!(list::is_list(&single));
        assert_eq!(list::length(&single), 1);
        assert!(interp.env().lookup("car").unwrap().is_builtin());
    }
}
