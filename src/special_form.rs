//! Special forms: `define`, `lambda`, `cond`, `if`, `and`, `or`.
//!
//! A special form receives its argument list unevaluated and decides itself what
//! to evaluate. Expressions in tail position are handed back to the evaluator as
//! [`Step::Tail`] instead of being evaluated here.

use std::str::FromStr;

use crate::env::Environment;
use crate::evaluator::{Step, eval_all_but_one_with_depth_tracking, eval_with_depth_tracking};
use crate::list;
use crate::value::{Cons, SpecialForm, Value, ValueType};
use crate::{Arity, Error};

impl SpecialForm {
    pub const ALL: [SpecialForm; 6] = [
        SpecialForm::Define,
        SpecialForm::Lambda,
        SpecialForm::Cond,
        SpecialForm::If,
        SpecialForm::And,
        SpecialForm::Or,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Cond => "cond",
            SpecialForm::If => "if",
            SpecialForm::And => "and",
            SpecialForm::Or => "or",
        }
    }
}

impl FromStr for SpecialForm {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Error> {
        SpecialForm::ALL
            .into_iter()
            .find(|form| form.keyword() == token)
            .ok_or_else(|| Error::UnrecognizedSpecialForm(token.to_owned()))
    }
}

/// True iff `token` is one of the special-form keywords
pub fn is_special_form(token: &str) -> bool {
    token.parse::<SpecialForm>().is_ok()
}

/// The special-form value for `token`, or an error value for any other token
pub fn from_string(token: &str) -> Value {
    token
        .parse::<SpecialForm>()
        .map(Value::SpecialForm)
        .into()
}

/// Apply a special form to its unevaluated argument list
pub(crate) fn apply(
    form: SpecialForm,
    env: &Environment,
    args: Value,
    depth: usize,
) -> Result<Step, Error> {
    match form {
        SpecialForm::Define => eval_define(env, args, depth),
        SpecialForm::Lambda => eval_lambda(env, args).map(Step::Done),
        SpecialForm::Cond => eval_cond(env, args, depth),
        SpecialForm::If => eval_if(env, args, depth),
        SpecialForm::And => eval_and(env, args, depth),
        SpecialForm::Or => eval_or(env, args, depth),
    }
}

/// `(define name expr)` or `(define (name param...) body...)`
fn eval_define(env: &Environment, args: Value, depth: usize) -> Result<Step, Error> {
    let len = list::length(&args);
    if len < 2 {
        return Err(Error::arity("define", Arity::AtLeast(2), len));
    }
    let Some((head, rest)) = list::uncons(args) else {
        return Err(Error::arity("define", Arity::AtLeast(2), len));
    };

    match head {
        Value::Symbol(name) => {
            if len != 2 {
                return Err(Error::arity("define", Arity::Exact(2), len));
            }
            let Some((expr, _)) = list::uncons(rest) else {
                return Err(Error::arity("define", Arity::Exact(2), len));
            };
            let value = eval_with_depth_tracking(env, expr, depth + 1)?;
            tracing::debug!(name = %name, "define");
            env.define(name, value);
            Ok(Step::Done(Value::Void))
        }
        Value::Pair(cell) => {
            let (name, params) = Cons::into_parts(cell);
            let name = match name {
                Value::Symbol(name) => name,
                other => return Err(Error::type_error(ValueType::Symbol, &other)),
            };
            // (define (f . params) . body) is (define f (lambda params . body))
            let closure = eval_lambda(env, Value::cons(params, rest))?;
            tracing::debug!(name = %name, "define procedure");
            env.define(name, closure);
            Ok(Step::Done(Value::Void))
        }
        other => Err(Error::structure(format!(
            "expected list or symbol (define), got: {other}"
        ))),
    }
}

/// `(lambda (param...) body...)`
fn eval_lambda(env: &Environment, args: Value) -> Result<Value, Error> {
    let len = list::length(&args);
    if len < 2 || !list::is_list(&args) {
        return Err(Error::arity("lambda", Arity::AtLeast(2), len));
    }
    let Some((params, body)) = list::uncons(args) else {
        return Err(Error::arity("lambda", Arity::AtLeast(2), len));
    };

    if !list::is_list(&params) {
        return Err(Error::type_error(ValueType::Cons, &params));
    }
    if !list::is_all(&params, Value::is_symbol) {
        return Err(match list::iter(&params).find(|param| !param.is_symbol()) {
            Some(param) => Error::type_error(ValueType::Symbol, param),
            None => Error::structure("expected all parameters to be symbols (lambda)"),
        });
    }

    Ok(Value::closure(params, body, env))
}

/// `(cond (test expr...)... [(else expr...)])`
fn eval_cond(env: &Environment, args: Value, depth: usize) -> Result<Step, Error> {
    if !args.is_pair() {
        return Err(Error::arity("cond", Arity::AtLeast(1), 0));
    }

    let mut clauses = list::IntoIter::new(args);
    while let Some(clause) = clauses.next() {
        let (test, body) = clause
            .into_pair()
            .map_err(|other| Error::type_error(ValueType::Cons, &other))?;
        if !list::is_list(&body) {
            return Err(Error::structure(format!(
                "improper cond clause: ({test} . {body})"
            )));
        }

        if test.as_symbol() == Some("else") {
            if !clauses.is_done() {
                return Err(Error::structure(
                    "misplaced else clause - should be the last one in cond",
                ));
            }
        } else {
            let result = eval_with_depth_tracking(env, test, depth + 1)?;
            if result.is_false() {
                continue;
            }
            // A clause without expressions yields its test value
            if body.is_nil() {
                return Ok(Step::Done(result));
            }
        }

        let last = eval_all_but_one_with_depth_tracking(env, body, depth)?;
        return Ok(Step::tail(env, last));
    }

    Ok(Step::Done(Value::Void))
}

/// `(if test then [else])`
fn eval_if(env: &Environment, args: Value, depth: usize) -> Result<Step, Error> {
    let len = list::length(&args);
    Arity::Range(2, 3).validate("if", len)?;

    let mut parts = list::IntoIter::new(args);
    let (Some(test), Some(consequent)) = (parts.next(), parts.next()) else {
        return Err(Error::arity("if", Arity::Range(2, 3), len));
    };
    let alternative = parts.next();

    let condition = eval_with_depth_tracking(env, test, depth + 1)?;
    Ok(if condition.is_truthy() {
        Step::tail(env, consequent)
    } else {
        match alternative {
            Some(expr) => Step::tail(env, expr),
            None => Step::Done(Value::Void),
        }
    })
}

/// Generate the short-circuiting `and`/`or` handlers.
///
/// Every operand but the last is evaluated in order; the first one for which
/// `$stops` holds is the result. The last operand is a tail expression.
macro_rules! short_circuit_op {
    ($name:ident, $stops:expr, $empty:expr) => {
        fn $name(env: &Environment, args: Value, depth: usize) -> Result<Step, Error> {
            let mut operands = list::IntoIter::new(args);
            while let Some(expr) = operands.next() {
                if operands.is_done() {
                    return Ok(Step::tail(env, expr));
                }
                let result = eval_with_depth_tracking(env, expr, depth + 1)?;
                if $stops(&result) {
                    return Ok(Step::Done(result));
                }
            }
            Ok(Step::Done(Value::Bool($empty)))
        }
    };
}

short_circuit_op!(eval_and, Value::is_false, true);
short_circuit_op!(eval_or, Value::is_truthy, false);
