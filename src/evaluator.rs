use crate::builtins::get_builtin_ops;
use crate::env::Environment;
use crate::list;
use crate::special_form;
use crate::value::{Cons, Function, Value};
use crate::{Arity, Error, MAX_EVAL_DEPTH};

// Remaining stack below which nested evaluation moves to a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Outcome of applying a special form or function.
///
/// Tail positions are not evaluated where they occur: they come back as
/// [`Step::Tail`] and are evaluated by the evaluator's loop, so a chain of tail
/// calls runs in constant host stack.
#[derive(Debug)]
pub enum Step {
    /// Final, already evaluated value
    Done(Value),
    /// Unevaluated expression still to be evaluated in `env`
    Tail { env: Environment, expr: Value },
}

impl Step {
    pub(crate) fn tail(env: &Environment, expr: Value) -> Self {
        Step::Tail {
            env: env.clone(),
            expr,
        }
    }
}

/// Evaluate an expression (public API).
///
/// Consumes `expr` and returns an owned result. Failures are returned as
/// [`Value::Error`].
pub fn eval(env: &Environment, expr: Value) -> Value {
    try_eval(env, expr).into()
}

/// Evaluate an expression, reporting failures through `Err`
pub fn try_eval(env: &Environment, expr: Value) -> Result<Value, Error> {
    eval_with_depth_tracking(env, expr, 0)
}

/// Evaluate every element of `body` but the last for effect and return the last
/// element unevaluated, for the caller to evaluate in tail position.
pub fn eval_all_but_one(env: &Environment, body: Value) -> Result<Value, Error> {
    eval_all_but_one_with_depth_tracking(env, body, 0)
}

/// Apply an operator value to an argument list.
///
/// Special forms receive `args` unevaluated. Functions receive the arguments
/// evaluated left to right in `env`.
pub fn apply(operator: Value, env: &Environment, args: Value) -> Value {
    apply_with_depth_tracking(operator, env, args, 0)
        .and_then(|step| run_step(step, 0))
        .into()
}

/// Call a function value with already evaluated arguments
pub fn call(function: Value, args: Value) -> Value {
    match function {
        Value::Function(function) => call_function(function, args, 0)
            .and_then(|step| run_step(step, 0))
            .into(),
        other => Value::Error(Error::NotCallable(other.to_string())),
    }
}

/// Evaluate an S-expression with depth tracking to prevent stack overflow.
///
/// `depth` counts nested non-tail evaluations only.
pub(crate) fn eval_with_depth_tracking(
    env: &Environment,
    expr: Value,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::DepthExceeded);
    }
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        eval_until_done(env, expr, depth)
    })
}

/// Evaluate `expr`, following tail steps in place
fn eval_until_done(env: &Environment, expr: Value, depth: usize) -> Result<Value, Error> {
    let mut env = env.clone();
    let mut expr = expr;
    loop {
        let step = match expr {
            Value::Symbol(name) => {
                return if special_form::is_special_form(&name) {
                    special_form::from_string(&name).into_result()
                } else {
                    env.lookup(&name)
                };
            }

            // An error value flowing into evaluation keeps propagating
            Value::Error(err) => return Err(err),

            Value::Pair(cell) => {
                let (head, args) = Cons::into_parts(cell);
                let operator = eval_with_depth_tracking(&env, head, depth + 1)?;
                apply_with_depth_tracking(operator, &env, args, depth)?
            }

            // Self-evaluating forms
            Value::Nil
            | Value::Void
            | Value::Integer(_)
            | Value::Float(_)
            | Value::Bool(_)
            | Value::SpecialForm(_)
            | Value::Function(_) => return Ok(expr),
        };

        match step {
            Step::Done(value) => return Ok(value),
            Step::Tail {
                env: next_env,
                expr: next_expr,
            } => {
                env = next_env;
                expr = next_expr;
            }
        }
    }
}

/// Drive a step to its final value
fn run_step(step: Step, depth: usize) -> Result<Value, Error> {
    match step {
        Step::Done(value) => Ok(value),
        Step::Tail { env, expr } => eval_with_depth_tracking(&env, expr, depth),
    }
}

pub(crate) fn eval_all_but_one_with_depth_tracking(
    env: &Environment,
    body: Value,
    depth: usize,
) -> Result<Value, Error> {
    let mut exprs = list::IntoIter::new(body);
    while let Some(expr) = exprs.next() {
        if exprs.is_done() {
            return Ok(expr);
        }
        // Intermediate results are only evaluated for effect
        eval_with_depth_tracking(env, expr, depth + 1)?;
    }
    Ok(Value::Void)
}

pub(crate) fn apply_with_depth_tracking(
    operator: Value,
    env: &Environment,
    args: Value,
    depth: usize,
) -> Result<Step, Error> {
    match operator {
        Value::SpecialForm(form) => special_form::apply(form, env, args, depth),
        Value::Function(function) => {
            let args = eval_args(env, args, depth)?;
            call_function(function, args, depth)
        }
        other => Err(Error::NotCallable(other.to_string())),
    }
}

/// Evaluate argument expressions left to right; the first error stops the rest
fn eval_args(env: &Environment, args: Value, depth: usize) -> Result<Value, Error> {
    if !list::is_list(&args) {
        return Err(Error::structure(format!("improper argument list: {args}")));
    }
    list::IntoIter::new(args)
        .map(|arg| eval_with_depth_tracking(env, arg, depth + 1))
        .collect::<Result<Vec<_>, _>>()
        .map(list::from_vec)
}

fn call_function(function: Function, args: Value, depth: usize) -> Result<Step, Error> {
    match function {
        Function::Builtin { name, func } => {
            tracing::trace!(builtin = %name, "calling builtin");
            func(args)?.into_result().map(Step::Done)
        }
        Function::Closure { params, body, env } => {
            let expected = list::length(&params);
            let got = list::length(&args);
            if expected != got {
                return Err(Error::arity("function", Arity::Exact(expected), got));
            }

            // Parameters live in a fresh frame per call; the closure's own scope
            // is its parent.
            let frame = Environment::child(&env);
            for (param, arg) in list::iter(&params).zip(list::IntoIter::new(args)) {
                if let Some(name) = param.as_symbol() {
                    frame.define(name, arg);
                }
            }
            tracing::trace!(params = %params, "invoking closure");

            let last = eval_all_but_one_with_depth_tracking(&frame, *body, depth)?;
            Ok(Step::Tail {
                env: frame,
                expr: last,
            })
        }
    }
}

/// Create a global environment with the builtin functions bound
pub fn create_global_env() -> Environment {
    let env = Environment::root();
    for op in get_builtin_ops() {
        env.define(op.name, op.to_value());
    }
    env
}
