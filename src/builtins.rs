//! Built-in function registry.
//!
//! Every entry is an ordinary function: its arguments are evaluated before it is
//! called, and it receives them as a proper list. Special forms are not in this
//! registry; see [`special_form`](crate::special_form).
//!
//! ```scheme
//! (+ 1 2.5)          ; => 3.5, integers promote to floats when mixed
//! (< 1 2 3)          ; => #t, comparisons chain
//! (car (list 1 2))   ; => 1
//! (error 1 2)        ; => error value rendering as: 1 2
//! ```
//!
//! ## Numbers
//!
//! Integer arithmetic is checked: overflow is an error rather than a wrap. Any
//! float operand makes the result a float. `/` on integers stays an integer when
//! the division is exact and produces a float otherwise.
//!
//! ## Adding New Operations
//!
//! 1. Implement a function with the signature `fn(Vec<Value>) -> Result<Value, Error>`
//! 2. Add it to `BUILTIN_OPS` with its identifier and arity

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::list;
use crate::value::{Value, ValueType};
use crate::{Arity, Error};

/// Signature shared by every registry entry
pub type OperationFn = fn(Vec<Value>) -> Result<Value, Error>;

/// Definition of a built-in operation
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    /// The identifier this operation is bound to in the global environment
    pub name: &'static str,
    pub func: OperationFn,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Check the argument count, then run the operation
    pub fn call(&self, args: Vec<Value>) -> Result<Value, Error> {
        self.arity.validate(self.name, args.len())?;
        (self.func)(args)
    }

    /// Wrap this operation as a first-class function value
    pub fn to_value(&'static self) -> Value {
        Value::builtin(self.name, move |args| self.call(list::to_vec(args)))
    }
}

//
// Argument helpers
//

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], Error> {
    let got = args.len();
    <[Value; N]>::try_from(args).map_err(|_| Error::arity(name, Arity::Exact(N), got))
}

fn check_numbers(args: &[Value]) -> Result<(), Error> {
    args.iter().try_for_each(|arg| f64::try_from(arg).map(|_| ()))
}

fn overflow(operation: &str) -> Error {
    Error::Eval(format!("Integer overflow in {operation}"))
}

/// Left fold over numeric arguments, staying in integers until a float appears
fn fold_numeric(
    operation: &str,
    init: Value,
    args: Vec<Value>,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    check_numbers(&args)?;
    args.into_iter().try_fold(init, |acc, arg| match (&acc, &arg) {
        (Value::Integer(a), Value::Integer(b)) => int_op(*a, *b)
            .map(Value::Integer)
            .ok_or_else(|| overflow(operation)),
        _ => Ok(Value::Float(float_op(f64::try_from(&acc)?, f64::try_from(&arg)?))),
    })
}

/// Split off the first argument as the fold seed
fn first_and_rest(args: Vec<Value>) -> (Value, Vec<Value>) {
    let mut args = args.into_iter();
    let first = args.next().unwrap_or(Value::Nil);
    (first, args.collect())
}

//
// Builtin Function Implementations
//

fn builtin_add(args: Vec<Value>) -> Result<Value, Error> {
    fold_numeric("addition", Value::Integer(0), args, i64::checked_add, |a, b| a + b)
}

fn builtin_sub(args: Vec<Value>) -> Result<Value, Error> {
    check_numbers(&args)?;
    if args.len() == 1 {
        return fold_numeric("negation", Value::Integer(0), args, i64::checked_sub, |a, b| a - b);
    }
    let (first, rest) = first_and_rest(args);
    fold_numeric("subtraction", first, rest, i64::checked_sub, |a, b| a - b)
}

fn builtin_mul(args: Vec<Value>) -> Result<Value, Error> {
    fold_numeric("multiplication", Value::Integer(1), args, i64::checked_mul, |a, b| a * b)
}

fn builtin_div(args: Vec<Value>) -> Result<Value, Error> {
    check_numbers(&args)?;
    let (first, rest) = if args.len() == 1 {
        (Value::Integer(1), args)
    } else {
        first_and_rest(args)
    };

    rest.into_iter().try_fold(first, |acc, divisor| {
        if matches!(divisor, Value::Integer(0)) || divisor == Value::Float(0.0) {
            return Err(Error::Eval("Division by zero".into()));
        }
        match (&acc, &divisor) {
            (Value::Integer(a), Value::Integer(b)) => match a.checked_rem(*b) {
                Some(0) => a
                    .checked_div(*b)
                    .map(Value::Integer)
                    .ok_or_else(|| overflow("division")),
                Some(_) => Ok(Value::Float(*a as f64 / *b as f64)),
                None => Err(overflow("division")),
            },
            _ => Ok(Value::Float(f64::try_from(&acc)? / f64::try_from(&divisor)?)),
        }
    })
}

fn builtin_remainder(args: Vec<Value>) -> Result<Value, Error> {
    let [dividend, divisor] = exactly::<2>("remainder", args)?;
    let (a, b) = (i64::try_from(&dividend)?, i64::try_from(&divisor)?);
    if b == 0 {
        return Err(Error::Eval("Division by zero".into()));
    }
    a.checked_rem(b)
        .map(Value::Integer)
        .ok_or_else(|| overflow("remainder"))
}

fn builtin_max(args: Vec<Value>) -> Result<Value, Error> {
    check_numbers(&args)?;
    let (first, rest) = first_and_rest(args);
    fold_numeric("max", first, rest, |a, b| Some(a.max(b)), f64::max)
}

fn builtin_min(args: Vec<Value>) -> Result<Value, Error> {
    check_numbers(&args)?;
    let (first, rest) = first_and_rest(args);
    fold_numeric("min", first, rest, |a, b| Some(a.min(b)), f64::min)
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(args: Vec<Value>) -> Result<Value, Error> {
            check_numbers(&args)?;
            // All adjacent pairs must satisfy the comparison
            let holds = args.windows(2).try_fold(true, |holds, pair| {
                Ok::<_, Error>(holds && match (&pair[0], &pair[1]) {
                    (Value::Integer(a), Value::Integer(b)) => a $op b,
                    (a, b) => f64::try_from(a)? $op f64::try_from(b)?,
                })
            })?;
            Ok(Value::Bool(holds))
        }
    };
}

numeric_comparison!(builtin_num_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

fn builtin_not(args: Vec<Value>) -> Result<Value, Error> {
    let [value] = exactly::<1>("not", args)?;
    Ok(Value::Bool(value.is_false()))
}

fn builtin_cons(args: Vec<Value>) -> Result<Value, Error> {
    let [car, cdr] = exactly::<2>("cons", args)?;
    Ok(Value::cons(car, cdr))
}

fn builtin_car(args: Vec<Value>) -> Result<Value, Error> {
    let [pair] = exactly::<1>("car", args)?;
    match pair {
        Value::Pair(cell) => Ok(cell.car.clone()),
        other => Err(Error::type_error(ValueType::Cons, &other)),
    }
}

fn builtin_cdr(args: Vec<Value>) -> Result<Value, Error> {
    let [pair] = exactly::<1>("cdr", args)?;
    match pair {
        Value::Pair(cell) => Ok(cell.cdr.clone()),
        other => Err(Error::type_error(ValueType::Cons, &other)),
    }
}

fn builtin_list(args: Vec<Value>) -> Result<Value, Error> {
    Ok(list::from_vec(args))
}

fn builtin_length(args: Vec<Value>) -> Result<Value, Error> {
    let [list] = exactly::<1>("length", args)?;
    if !list::is_list(&list) {
        return Err(Error::type_error(ValueType::Cons, &list));
    }
    i64::try_from(list::length(&list))
        .map(Value::Integer)
        .map_err(|_| overflow("length"))
}

// Macro to generate single-argument type predicates
macro_rules! type_predicate {
    ($name:ident, $id:literal, $pattern:pat) => {
        fn $name(args: Vec<Value>) -> Result<Value, Error> {
            let [value] = exactly::<1>($id, args)?;
            Ok(Value::Bool(matches!(value, $pattern)))
        }
    };
}

type_predicate!(builtin_null, "null?", Value::Nil);
type_predicate!(builtin_pair, "pair?", Value::Pair(..));
type_predicate!(builtin_number, "number?", Value::Integer(_) | Value::Float(_));
type_predicate!(builtin_integer, "integer?", Value::Integer(_));
type_predicate!(builtin_symbol, "symbol?", Value::Symbol(_));
type_predicate!(builtin_boolean, "boolean?", Value::Bool(_));
type_predicate!(builtin_procedure, "procedure?", Value::Function(_));

/// Structural equality; closures are equal only when they share a scope
fn builtin_equal(args: Vec<Value>) -> Result<Value, Error> {
    let [first, second] = exactly::<2>("equal?", args)?;
    Ok(Value::Bool(first == second))
}

/// Identity for atoms. Pairs are never `eq?`: a copied list behaves as a fresh one.
fn builtin_eq(args: Vec<Value>) -> Result<Value, Error> {
    let [first, second] = exactly::<2>("eq?", args)?;
    Ok(Value::Bool(!first.is_pair() && first == second))
}

fn builtin_error(args: Vec<Value>) -> Result<Value, Error> {
    let message = if args.is_empty() {
        "Error".to_owned()
    } else {
        args.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    Err(Error::Eval(message))
}

/// Global registry of all built-in operations
#[rustfmt::skip]
static BUILTIN_OPS: &[BuiltinOp] = &[
    BuiltinOp { name: "+", func: builtin_add, arity: Arity::Any },
    BuiltinOp { name: "-", func: builtin_sub, arity: Arity::AtLeast(1) },
    BuiltinOp { name: "*", func: builtin_mul, arity: Arity::Any },
    BuiltinOp { name: "/", func: builtin_div, arity: Arity::AtLeast(1) },
    BuiltinOp { name: "remainder", func: builtin_remainder, arity: Arity::Exact(2) },
    BuiltinOp { name: "max", func: builtin_max, arity: Arity::AtLeast(1) },
    BuiltinOp { name: "min", func: builtin_min, arity: Arity::AtLeast(1) },
    BuiltinOp { name: "=", func: builtin_num_eq, arity: Arity::AtLeast(2) },
    BuiltinOp { name: "<", func: builtin_lt, arity: Arity::AtLeast(2) },
    BuiltinOp { name: ">", func: builtin_gt, arity: Arity::AtLeast(2) },
    BuiltinOp { name: "<=", func: builtin_le, arity: Arity::AtLeast(2) },
    BuiltinOp { name: ">=", func: builtin_ge, arity: Arity::AtLeast(2) },
    BuiltinOp { name: "not", func: builtin_not, arity: Arity::Exact(1) },
    BuiltinOp { name: "cons", func: builtin_cons, arity: Arity::Exact(2) },
    BuiltinOp { name: "car", func: builtin_car, arity: Arity::Exact(1) },
    BuiltinOp { name: "cdr", func: builtin_cdr, arity: Arity::Exact(1) },
    BuiltinOp { name: "list", func: builtin_list, arity: Arity::Any },
    BuiltinOp { name: "length", func: builtin_length, arity: Arity::Exact(1) },
    BuiltinOp { name: "null?", func: builtin_null, arity: Arity::Exact(1) },
    BuiltinOp { name: "pair?", func: builtin_pair, arity: Arity::Exact(1) },
    BuiltinOp { name: "number?", func: builtin_number, arity: Arity::Exact(1) },
    BuiltinOp { name: "integer?", func: builtin_integer, arity: Arity::Exact(1) },
    BuiltinOp { name: "symbol?", func: builtin_symbol, arity: Arity::Exact(1) },
    BuiltinOp { name: "boolean?", func: builtin_boolean, arity: Arity::Exact(1) },
    BuiltinOp { name: "procedure?", func: builtin_procedure, arity: Arity::Exact(1) },
    BuiltinOp { name: "eq?", func: builtin_eq, arity: Arity::Exact(2) },
    BuiltinOp { name: "equal?", func: builtin_equal, arity: Arity::Exact(2) },
    BuiltinOp { name: "error", func: builtin_error, arity: Arity::Any },
];

/// Lazy static map from name to BuiltinOp (private - use find_builtin_op)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.name, op)).collect());

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

/// Find a builtin operation by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(name).copied()
}
