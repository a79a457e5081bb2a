//! This module defines the runtime value model of the interpreter. The main enum,
//! [`Value`], is a closed sum over every variant the evaluator can produce or consume:
//! atoms, symbols, pairs, special-form tags, functions, the `void` unit and first-class
//! errors. Ownership is plain Rust ownership: a function taking a `Value` by value
//! consumes it and `Drop` releases it.
//!
//! Pair cells are immutable once built, so a copy shares them by reference count
//! instead of duplicating the chain; closure environments and builtins are shared
//! the same way. Releasing never recurses through pairs, and rendering and
//! comparing walk the cdr chain in a loop, so list length is bounded by memory
//! rather than by the native stack.
//!
//! Ergonomic helpers such as [`sym`], [`val`] and [`nil`] are provided for building
//! trees in code and tests. `Display` implements the canonical textual rendering used
//! by drivers; it always uses dotted-pair notation.

use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::Error;
use crate::env::Environment;

/// Signature of a native builtin: receives the evaluated argument list
pub type BuiltinFn = dyn Fn(Value) -> Result<Value, Error>;

/// The fixed set of special-form keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialForm {
    Define,
    Lambda,
    Cond,
    If,
    And,
    Or,
}

/// Callable values
#[derive(Clone)]
pub enum Function {
    /// Native function, shared rather than duplicated on copy
    Builtin { name: String, func: Rc<BuiltinFn> },
    /// User-defined function. `env` is the child scope created when the closure
    /// was constructed; every invocation binds its parameters in a fresh child of it.
    Closure {
        params: Box<Value>,
        body: Box<Value>,
        env: Environment,
    },
}

/// Core value type of the interpreter
#[derive(Clone)]
pub enum Value {
    /// Absence of a value: end of a list, the empty list
    Nil,
    /// Unit result of statements such as `define`
    Void,
    /// First-class failure value
    Error(Error),
    Symbol(String),
    /// Cons cell. Proper lists end in `Nil`; any other tail makes an improper list.
    Pair(Rc<Cons>),
    Integer(i64),
    Float(f64),
    Bool(bool),
    SpecialForm(SpecialForm),
    Function(Function),
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

/// A cons cell, shared between every copy of the pair that holds it
pub struct Cons {
    pub car: Value,
    pub cdr: Value,
}

impl Cons {
    /// Take both halves of a cell. A cell still shared elsewhere is left
    /// intact and its halves are copied.
    pub fn into_parts(cell: Rc<Cons>) -> (Value, Value) {
        match Rc::try_unwrap(cell) {
            Ok(mut cons) => (mem::take(&mut cons.car), mem::take(&mut cons.cdr)),
            Err(shared) => (shared.car.clone(), shared.cdr.clone()),
        }
    }
}

impl Drop for Cons {
    fn drop(&mut self) {
        // Nested cells go through a worklist instead of recursing. A cell still
        // referenced from elsewhere only loses one count.
        let mut pending = Vec::new();
        detach_cell(&mut self.car, &mut pending);
        detach_cell(&mut self.cdr, &mut pending);
        while let Some(cell) = pending.pop() {
            if let Ok(mut cons) = Rc::try_unwrap(cell) {
                detach_cell(&mut cons.car, &mut pending);
                detach_cell(&mut cons.cdr, &mut pending);
            }
        }
    }
}

fn detach_cell(value: &mut Value, pending: &mut Vec<Rc<Cons>>) {
    if value.is_pair()
        && let Value::Pair(cell) = mem::take(value)
    {
        pending.push(cell);
    }
}

/// Variant tags, used in type errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Nil,
    Void,
    Error,
    Symbol,
    Cons,
    Integer,
    Float,
    Bool,
    SpecialForm,
    Function,
    /// Integer or Float
    Number,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Nil => "Nil",
            ValueType::Void => "Void",
            ValueType::Error => "Error",
            ValueType::Symbol => "Symbol",
            ValueType::Cons => "Cons",
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::Bool => "Bool",
            ValueType::SpecialForm => "Special Form",
            ValueType::Function => "Function",
            ValueType::Number => "Number",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Symbol(name.into())
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(Cons { car, cdr }))
    }

    pub fn error(err: Error) -> Value {
        Value::Error(err)
    }

    pub fn builtin<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(Value) -> Result<Value, Error> + 'static,
    {
        Value::Function(Function::Builtin {
            name: name.into(),
            func: Rc::new(func),
        })
    }

    /// Build a closure over a fresh child scope of `env`.
    ///
    /// `params` and `body` are moved into the closure; `env` is retained by the
    /// child it parents.
    pub fn closure(params: Value, body: Value, env: &Environment) -> Value {
        Value::Function(Function::Closure {
            params: Box::new(params),
            body: Box::new(body),
            env: Environment::child(env),
        })
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Void => ValueType::Void,
            Value::Error(_) => ValueType::Error,
            Value::Symbol(_) => ValueType::Symbol,
            Value::Pair(..) => ValueType::Cons,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::SpecialForm(_) => ValueType::SpecialForm,
            Value::Function(_) => ValueType::Function,
        }
    }

    /// `#f` is the only false value
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_false()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(..))
    }

    pub fn is_closure(&self) -> bool {
        matches!(self, Value::Function(Function::Closure { .. }))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Value::Function(Function::Builtin { .. }))
    }

    pub fn is_special_form(&self) -> bool {
        matches!(self, Value::SpecialForm(_))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Split a pair into its car and cdr, or hand back a non-pair unchanged
    pub fn into_pair(self) -> Result<(Value, Value), Value> {
        match self {
            Value::Pair(cell) => Ok(Cons::into_parts(cell)),
            other => Err(other),
        }
    }

    /// Split an error value off into the `Err` channel
    pub fn into_result(self) -> Result<Value, Error> {
        match self {
            Value::Error(err) => Err(err),
            other => Ok(other),
        }
    }
}

impl From<Result<Value, Error>> for Value {
    fn from(result: Result<Value, Error>) -> Self {
        result.unwrap_or_else(Value::Error)
    }
}

impl From<Error> for Value {
    fn from(err: Error) -> Self {
        Value::Error(err)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(n as i64)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<SpecialForm> for Value {
    fn from(form: SpecialForm) -> Self {
        Value::SpecialForm(form)
    }
}

/// Vectors and arrays become proper lists
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        v.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        arr.into_iter().map(Into::into).collect()
    }
}

// Fallible conversions used by builtins to read their arguments.

impl TryFrom<&Value> for i64 {
    type Error = Error;

    fn try_from(value: &Value) -> Result<i64, Error> {
        match value {
            Value::Integer(n) => Ok(*n),
            other => Err(Error::type_error(ValueType::Integer, other)),
        }
    }
}

impl TryFrom<&Value> for f64 {
    type Error = Error;

    fn try_from(value: &Value) -> Result<f64, Error> {
        match value {
            Value::Integer(n) => Ok(*n as f64),
            Value::Float(x) => Ok(*x),
            other => Err(Error::type_error(ValueType::Number, other)),
        }
    }
}

/// Helper for creating symbols in mixed lists
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for creating values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The empty list
pub fn nil() -> Value {
    Value::Nil
}

/// Render a float the way C's `%.{precision}g` does: `precision` significant
/// digits, trailing zeros trimmed, scientific notation for very small or large
/// magnitudes.
pub(crate) fn format_float(x: f64, precision: usize) -> String {
    if x.is_nan() {
        return "nan".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, x);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{x:.decimals$}")).to_owned()
    }
}

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = self;
        let mut open = 0;
        loop {
            match current {
                Value::Pair(cell) => {
                    write!(f, "({} . ", cell.car)?;
                    open += 1;
                    current = &cell.cdr;
                    continue;
                }
                Value::Nil => write!(f, "nil")?,
                Value::Void => write!(f, "void")?,
                Value::Error(err) => write!(f, "{err}")?,
                Value::Symbol(name) => write!(f, "{name}")?,
                Value::Integer(n) => write!(f, "{n}")?,
                Value::Float(x) => write!(f, "{}", format_float(*x, 10))?,
                Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" })?,
                Value::SpecialForm(_) => write!(f, "<spec_form>")?,
                Value::Function(Function::Builtin { .. }) => write!(f, "<function>")?,
                Value::Function(Function::Closure { params, body, .. }) => {
                    write!(f, "FUNCK: {{ {params}{body} }}")?
                }
            }
            break;
        }
        (0..open).try_for_each(|_| f.write_str(")"))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = self;
        let mut open = 0;
        loop {
            match current {
                Value::Pair(cell) => {
                    write!(f, "Pair({:?}, ", cell.car)?;
                    open += 1;
                    current = &cell.cdr;
                    continue;
                }
                Value::Nil => write!(f, "Nil")?,
                Value::Void => write!(f, "Void")?,
                Value::Error(err) => write!(f, "Error({err:?})")?,
                Value::Symbol(s) => write!(f, "Symbol({s})")?,
                Value::Integer(n) => write!(f, "Integer({n})")?,
                Value::Float(x) => write!(f, "Float({x})")?,
                Value::Bool(b) => write!(f, "Bool({b})")?,
                Value::SpecialForm(form) => write!(f, "SpecialForm({form:?})")?,
                Value::Function(Function::Builtin { name, .. }) => write!(f, "Builtin({name})")?,
                Value::Function(Function::Closure { params, body, .. }) => {
                    write!(f, "Closure(params={params:?}, body={body:?})")?
                }
            }
            break;
        }
        (0..open).try_for_each(|_| f.write_str(")"))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let (mut left, mut right) = (self, other);
        loop {
            return match (left, right) {
                (Value::Pair(a), Value::Pair(b)) => {
                    if Rc::ptr_eq(a, b) {
                        return true;
                    }
                    if a.car != b.car {
                        return false;
                    }
                    left = &a.cdr;
                    right = &b.cdr;
                    continue;
                }
                (Value::Nil, Value::Nil) | (Value::Void, Value::Void) => true,
                (Value::Error(a), Value::Error(b)) => a == b,
                (Value::Symbol(a), Value::Symbol(b)) => a == b,
                (Value::Integer(a), Value::Integer(b)) => a == b,
                (Value::Float(a), Value::Float(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::SpecialForm(a), Value::SpecialForm(b)) => a == b,
                // Builtins compare by name, not function pointer
                (
                    Value::Function(Function::Builtin { name: n1, .. }),
                    Value::Function(Function::Builtin { name: n2, .. }),
                ) => n1 == n2,
                (
                    Value::Function(Function::Closure {
                        params: p1,
                        body: b1,
                        env: e1,
                    }),
                    Value::Function(Function::Closure {
                        params: p2,
                        body: b2,
                        env: e2,
                    }),
                ) => p1 == p2 && b1 == b2 && e1.ptr_eq(e2),
                _ => false,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Integer(42)),
            (val(-17), Value::Integer(-17)),
            (val(255u8), Value::Integer(255)),
            (val(i64::MIN), Value::Integer(i64::MIN)),
            (val(2.5), Value::Float(2.5)),
            (val(true), Value::Bool(true)),
            (sym("foo-bar?"), Value::Symbol("foo-bar?".to_owned())),
            (nil(), Value::Nil),
            (
                val([1, 2]),
                Value::cons(val(1), Value::cons(val(2), Value::Nil)),
            ),
            (
                val(vec![sym("f"), val(1)]),
                Value::cons(sym("f"), Value::cons(val(1), Value::Nil)),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_truthiness() {
        // Only #f is false; zero, the empty list and void are true
        assert!(val(false).is_false());
        for truthy in [val(true), val(0), val(0.0), nil(), Value::Void, sym("x")] {
            assert!(truthy.is_truthy(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn test_display_data_driven() {
        let env = Environment::root();
        let closure = Value::closure(val([sym("x")]), val([sym("x")]), &env);
        let test_cases = vec![
            (nil(), "nil"),
            (Value::Void, "void"),
            (val(-42), "-42"),
            (val(true), "#t"),
            (val(false), "#f"),
            (sym("lambda"), "lambda"),
            (Value::cons(val(1), val(2)), "(1 . 2)"),
            (val([1, 2]), "(1 . (2 . nil))"),
            (Value::SpecialForm(SpecialForm::If), "<spec_form>"),
            (Value::builtin("+", Ok), "<function>"),
            (closure, "FUNCK: { (x . nil)(x . nil) }"),
            (
                Value::error(Error::structure("misplaced else clause")),
                "misplaced else clause",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.to_string(), expected, "rendering {value:?}");
        }
    }

    #[test]
    fn test_float_rendering_matches_general_format() {
        let test_cases = vec![
            (1.5, "1.5"),
            (2.0, "2"),
            (0.1, "0.1"),
            (-0.25, "-0.25"),
            (3.141592653589793, "3.141592654"),
            (1234567890.0, "1234567890"),
            (12345678901.0, "1.23456789e+10"),
            (1e20, "1e+20"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (1.0 / 3.0, "0.3333333333"),
            (0.0, "0"),
            (f64::INFINITY, "inf"),
        ];

        for (x, expected) in test_cases {
            assert_eq!(format_float(x, 10), expected, "formatting {x}");
        }
    }

    #[test]
    fn test_type_error_message() {
        let err = Error::type_error(ValueType::Cons, &val(7));
        assert_eq!(err.to_string(), "Cons expected. Got 7 (actual type=Integer)");
    }

    #[test]
    fn test_copy_shares_closure_environment() {
        let env = Environment::root();
        let closure = Value::closure(val([sym("x")]), val([sym("x")]), &env);
        let Value::Function(Function::Closure { env: captured, .. }) = &closure else {
            panic!("expected closure");
        };
        assert_eq!(captured.strong_count(), 1);

        let copy = closure.clone();
        assert_eq!(copy, closure);
        assert_eq!(captured.strong_count(), 2);

        drop(copy);
        assert_eq!(captured.strong_count(), 1);
    }

    #[test]
    fn test_copy_shares_pair_cells() {
        let list = val([1, 2, 3]);
        let Value::Pair(cell) = &list else {
            panic!("expected pair");
        };
        assert_eq!(Rc::strong_count(cell), 1);

        let copy = list.clone();
        assert_eq!(Rc::strong_count(cell), 2);
        assert_eq!(copy, list);

        // Taking a shared cell apart leaves the other holder intact
        let (head, tail) = copy.into_pair().unwrap_or_default();
        assert_eq!(head, val(1));
        assert_eq!(tail, val([2, 3]));
        assert_eq!(Rc::strong_count(cell), 1);
        assert_eq!(list.to_string(), "(1 . (2 . (3 . nil)))");
    }

    #[test]
    fn test_long_chains_do_not_recurse() {
        let long: Value = (0..200_000).map(Value::Integer).collect();
        let copy = long.clone();
        assert_eq!(copy, long);
        assert_ne!(copy, (0..200_000).map(|n| Value::Integer(n + 1)).collect::<Value>());

        let rendered = long.to_string();
        assert!(rendered.starts_with("(0 . (1 . (2 . "));
        let closing = rendered.trim_end_matches(')');
        assert!(closing.ends_with("(199999 . nil"));
        assert_eq!(rendered.len() - closing.len(), 200_000);
        assert!(format!("{long:?}").starts_with("Pair(Integer(0), Pair(Integer(1), "));

        drop(long);
        drop(copy);

        // Nesting through the car is released without recursion too
        let nested = (0..200_000).fold(nil(), |inner, _| Value::cons(inner, Value::Nil));
        drop(nested);
    }
}
