//! Pair/list protocol.
//!
//! A list is a chain of [`Value::Pair`] cells whose final cdr is [`Value::Nil`].
//! Chains ending in anything else are improper lists; they are legal values but
//! most operations here treat them as "not a list".
//!
//! Two access styles are offered. Borrowing accessors ([`car`], [`cdr`], [`iter`])
//! inspect a list in place. Consuming accessors ([`uncons`], [`IntoIter`], [`to_vec`])
//! detach elements and hand their ownership to the caller, freeing the emptied cells.
//! A cell that is still shared with another copy of the list is left in place.

use crate::value::Value;

/// Number of pairs along the cdr chain
pub fn length(list: &Value) -> usize {
    iter(list).count()
}

/// True for `Nil` or a pair chain terminated by `Nil`
pub fn is_list(value: &Value) -> bool {
    let mut current = value;
    loop {
        match current {
            Value::Nil => return true,
            Value::Pair(cell) => current = &cell.cdr,
            _ => return false,
        }
    }
}

pub fn car(value: &Value) -> Option<&Value> {
    match value {
        Value::Pair(cell) => Some(&cell.car),
        _ => None,
    }
}

pub fn cdr(value: &Value) -> Option<&Value> {
    match value {
        Value::Pair(cell) => Some(&cell.cdr),
        _ => None,
    }
}

/// Detach the head and tail of a pair, consuming the cell
pub fn uncons(value: Value) -> Option<(Value, Value)> {
    value.into_pair().ok()
}

/// Borrowing iterator over the elements of a list.
/// Iteration stops at the first non-pair tail.
pub fn iter(list: &Value) -> Iter<'_> {
    Iter { current: list }
}

pub struct Iter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(cell) => {
                self.current = &cell.cdr;
                Some(&cell.car)
            }
            _ => None,
        }
    }
}

/// Consuming iterator over the elements of a list
pub struct IntoIter {
    rest: Value,
}

impl IntoIter {
    pub fn new(list: Value) -> Self {
        IntoIter { rest: list }
    }

    /// True when no element remains
    pub fn is_done(&self) -> bool {
        !self.rest.is_pair()
    }
}

impl Iterator for IntoIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match std::mem::take(&mut self.rest).into_pair() {
            Ok((car, cdr)) => {
                self.rest = cdr;
                Some(car)
            }
            Err(tail) => {
                self.rest = tail;
                None
            }
        }
    }
}

/// Materialize a list into an indexable vector, taking ownership of the elements
pub fn to_vec(list: Value) -> Vec<Value> {
    IntoIter::new(list).collect()
}

/// Build a proper list from a vector
pub fn from_vec(items: Vec<Value>) -> Value {
    items.into_iter().collect()
}

/// True iff every element satisfies `pred`
pub fn is_all(list: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    iter(list).all(pred)
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let items: Vec<Value> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, item| Value::cons(item, tail))
    }
}
