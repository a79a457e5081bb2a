//! Lexical environments.
//!
//! An [`Environment`] is a shared handle to one scope frame. Frames are reference
//! counted: every closure created while a frame is current keeps it alive, and child
//! frames keep their parent alive. Cloning a handle retains the frame, dropping it
//! releases it; bindings and the parent link are torn down only when the last handle
//! goes away.
//!
//! Reference counting does not reclaim cycles. A closure stored in the frame it
//! (indirectly) captures keeps that frame alive forever; see
//! [`Interpreter`](crate::interpreter::Interpreter) for how the driver breaks the
//! common top-level case.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::Error;
use crate::value::Value;

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Shared, mutable scope with a link to the enclosing scope
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    /// Empty root scope
    pub fn root() -> Self {
        Environment::default()
    }

    /// New empty scope whose parent is `parent` (the parent is retained)
    pub fn child(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Bind `name` in this scope, overwriting any previous binding here.
    /// The value is moved into the environment.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look `name` up through the scope chain and return a copy of its value
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let mut current = self.clone();
        loop {
            let next = {
                let frame = current.0.borrow();
                if let Some(value) = frame.bindings.get(name) {
                    return Ok(value.clone());
                }
                frame.parent.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => return Err(Error::Unbound(name.to_owned())),
            }
        }
    }

    /// True if `name` is bound in this scope itself (parents are not consulted)
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    /// Register a native function under `name`.
    ///
    /// # Example
    /// ```
    /// use rcscheme::{Environment, Value};
    ///
    /// let env = Environment::root();
    /// env.register_builtin("forty-two", |_args| Ok(Value::Integer(42)));
    /// assert!(env.lookup("forty-two").is_ok());
    /// ```
    pub fn register_builtin<F>(&self, name: &str, func: F)
    where
        F: Fn(Value) -> Result<Value, Error> + 'static,
    {
        self.define(name, Value::builtin(name, func));
    }

    /// Drop every binding held directly by this scope
    pub fn clear(&self) {
        // Move the bindings out first: dropping them may release closures whose
        // environments point back at this frame.
        let bindings = std::mem::take(&mut self.0.borrow_mut().bindings);
        drop(bindings);
    }

    /// Get all bindings visible from this scope, inner scopes shadowing outer ones.
    /// Returns (name, value) pairs sorted by name.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = match self.parent() {
            Some(parent) => parent.bindings().into_iter().collect::<HashMap<_, _>>(),
            None => HashMap::new(),
        };

        for (name, value) in &self.0.borrow().bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Number of live handles to this scope
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// True if both handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Non-owning handle, used to observe when a scope is freed
    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Rc::downgrade(&self.0))
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

/// Weak reference to a scope
#[derive(Clone)]
pub struct WeakEnvironment(Weak<RefCell<Frame>>);

impl WeakEnvironment {
    pub fn upgrade(&self) -> Option<Environment> {
        self.0.upgrade().map(Environment)
    }

    /// True once the scope has been freed
    pub fn is_released(&self) -> bool {
        self.0.strong_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{sym, val};

    #[test]
    fn test_lookup_walks_outward() {
        let root = Environment::root();
        root.define("x", val(1));
        root.define("y", val(2));
        let child = Environment::child(&root);
        child.define("x", val(10));

        assert_eq!(child.lookup("x"), Ok(val(10)));
        assert_eq!(child.lookup("y"), Ok(val(2)));
        assert_eq!(root.lookup("x"), Ok(val(1)));
        assert_eq!(
            child.lookup("z"),
            Err(Error::Unbound("z".to_owned()))
        );
    }

    #[test]
    fn test_define_overwrites_nearest_scope_only() {
        let root = Environment::root();
        root.define("x", val(1));
        let child = Environment::child(&root);
        child.define("x", val(2));
        child.define("x", val(3));

        assert_eq!(child.lookup("x"), Ok(val(3)));
        assert_eq!(root.lookup("x"), Ok(val(1)));
        assert!(child.is_bound_locally("x"));
    }

    #[test]
    fn test_child_retains_parent() {
        let root = Environment::root();
        let weak = root.downgrade();
        let child = Environment::child(&root);
        assert_eq!(root.strong_count(), 2);

        drop(root);
        assert!(!weak.is_released());
        assert_eq!(child.lookup("missing"), Err(Error::Unbound("missing".to_owned())));

        drop(child);
        assert!(weak.is_released());
    }

    #[test]
    fn test_bindings_merge_with_shadowing() {
        let root = Environment::root();
        root.define("b", val(1));
        root.define("a", sym("outer"));
        let child = Environment::child(&root);
        child.define("a", sym("inner"));

        let bindings = child.bindings();
        assert_eq!(
            bindings,
            vec![("a".to_owned(), sym("inner")), ("b".to_owned(), val(1))]
        );
    }

    #[test]
    fn test_clear_breaks_closure_cycle() {
        let root = Environment::root();
        let weak = root.downgrade();
        // closure -> child scope -> root, stored back into root
        let closure = Value::closure(val([sym("x")]), val([sym("x")]), &root);
        root.define("f", closure);
        drop(root);
        assert!(!weak.is_released());

        if let Some(root) = weak.upgrade() {
            root.clear();
        }
        assert!(weak.is_released());
    }
}
