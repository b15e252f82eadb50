use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// A chain of scopes. Cloning shares the scope.
///
/// The outermost scope is the global one: `def` always writes there, so
/// definitions made by one evaluation are visible to every later one.
#[derive(Clone)]
pub struct Env(Rc<Scope>);

struct Scope {
    variables: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Env(Rc::new(Scope {
            variables: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// A new innermost scope whose lookups fall back to `self`.
    pub fn child(&self) -> Self {
        Env(Rc::new(Scope {
            variables: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn global(&self) -> Env {
        match &self.0.parent {
            Some(parent) => parent.global(),
            None => self.clone(),
        }
    }

    /// Bind `name` in this scope.
    pub fn set(&self, name: &str, value: Value) {
        self.0
            .variables
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    /// Look up `name`, searching from the innermost scope outward.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.variables.borrow().get(name) {
            return Some(value.clone());
        }
        self.0.parent.as_ref().and_then(|parent| parent.get(name))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names bound in this scope alone, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.variables.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}
