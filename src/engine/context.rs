//! Task context
//!
//! The context carries domain objects and variables between the tasks of a
//! single workflow run. Contexts may be nested: a child reads through to its
//! parent chain but always writes locally.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

/// A shared, type-erased object held by a context
pub type Object = Rc<dyn Any>;

/// Objects that know the key they are stored under, e.g. an archetype short name
pub trait ContextObject: Any {
    fn context_key(&self) -> String;
}

/// How a sub-workflow obtains its context from the enclosing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Run on the enclosing context itself
    Shared,
    /// Child context reading through to the enclosing one
    #[default]
    Inherit,
    /// Copy of the enclosing context's visible objects, taken at start
    Detached,
}

struct Scope {
    objects: RefCell<HashMap<String, Object>>,
    parent: Option<TaskContext>,
}

/// Hierarchical key/object store shared by the tasks of a workflow run
///
/// Cloning a `TaskContext` yields another handle to the same store. The type is
/// `!Send`: a context belongs to one workflow on one thread.
#[derive(Clone)]
pub struct TaskContext {
    scope: Rc<Scope>,
}

impl TaskContext {
    /// Create an empty root context
    pub fn new() -> Self {
        TaskContext {
            scope: Rc::new(Scope {
                objects: RefCell::new(HashMap::new()),
                parent: None,
            }),
        }
    }

    /// Create a child context that reads through to this one
    pub fn child(&self) -> Self {
        TaskContext {
            scope: Rc::new(Scope {
                objects: RefCell::new(HashMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Create a root context holding everything currently visible from this one
    pub fn snapshot(&self) -> Self {
        let ctx = TaskContext::new();
        {
            let mut objects = ctx.scope.objects.borrow_mut();
            for key in self.keys() {
                if let Some(object) = self.get_object(&key) {
                    objects.insert(key, object);
                }
            }
        }
        ctx
    }

    /// Derive the context a sub-workflow runs on
    pub fn derive(&self, mode: ContextMode) -> Self {
        match mode {
            ContextMode::Shared => self.clone(),
            ContextMode::Inherit => self.child(),
            ContextMode::Detached => self.snapshot(),
        }
    }

    /// Look an object up locally, then through the parent chain
    pub fn get_object(&self, key: &str) -> Option<Object> {
        if let Some(object) = self.scope.objects.borrow().get(key) {
            return Some(Rc::clone(object));
        }
        self.scope.parent.as_ref().and_then(|p| p.get_object(key))
    }

    /// Typed lookup; `None` when absent or of another type
    pub fn get<T: Any>(&self, key: &str) -> Option<Rc<T>> {
        self.get_object(key).and_then(|o| o.downcast::<T>().ok())
    }

    /// Store an object under its own key
    pub fn add_object<T: ContextObject>(&self, object: Rc<T>) {
        let key = object.context_key();
        self.add(key, object);
    }

    /// Store an object under an explicit key, replacing any local value
    pub fn add<T: Any>(&self, key: impl Into<String>, object: Rc<T>) {
        self.scope.objects.borrow_mut().insert(key.into(), object);
    }

    /// Store a string variable
    pub fn set_var(&self, key: impl Into<String>, value: impl Into<String>) {
        self.add(key, Rc::new(value.into()));
    }

    /// Get a string variable
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.get::<String>(key).map(|s| s.as_ref().clone())
    }

    /// Check if a key is visible from this context
    pub fn contains(&self, key: &str) -> bool {
        self.scope.objects.borrow().contains_key(key)
            || self.scope.parent.as_ref().is_some_and(|p| p.contains(key))
    }

    /// Check if a key is stored in this context itself
    pub fn contains_local(&self, key: &str) -> bool {
        self.scope.objects.borrow().contains_key(key)
    }

    /// All visible keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys = BTreeSet::new();
        self.collect_keys(&mut keys);
        keys.into_iter().collect()
    }

    fn collect_keys(&self, keys: &mut BTreeSet<String>) {
        keys.extend(self.scope.objects.borrow().keys().cloned());
        if let Some(parent) = &self.scope.parent {
            parent.collect_keys(keys);
        }
    }

    /// All visible string variables, used for interpolation
    pub fn vars(&self) -> HashMap<String, String> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.get_var(&k).map(|v| (k, v)))
            .collect()
    }

    /// Whether two handles refer to the same store
    pub fn same(&self, other: &TaskContext) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("keys", &self.keys())
            .field("nested", &self.scope.parent.is_some())
            .finish()
    }
}
