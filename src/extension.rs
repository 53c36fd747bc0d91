//! Name-keyed registry of pluggable implementations.
//!
//! Serializations and load balancers are looked up by the name configured
//! on a [`Url`](crate::Url). Every implementation is registered explicitly
//! at startup; there is no runtime discovery.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use dabb_rpc::extension::ExtensionRegistry;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! let mut registry: ExtensionRegistry<dyn Greeter> = ExtensionRegistry::new();
//! registry.register("en", Arc::new(English));
//! assert_eq!(registry.get("en").unwrap().greet(), "hello");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

/// Registry mapping names to shared implementations.
pub struct ExtensionRegistry<T: ?Sized> {
    entries: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> ExtensionRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an implementation, replacing any previous one with the same name.
    pub fn register(&mut self, name: &str, extension: Arc<T>) -> Option<Arc<T>> {
        self.entries.insert(name.to_string(), extension)
    }

    /// Register the value produced by a factory.
    pub fn register_with<F>(&mut self, name: &str, factory: F) -> Option<Arc<T>>
    where
        F: FnOnce() -> Arc<T>,
    {
        self.register(name, factory())
    }

    /// Look up an implementation by name.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).cloned()
    }

    /// Look up by name, falling back to `default` when `name` is unknown.
    pub fn get_or(&self, name: &str, default: &str) -> Option<Arc<T>> {
        self.get(name).or_else(|| self.get(default))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> Default for ExtensionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
