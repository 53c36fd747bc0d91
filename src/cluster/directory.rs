//! Sources of candidate invokers.

use std::sync::{Arc, RwLock};

use crate::rpc::{Invoker, RpcInvocation};
use crate::url::Url;

/// Current set of invokers for one service.
pub trait Directory: Send + Sync {
    /// Descriptor of the directory itself, used in diagnostics.
    fn url(&self) -> &Url;

    /// Service interface name.
    fn interface(&self) -> &str;

    /// Candidates for a call. Lists may change between calls.
    fn list(&self, invocation: &RpcInvocation) -> Vec<Arc<dyn Invoker>>;

    /// Whether any candidate can currently take calls.
    fn is_available(&self) -> bool {
        true
    }
}

/// Directory over a fixed list that can be swapped wholesale.
pub struct StaticDirectory {
    url: Url,
    interface: String,
    invokers: RwLock<Vec<Arc<dyn Invoker>>>,
}

impl StaticDirectory {
    pub fn new(url: Url, interface: &str, invokers: Vec<Arc<dyn Invoker>>) -> Self {
        Self {
            url,
            interface: interface.to_string(),
            invokers: RwLock::new(invokers),
        }
    }

    /// Replace every invoker, returning the previous list.
    pub fn replace(&self, invokers: Vec<Arc<dyn Invoker>>) -> Vec<Arc<dyn Invoker>> {
        let mut guard = self.invokers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, invokers)
    }

    /// All invokers, available or not.
    pub fn all(&self) -> Vec<Arc<dyn Invoker>> {
        self.invokers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Directory for StaticDirectory {
    fn url(&self) -> &Url {
        &self.url
    }

    fn interface(&self) -> &str {
        &self.interface
    }

    fn list(&self, _invocation: &RpcInvocation) -> Vec<Arc<dyn Invoker>> {
        self.invokers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|invoker| invoker.is_available())
            .cloned()
            .collect()
    }

    fn is_available(&self) -> bool {
        self.invokers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|invoker| invoker.is_available())
    }
}
