//! The invoker abstraction shared by single endpoints and clusters.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::{RpcFault, RpcInvocation, RpcResult};
use crate::constants::INTERFACE_KEY;
use crate::url::Url;

/// Boxed future returned by invokers and handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executes calls against one endpoint (or a cluster of them).
pub trait Invoker: Send + Sync {
    /// Descriptor of the endpoint.
    fn url(&self) -> &Url;

    /// Service interface name, from the `interface` parameter or the path.
    fn interface(&self) -> &str {
        let url = self.url();
        url.parameter(INTERFACE_KEY).unwrap_or_else(|| url.path())
    }

    /// Whether the invoker can currently take calls.
    fn is_available(&self) -> bool {
        true
    }

    /// Perform one call.
    fn invoke<'a>(&'a self, invocation: &'a RpcInvocation) -> BoxFuture<'a, Result<RpcResult, RpcFault>>;
}

/// Identity comparison of two invokers.
///
/// Two handles are the same invoker only if they point at the same
/// allocation; equal URLs are not enough.
#[inline]
pub fn same_invoker(a: &Arc<dyn Invoker>, b: &Arc<dyn Invoker>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Whether `invoker` is one of `set`, by identity.
pub fn contains_invoker(set: &[Arc<dyn Invoker>], invoker: &Arc<dyn Invoker>) -> bool {
    set.iter().any(|candidate| same_invoker(candidate, invoker))
}
