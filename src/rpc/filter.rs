//! Interceptors around invocations.
//!
//! A [`Filter`] receives the next invoker in the chain and decides when (and
//! whether) to call it, so it sees both the invocation going out and the
//! result or fault coming back. [`FilteredInvoker::chain`] stacks filters in
//! order: the first filter is the outermost.

use std::sync::Arc;
use std::time::Instant;

use super::{BoxFuture, Invoker, RpcFault, RpcInvocation, RpcResult};
use crate::constants::FILTER_KEY;
use crate::extension::ExtensionRegistry;
use crate::url::Url;

/// Invocation interceptor.
pub trait Filter: Send + Sync {
    /// Run around `next`. Implementations normally call `next.invoke(invocation)`.
    fn invoke<'a>(
        &'a self,
        next: &'a dyn Invoker,
        invocation: &'a RpcInvocation,
    ) -> BoxFuture<'a, Result<RpcResult, RpcFault>>;
}

/// One link of a filter chain.
pub struct FilteredInvoker {
    filter: Arc<dyn Filter>,
    next: Arc<dyn Invoker>,
}

impl FilteredInvoker {
    pub fn new(filter: Arc<dyn Filter>, next: Arc<dyn Invoker>) -> Self {
        Self { filter, next }
    }

    /// Wrap `invoker` in `filters`, first filter outermost.
    pub fn chain(invoker: Arc<dyn Invoker>, filters: &[Arc<dyn Filter>]) -> Arc<dyn Invoker> {
        filters.iter().rev().fold(invoker, |next, filter| {
            Arc::new(FilteredInvoker::new(filter.clone(), next)) as Arc<dyn Invoker>
        })
    }
}

impl Invoker for FilteredInvoker {
    fn url(&self) -> &Url {
        self.next.url()
    }

    fn interface(&self) -> &str {
        self.next.interface()
    }

    fn is_available(&self) -> bool {
        self.next.is_available()
    }

    fn invoke<'a>(&'a self, invocation: &'a RpcInvocation) -> BoxFuture<'a, Result<RpcResult, RpcFault>> {
        self.filter.invoke(self.next.as_ref(), invocation)
    }
}

/// Logs every call with its duration and outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLogFilter;

impl AccessLogFilter {
    pub const NAME: &'static str = "accesslog";
}

impl Filter for AccessLogFilter {
    fn invoke<'a>(
        &'a self,
        next: &'a dyn Invoker,
        invocation: &'a RpcInvocation,
    ) -> BoxFuture<'a, Result<RpcResult, RpcFault>> {
        Box::pin(async move {
            let started = Instant::now();
            let outcome = next.invoke(invocation).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                Ok(_) => tracing::debug!(
                    service = %next.interface(),
                    method = %invocation.method_name,
                    server = %next.url().address(),
                    elapsed_ms,
                    "Invocation succeeded"
                ),
                Err(fault) => tracing::debug!(
                    service = %next.interface(),
                    method = %invocation.method_name,
                    server = %next.url().address(),
                    elapsed_ms,
                    kind = %fault.kind(),
                    error = %fault,
                    "Invocation failed"
                ),
            }
            outcome
        })
    }
}

/// Registry with the built-in filters.
pub fn default_filters() -> ExtensionRegistry<dyn Filter> {
    let mut registry: ExtensionRegistry<dyn Filter> = ExtensionRegistry::new();
    registry.register(AccessLogFilter::NAME, Arc::new(AccessLogFilter));
    registry
}

/// Filters named on `url` (`filter=a,b`), in order. Unknown names are skipped.
pub fn filters_for(registry: &ExtensionRegistry<dyn Filter>, url: &Url) -> Vec<Arc<dyn Filter>> {
    let Some(names) = url.parameter(FILTER_KEY) else {
        return Vec::new();
    };
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let filter = registry.get(name);
            if filter.is_none() {
                tracing::warn!(filter = name, "Unknown filter, skipping");
            }
            filter
        })
        .collect()
}
