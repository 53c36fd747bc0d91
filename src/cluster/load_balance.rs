//! Selection strategies over candidate invokers.
//!
//! Every strategy skips invokers that were already tried for the current
//! call. Only when every candidate has been tried does it choose among the
//! full list again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::{DEFAULT_LOADBALANCE, LOADBALANCE_KEY};
use crate::extension::ExtensionRegistry;
use crate::rpc::{contains_invoker, Invoker, RpcInvocation};
use crate::url::Url;

/// Picks one invoker for a call.
pub trait LoadBalance: Send + Sync {
    /// Choose among `pool`, which is never empty.
    fn pick(&self, invocation: &RpcInvocation, pool: &[Arc<dyn Invoker>]) -> Arc<dyn Invoker>;

    /// Choose among `candidates`, avoiding `excluded` when possible.
    fn select(
        &self,
        invocation: &RpcInvocation,
        candidates: &[Arc<dyn Invoker>],
        excluded: &[Arc<dyn Invoker>],
    ) -> Option<Arc<dyn Invoker>> {
        match candidates.len() {
            0 => None,
            1 => Some(candidates[0].clone()),
            _ => {
                let remaining: Vec<Arc<dyn Invoker>> = candidates
                    .iter()
                    .filter(|candidate| !contains_invoker(excluded, candidate))
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    Some(self.pick(invocation, candidates))
                } else {
                    Some(self.pick(invocation, &remaining))
                }
            }
        }
    }
}

/// Rotates through the pool.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalance {
    next: AtomicUsize,
}

impl RoundRobinLoadBalance {
    pub const NAME: &'static str = "roundrobin";

    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalance for RoundRobinLoadBalance {
    fn pick(&self, _invocation: &RpcInvocation, pool: &[Arc<dyn Invoker>]) -> Arc<dyn Invoker> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % pool.len();
        pool[index].clone()
    }
}

/// Uniformly random choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLoadBalance;

impl RandomLoadBalance {
    pub const NAME: &'static str = "random";
}

impl LoadBalance for RandomLoadBalance {
    fn pick(&self, _invocation: &RpcInvocation, pool: &[Arc<dyn Invoker>]) -> Arc<dyn Invoker> {
        pool[fastrand::usize(..pool.len())].clone()
    }
}

/// Registry with the built-in strategies.
pub fn default_load_balances() -> ExtensionRegistry<dyn LoadBalance> {
    let mut registry: ExtensionRegistry<dyn LoadBalance> = ExtensionRegistry::new();
    registry.register(RoundRobinLoadBalance::NAME, Arc::new(RoundRobinLoadBalance::new()));
    registry.register(RandomLoadBalance::NAME, Arc::new(RandomLoadBalance));
    registry
}

/// Strategy configured on `url` (`loadbalance=<name>`), falling back to the default.
pub fn load_balance_for(registry: &ExtensionRegistry<dyn LoadBalance>, url: &Url) -> Option<Arc<dyn LoadBalance>> {
    registry.get_or(url.parameter_or(LOADBALANCE_KEY, DEFAULT_LOADBALANCE), DEFAULT_LOADBALANCE)
}
