//! Cluster layer: one logical invoker over many providers.
//!
//! - [`Directory`] lists candidate invokers for a service
//! - [`LoadBalance`] picks one of them, avoiding those already tried
//! - [`FailoverClusterInvoker`] retries infrastructure faults on other providers

mod directory;
mod failover;
mod load_balance;

pub use directory::{Directory, StaticDirectory};
pub use failover::FailoverClusterInvoker;
pub use load_balance::{
    default_load_balances, load_balance_for, LoadBalance, RandomLoadBalance, RoundRobinLoadBalance,
};
