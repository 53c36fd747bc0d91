//! RPC entities and the remote invoker.
//!
//! - [`RpcInvocation`] / [`RpcResult`] - one call and its outcome
//! - [`RpcFault`] - invocation failure classified by [`FaultKind`]
//! - [`Invoker`] - anything that can perform a call
//! - [`ChannelInvoker`] - invoker over an [`ExchangeClient`](crate::exchange::ExchangeClient)
//! - [`RpcBodyCodec`] - frame body layout for calls and results
//! - [`Filter`] / [`FilteredInvoker`] - interceptors around an invoker

mod body;
mod fault;
mod filter;
mod invocation;
mod invoker;
mod remote;

pub use body::{RpcBodyCodec, RESPONSE_NULL_VALUE, RESPONSE_VALUE, RESPONSE_WITH_EXCEPTION};
pub use fault::{FaultCause, FaultKind, RpcFault};
pub use filter::{default_filters, filters_for, AccessLogFilter, Filter, FilteredInvoker};
pub use invocation::{RpcInvocation, RpcResult};
pub use invoker::{contains_invoker, same_invoker, BoxFuture, Invoker};
pub use remote::ChannelInvoker;
