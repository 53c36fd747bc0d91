//! Server-side service implementations.
//!
//! Provides:
//! - [`ServiceRegistry`] - maps service paths and method names to handlers
//! - [`TypedHandler`] - adapts a typed async function to [`Handler`]
//!
//! The registry implements [`ExchangeHandler`](crate::exchange::ExchangeHandler)
//! and plugs straight into an [`ExchangeServer`](crate::exchange::ExchangeServer).

mod registry;

pub use registry::{Handler, HandlerResult, ServiceRegistry, TypedHandler};
