//! # dabb-rpc
//!
//! Binary RPC framework over byte streams.
//!
//! ## Architecture
//!
//! - **Protocol**: 16-byte frame header (magic `0xDABB`) with pluggable
//!   body serialization, resynchronization on garbage and partial input
//! - **Exchange**: request/response correlation, heartbeats and timeouts
//!   over any `AsyncRead + AsyncWrite` stream
//! - **RPC**: invocations, results and faults, plus the remote invoker
//! - **Cluster**: failover across providers with pluggable load balancing
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dabb_rpc::exchange::{ExchangeClient, ExchangeConfig};
//! use dabb_rpc::protocol::SessionCodec;
//! use dabb_rpc::rpc::{ChannelInvoker, Invoker, RpcBodyCodec, RpcInvocation};
//! use dabb_rpc::serialization::SerializationRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let url: dabb_rpc::Url = "dabb://127.0.0.1:20880/com.example.Greeter?timeout=3000".parse()?;
//!     let stream = tokio::net::TcpStream::connect(url.address()).await?;
//!     let codec = Arc::new(SessionCodec::with_body(
//!         Arc::new(SerializationRegistry::with_defaults()),
//!         RpcBodyCodec,
//!     ));
//!     let client = Arc::new(ExchangeClient::connect(stream, url.clone(), codec, ExchangeConfig::default()));
//!
//!     let invoker = ChannelInvoker::new(url, client);
//!     let result = invoker
//!         .invoke(&RpcInvocation::new("sayHello", vec!["world".into()]))
//!         .await?;
//!     println!("{}", result.value);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod channel;
pub mod cluster;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod extension;
pub mod handler;
pub mod protocol;
pub mod rpc;
pub mod serialization;
pub mod url;

pub use error::{RemoteError, ServiceError};
pub use rpc::{FaultKind, RpcFault, RpcInvocation, RpcResult};
pub use url::Url;
