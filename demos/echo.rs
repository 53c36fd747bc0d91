//! Echo service - server and client in one process over TCP.
//!
//! This example demonstrates:
//! - Registering a typed method handler in a [`ServiceRegistry`]
//! - Serving it with an [`ExchangeServer`] on every accepted connection
//! - Calling it through a [`ChannelInvoker`] with the access log filter
//!
//! ```text
//! cargo run --example echo
//! ```

use std::sync::Arc;

use dabb_rpc::exchange::{ExchangeClient, ExchangeConfig, ExchangeServer};
use dabb_rpc::handler::ServiceRegistry;
use dabb_rpc::protocol::SessionCodec;
use dabb_rpc::rpc::{default_filters, filters_for, ChannelInvoker, FilteredInvoker, Invoker, RpcBodyCodec, RpcInvocation};
use dabb_rpc::serialization::SerializationRegistry;
use dabb_rpc::Url;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};

const SERVICE: &str = "com.example.Echo";

/// Input structure for the echo method.
#[derive(Deserialize, Debug)]
struct EchoInput {
    message: String,
}

/// Output structure for the echo method.
#[derive(Serialize, Debug)]
struct EchoOutput {
    echo: String,
}

fn codec() -> Arc<SessionCodec<RpcBodyCodec>> {
    Arc::new(SessionCodec::with_body(
        Arc::new(SerializationRegistry::with_defaults()),
        RpcBodyCodec,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let url: Url = format!("dabb://127.0.0.1:{}/{}?filter=accesslog&echo.timeout=2000", port, SERVICE).parse()?;

    let mut registry = ServiceRegistry::new();
    registry.register(SERVICE, "echo", |(input,): (EchoInput,)| async move {
        if input.message.is_empty() {
            return Err("empty message");
        }
        Ok(EchoOutput { echo: input.message })
    });

    let server = Arc::new(ExchangeServer::new(url.clone(), codec(), Arc::new(registry)));
    tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    eprintln!("accept failed: {}", e);
                    return;
                }
            };
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(e) = server.serve(stream).await {
                    eprintln!("connection from {} closed: {}", peer, e);
                }
            });
        }
    });

    let stream = TcpStream::connect(url.address()).await?;
    let client = Arc::new(ExchangeClient::connect(stream, url.clone(), codec(), ExchangeConfig::default()));
    let invoker = FilteredInvoker::chain(
        Arc::new(ChannelInvoker::new(url.clone(), client)) as Arc<dyn Invoker>,
        &filters_for(&default_filters(), &url),
    );

    for message in ["hello", "dabb", ""] {
        let invocation = RpcInvocation::new("echo", vec![serde_json::json!({ "message": message })]);
        match invoker.invoke(&invocation).await {
            Ok(result) => println!("echo({:?}) -> {}", message, result.value),
            Err(fault) => println!("echo({:?}) failed ({}): {}", message, fault.kind(), fault.message()),
        }
    }

    Ok(())
}
