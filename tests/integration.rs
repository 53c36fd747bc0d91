//! End-to-end tests: invokers and clients talking to a service registry
//! over in-memory duplex streams.

use std::sync::Arc;
use std::time::Duration;

use dabb_rpc::buffer::ChannelBuffer;
use dabb_rpc::channel::ChannelInfo;
use dabb_rpc::cluster::{default_load_balances, load_balance_for, FailoverClusterInvoker, StaticDirectory};
use dabb_rpc::constants::{FILTER_KEY, RETRIES_KEY, TIMEOUT_KEY};
use dabb_rpc::exchange::{ExchangeClient, ExchangeConfig, ExchangeServer};
use dabb_rpc::handler::ServiceRegistry;
use dabb_rpc::protocol::{flags, status, DecodeResult, FrameHeader, Payload, SessionCodec};
use dabb_rpc::rpc::{
    default_filters, filters_for, ChannelInvoker, FaultKind, FilteredInvoker, Invoker, RpcBodyCodec, RpcInvocation,
};
use dabb_rpc::serialization::{MsgPackSerialization, SerializationRegistry};
use dabb_rpc::Url;
use serde_json::json;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

const GREETER: &str = "com.example.Greeter";

fn codec() -> Arc<SessionCodec<RpcBodyCodec>> {
    Arc::new(SessionCodec::with_body(
        Arc::new(SerializationRegistry::with_defaults()),
        RpcBodyCodec,
    ))
}

fn provider_url(port: u16) -> Url {
    Url::new("dabb", "127.0.0.1", port, GREETER)
}

fn greeter() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry.register(GREETER, "sayHello", |(name,): (String,)| async move {
        Ok::<_, String>(format!("Hello, {}", name))
    });
    registry.register(GREETER, "divide", |(a, b): (i64, i64)| async move {
        if b == 0 {
            Err("division by zero".to_string())
        } else {
            Ok(a / b)
        }
    });
    registry.register(GREETER, "sleep", |(ms,): (u64,)| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, String>(ms)
    });
    registry
}

/// Serve `registry` on one end of a duplex stream and return the other end.
fn serve(url: Url, registry: ServiceRegistry) -> DuplexStream {
    let (client_io, server_io) = duplex(64 * 1024);
    let server = ExchangeServer::new(url, codec(), Arc::new(registry));
    tokio::spawn(async move {
        let _ = server.serve(server_io).await;
    });
    client_io
}

fn connect(url: Url, registry: ServiceRegistry) -> Arc<ExchangeClient<RpcBodyCodec>> {
    let io = serve(url.clone(), registry);
    Arc::new(ExchangeClient::connect(io, url, codec(), ExchangeConfig::default()))
}

#[tokio::test]
async fn test_invoke_round_trip() {
    let url = provider_url(20880);
    let invoker = ChannelInvoker::new(url.clone(), connect(url, greeter()));

    let result = invoker
        .invoke(&RpcInvocation::new("sayHello", vec![json!("world")]))
        .await
        .unwrap();
    assert_eq!(result.value, json!("Hello, world"));

    let result = invoker
        .invoke(&RpcInvocation::new("divide", vec![json!(84), json!(2)]))
        .await
        .unwrap();
    assert_eq!(result.value, json!(42));
    assert!(invoker.is_available());
}

#[tokio::test]
async fn test_filtered_channel_invoker() {
    let url = provider_url(20880).with_parameter(FILTER_KEY, "accesslog");
    let channel_invoker: Arc<dyn Invoker> = Arc::new(ChannelInvoker::new(url.clone(), connect(url.clone(), greeter())));
    let invoker = FilteredInvoker::chain(channel_invoker, &filters_for(&default_filters(), &url));

    let result = invoker
        .invoke(&RpcInvocation::new("sayHello", vec![json!("filtered")]))
        .await
        .unwrap();
    assert_eq!(result.value, json!("Hello, filtered"));

    let fault = invoker
        .invoke(&RpcInvocation::new("divide", vec![json!(1), json!(0)]))
        .await
        .unwrap_err();
    assert!(fault.is_business());
}

#[tokio::test]
async fn test_invoke_over_json() {
    let url = provider_url(20880).with_parameter("serialization", "json");
    let invoker = ChannelInvoker::new(url.clone(), connect(url, greeter()));

    let result = invoker
        .invoke(&RpcInvocation::new("sayHello", vec![json!("json")]))
        .await
        .unwrap();
    assert_eq!(result.value, json!("Hello, json"));
}

#[tokio::test]
async fn test_business_exception() {
    let url = provider_url(20880);
    let invoker = ChannelInvoker::new(url.clone(), connect(url, greeter()));

    let fault = invoker
        .invoke(&RpcInvocation::new("divide", vec![json!(1), json!(0)]))
        .await
        .unwrap_err();
    assert!(fault.is_business());
    assert_eq!(fault.message(), "division by zero");
}

#[tokio::test]
async fn test_unknown_method_and_bad_arguments() {
    let url = provider_url(20880);
    let invoker = ChannelInvoker::new(url.clone(), connect(url, greeter()));

    let fault = invoker
        .invoke(&RpcInvocation::new("sayGoodbye", vec![]))
        .await
        .unwrap_err();
    assert_eq!(fault.kind(), FaultKind::Forbidden);

    let fault = invoker
        .invoke(&RpcInvocation::new("divide", vec![json!("a"), json!("b")]))
        .await
        .unwrap_err();
    assert_eq!(fault.kind(), FaultKind::Network);
    assert!(fault.message().starts_with("SERVICE_ERROR"));
}

#[tokio::test]
async fn test_client_timeout() {
    let url = provider_url(20880).with_method_parameter("sleep", TIMEOUT_KEY, 50);
    let client = connect(url.clone(), greeter());
    let invoker = ChannelInvoker::new(url, client.clone());

    let fault = invoker
        .invoke(&RpcInvocation::new("sleep", vec![json!(2_000)]))
        .await
        .unwrap_err();
    assert!(fault.is_timeout());
    assert_eq!(client.pending_requests(), 0);

    // The connection stays usable after a timed-out call.
    let result = invoker
        .invoke(&RpcInvocation::new("sayHello", vec![json!("again")]))
        .await
        .unwrap();
    assert_eq!(result.value, json!("Hello, again"));
}

#[tokio::test]
async fn test_heartbeat_echo() {
    let client = connect(provider_url(20880), greeter());

    let response = client.heartbeat(Duration::from_secs(2)).await.unwrap();
    assert_eq!(response.status, status::OK);
    assert!(response.event);
    assert_eq!(response.result, Payload::Value(serde_json::Value::Null));
}

#[tokio::test]
async fn test_broken_request_gets_bad_request() {
    let url = provider_url(20880);
    let mut io = serve(url.clone(), greeter());

    // 0xc1 is never a valid MessagePack marker.
    let body = [0xc1u8, 0x00, 0x00];
    let header = FrameHeader::new(
        flags::request(true, false, MsgPackSerialization::ID),
        0,
        77,
        body.len() as u32,
    );
    io.write_all(&header.encode()).await.unwrap();
    io.write_all(&body).await.unwrap();

    let codec = codec();
    let channel = ChannelInfo::new(url);
    let mut buffer = ChannelBuffer::new();
    let mut chunk = [0u8; 1024];
    let response = loop {
        match codec.decode(&channel, &mut buffer).unwrap() {
            DecodeResult::Response(response) => break response,
            DecodeResult::NeedMoreInput => {
                let n = io.read(&mut chunk).await.unwrap();
                assert!(n > 0, "server closed the connection");
                buffer.write_bytes(&chunk[..n]);
            }
            other => panic!("unexpected {:?}", other),
        }
    };

    assert_eq!(response.id, 77);
    assert_eq!(response.status, status::BAD_REQUEST);
    assert!(response
        .error_message
        .unwrap()
        .starts_with("Fail to decode request due to: "));
}

#[tokio::test]
async fn test_failover_across_providers() {
    // The first provider does not export the service; the second does.
    let first_url = provider_url(20881);
    let second_url = provider_url(20882);
    let first = Arc::new(ChannelInvoker::new(first_url.clone(), connect(first_url, ServiceRegistry::new())));
    let second = Arc::new(ChannelInvoker::new(second_url.clone(), connect(second_url, greeter())));

    let directory_url = Url::new("static", "registry.local", 2181, GREETER).with_parameter(RETRIES_KEY, 1);
    let load_balance = load_balance_for(&default_load_balances(), &directory_url).unwrap();
    let directory = Arc::new(StaticDirectory::new(
        directory_url,
        GREETER,
        vec![first.clone() as Arc<dyn Invoker>, second.clone()],
    ));
    let cluster = FailoverClusterInvoker::new(directory, load_balance);

    for name in ["a", "b", "c"] {
        let result = cluster
            .invoke(&RpcInvocation::new("sayHello", vec![json!(name)]))
            .await
            .unwrap();
        assert_eq!(result.value, json!(format!("Hello, {}", name)));
    }
}

#[tokio::test]
async fn test_failover_exhausted() {
    let urls = [provider_url(20881), provider_url(20882)];
    let invokers: Vec<Arc<dyn Invoker>> = urls
        .iter()
        .map(|url| Arc::new(ChannelInvoker::new(url.clone(), connect(url.clone(), ServiceRegistry::new()))) as Arc<dyn Invoker>)
        .collect();

    let directory_url = Url::new("static", "registry.local", 2181, GREETER);
    let load_balance = load_balance_for(&default_load_balances(), &directory_url).unwrap();
    let cluster = FailoverClusterInvoker::new(
        Arc::new(StaticDirectory::new(directory_url, GREETER, invokers)),
        load_balance,
    );

    let fault = cluster
        .invoke(&RpcInvocation::new("sayHello", vec![json!("nobody")]))
        .await
        .unwrap_err();
    assert_eq!(fault.kind(), FaultKind::Forbidden);
    assert!(fault.message().starts_with(&format!("Failed to invoke {}.sayHello", GREETER)));
    assert!(fault.message().contains("(2/2)"));
}
