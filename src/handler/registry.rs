//! Service registry dispatching invocations by service path and method.
//!
//! Arguments arrive as a JSON-like value list and are deserialized into the
//! handler's argument type as a sequence, so a handler taking `(String, u32)`
//! receives the first two arguments. Handlers with no arguments take `()`.
//!
//! # Example
//!
//! ```ignore
//! use dabb_rpc::handler::ServiceRegistry;
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register("com.example.Greeter", "sayHello", |(name,): (String,)| async move {
//!     Ok::<_, String>(format!("Hello, {}", name))
//! });
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::channel::Channel;
use crate::constants::{INTERFACE_KEY, PATH_KEY};
use crate::error::ServiceError;
use crate::exchange::ExchangeHandler;
use crate::protocol::Payload;
use crate::rpc::{BoxFuture, RpcInvocation, RpcResult};

/// Result type for handler functions.
pub type HandlerResult = Result<RpcResult, ServiceError>;

/// Trait for service method implementations.
pub trait Handler: Send + Sync + 'static {
    /// Handle one invocation.
    fn call(&self, invocation: RpcInvocation) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that deserializes arguments and serializes the return value.
///
/// An `Err` from the wrapped function is a business exception: it reaches
/// the caller inside an OK response.
pub struct TypedHandler<F, T, R, E, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> (Fut, R, E)>,
}

impl<F, T, R, E, Fut> TypedHandler<F, T, R, E, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

fn decode_arguments<T: DeserializeOwned>(arguments: Vec<Value>) -> Result<T, serde_json::Error> {
    let empty = arguments.is_empty();
    match serde_json::from_value(Value::Array(arguments)) {
        Ok(args) => Ok(args),
        // `()` deserializes from null, not from an empty sequence.
        Err(_) if empty => serde_json::from_value(Value::Null),
        Err(e) => Err(e),
    }
}

impl<F, T, R, E, Fut> Handler for TypedHandler<F, T, R, E, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    fn call(&self, invocation: RpcInvocation) -> BoxFuture<'static, HandlerResult> {
        let method = invocation.method_name;
        let parsed: T = match decode_arguments(invocation.arguments) {
            Ok(v) => v,
            Err(e) => {
                let error = ServiceError::Failed(format!("Failed to decode arguments of {}: {}", method, e));
                return Box::pin(async move { Err(error) });
            }
        };

        let fut = (self.handler)(parsed);
        Box::pin(async move {
            match fut.await {
                Ok(value) => serde_json::to_value(value)
                    .map(RpcResult::value)
                    .map_err(|e| ServiceError::Failed(format!("Failed to encode result of {}: {}", method, e))),
                Err(e) => Ok(RpcResult::exception(e.to_string())),
            }
        })
    }
}

/// Registry mapping service paths and method names to handlers.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, HashMap<String, Box<dyn Handler>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method handler under `service`.
    ///
    /// Registering the same method twice replaces the earlier handler.
    pub fn register<F, T, R, E, Fut>(&mut self, service: &str, method: &str, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.register_handler(service, method, Box::new(TypedHandler::new(handler)));
    }

    /// Register an already boxed handler.
    pub fn register_handler(&mut self, service: &str, method: &str, handler: Box<dyn Handler>) {
        self.services
            .entry(service.to_string())
            .or_default()
            .insert(method.to_string(), handler);
    }

    pub fn get_handler(&self, service: &str, method: &str) -> Option<&dyn Handler> {
        self.services
            .get(service)
            .and_then(|methods| methods.get(method))
            .map(|h| h.as_ref())
    }

    pub fn contains_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Registered service paths, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Dispatch an invocation to its handler.
    ///
    /// The service is named by the `path` attachment, or `interface` when
    /// no path was sent.
    pub async fn dispatch(&self, invocation: RpcInvocation) -> HandlerResult {
        let service = invocation
            .attachment(PATH_KEY)
            .or_else(|| invocation.attachment(INTERFACE_KEY))
            .unwrap_or_default()
            .to_string();

        let methods = self
            .services
            .get(&service)
            .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", service)))?;
        let handler = methods.get(&invocation.method_name).ok_or_else(|| {
            ServiceError::NotFound(format!("Method {} not found in service {}", invocation.method_name, service))
        })?;

        handler.call(invocation).await
    }
}

impl ExchangeHandler for ServiceRegistry {
    fn reply<'a>(&'a self, channel: &'a dyn Channel, data: Payload) -> BoxFuture<'a, Result<Payload, ServiceError>> {
        Box::pin(async move {
            match data {
                Payload::Invocation(invocation) => {
                    tracing::trace!(
                        method = %invocation.method_name,
                        remote = ?channel.remote_address(),
                        "Dispatching invocation"
                    );
                    self.dispatch(invocation).await.map(Payload::Result)
                }
                other => Err(ServiceError::Failed(format!(
                    "Unsupported request payload: {}",
                    other.kind()
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelInfo;
    use crate::url::Url;
    use serde_json::json;

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.register("greeter", "sayHello", |(name,): (String,)| async move {
            Ok::<_, String>(format!("Hello, {}", name))
        });
        registry.register("greeter", "add", |(a, b): (i64, i64)| async move { Ok::<_, String>(a + b) });
        registry.register("greeter", "ping", |_: ()| async { Ok::<_, String>("pong") });
        registry.register("greeter", "fail", |_: ()| async { Err::<(), _>("boom") });
        registry
    }

    fn call(method: &str, arguments: Vec<Value>) -> RpcInvocation {
        RpcInvocation::new(method, arguments).with_attachment(PATH_KEY, "greeter")
    }

    #[tokio::test]
    async fn test_dispatch_typed() {
        let registry = registry();

        let result = registry.dispatch(call("sayHello", vec![json!("world")])).await.unwrap();
        assert_eq!(result.value, json!("Hello, world"));

        let result = registry.dispatch(call("add", vec![json!(2), json!(40)])).await.unwrap();
        assert_eq!(result.value, json!(42));

        let result = registry.dispatch(call("ping", vec![])).await.unwrap();
        assert_eq!(result.value, json!("pong"));
    }

    #[tokio::test]
    async fn test_handler_error_is_business_exception() {
        let result = registry().dispatch(call("fail", vec![])).await.unwrap();
        assert_eq!(result.exception.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let registry = registry();

        let err = registry.dispatch(call("missing", vec![])).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let other = RpcInvocation::new("sayHello", vec![]).with_attachment(PATH_KEY, "nope");
        let err = registry.dispatch(other).await.unwrap_err();
        assert_eq!(err.to_string(), "Service nope not found");
    }

    #[tokio::test]
    async fn test_interface_used_without_path() {
        let inv = RpcInvocation::new("sayHello", vec![json!("x")]).with_attachment(INTERFACE_KEY, "greeter");
        assert_eq!(registry().dispatch(inv).await.unwrap().value, json!("Hello, x"));
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let err = registry()
            .dispatch(call("add", vec![json!("two"), json!(2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Failed(ref m) if m.starts_with("Failed to decode arguments of add")));
    }

    #[tokio::test]
    async fn test_exchange_reply() {
        let registry = registry();
        let channel = ChannelInfo::new(Url::new("dabb", "127.0.0.1", 20880, ""));

        let reply = registry
            .reply(&channel, Payload::Invocation(call("sayHello", vec![json!("dabb")])))
            .await
            .unwrap();
        assert_eq!(reply, Payload::Result(RpcResult::value(json!("Hello, dabb"))));

        let err = registry.reply(&channel, Payload::Value(json!(1))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Failed(_)));
    }

    #[test]
    fn test_services_sorted() {
        let mut registry = registry();
        registry.register("audit", "log", |_: ()| async { Ok::<_, String>(()) });

        assert_eq!(registry.services(), vec!["audit", "greeter"]);
        assert!(registry.contains_service("audit"));
        assert!(registry.get_handler("greeter", "add").is_some());
        assert!(registry.get_handler("greeter", "sub").is_none());
    }
}
