//! Invoker backed by one exchange connection.

use std::sync::Arc;
use std::time::Duration;

use super::{BoxFuture, Invoker, RpcBodyCodec, RpcFault, RpcInvocation, RpcResult};
use crate::constants::{DEFAULT_TIMEOUT_MS, INTERFACE_KEY, PATH_KEY, TIMEOUT_KEY, VERSION_KEY};
use crate::exchange::ExchangeClient;
use crate::protocol::{status, Payload, Response};
use crate::url::Url;

/// Calls one remote service endpoint.
pub struct ChannelInvoker {
    url: Url,
    client: Arc<ExchangeClient<RpcBodyCodec>>,
}

impl ChannelInvoker {
    /// `url` names the service (path, interface, version, per-method
    /// parameters); `client` carries the calls.
    pub fn new(url: Url, client: Arc<ExchangeClient<RpcBodyCodec>>) -> Self {
        Self { url, client }
    }

    async fn do_invoke(&self, invocation: &RpcInvocation) -> Result<RpcResult, RpcFault> {
        let mut invocation = invocation.clone();
        invocation.set_attachment(PATH_KEY, self.url.path());
        invocation.set_attachment_if_absent(INTERFACE_KEY, self.interface());
        if let Some(version) = self.url.parameter(VERSION_KEY) {
            invocation.set_attachment_if_absent(VERSION_KEY, version);
        }

        let timeout_ms = self
            .url
            .method_parameter_u64(&invocation.method_name, TIMEOUT_KEY, DEFAULT_TIMEOUT_MS);
        let response = self
            .client
            .request(Payload::Invocation(invocation), Duration::from_millis(timeout_ms))
            .await?;
        result_of(response)
    }
}

/// Translate a response into the caller-facing outcome.
fn result_of(response: Response) -> Result<RpcResult, RpcFault> {
    let message = response.error_message.unwrap_or_default();
    match response.status {
        status::OK => match response.result {
            Payload::Result(result) if result.has_exception() => {
                Err(RpcFault::business(result.exception.unwrap_or_default()))
            }
            Payload::Result(result) => Ok(result),
            Payload::Value(value) => Ok(RpcResult::value(value)),
            Payload::Empty => Ok(RpcResult::default()),
            other => Err(RpcFault::network(format!(
                "Unexpected {} payload in response {}",
                other.kind(),
                response.id
            ))),
        },
        status::CLIENT_TIMEOUT | status::SERVER_TIMEOUT => Err(RpcFault::timeout(message)),
        status::SERVICE_NOT_FOUND => Err(RpcFault::forbidden(message)),
        other => Err(RpcFault::network(format!("{}: {}", status::name(other), message))),
    }
}

impl Invoker for ChannelInvoker {
    fn url(&self) -> &Url {
        &self.url
    }

    fn is_available(&self) -> bool {
        !self.client.is_closed()
    }

    fn invoke<'a>(&'a self, invocation: &'a RpcInvocation) -> BoxFuture<'a, Result<RpcResult, RpcFault>> {
        Box::pin(self.do_invoke(invocation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::FaultKind;
    use serde_json::json;

    fn response(status: u8) -> Response {
        let mut response = Response::new(1);
        response.status = status;
        response.error_message = Some("detail".into());
        response
    }

    #[test]
    fn test_ok_outcomes() {
        let mut ok = Response::new(1);
        ok.result = Payload::Result(RpcResult::value(json!(5)));
        assert_eq!(result_of(ok).unwrap().value, json!(5));

        let mut business = Response::new(1);
        business.result = Payload::Result(RpcResult::exception("NullPointerException"));
        let fault = result_of(business).unwrap_err();
        assert!(fault.is_business());
        assert_eq!(fault.message(), "NullPointerException");

        assert_eq!(result_of(Response::new(1)).unwrap(), RpcResult::default());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(result_of(response(status::CLIENT_TIMEOUT)).unwrap_err().kind(), FaultKind::Timeout);
        assert_eq!(result_of(response(status::SERVER_TIMEOUT)).unwrap_err().kind(), FaultKind::Timeout);
        assert_eq!(result_of(response(status::SERVICE_NOT_FOUND)).unwrap_err().kind(), FaultKind::Forbidden);

        for status in [status::BAD_REQUEST, status::BAD_RESPONSE, status::SERVICE_ERROR, status::SERVER_ERROR, status::CLIENT_ERROR] {
            let fault = result_of(response(status)).unwrap_err();
            assert_eq!(fault.kind(), FaultKind::Network);
            assert!(fault.message().contains("detail"));
        }
    }
}
