//! Failover cluster invoker.
//!
//! On an infrastructure fault the call is retried on another candidate,
//! up to `retries` extra attempts (per method, default 2). Business faults
//! are returned at once; timeouts too unless `failover.timeout=true` is set
//! for the method.
//!
//! Every attempt after the first lists the directory again. Exclusion of
//! already-tried invokers is by identity, so an invoker that the directory
//! re-creates between attempts is not recognized as tried.

use std::sync::Arc;

use super::{Directory, LoadBalance};
use crate::constants::{DEFAULT_FAILOVER_TIMEOUT, DEFAULT_RETRIES, FAILOVER_TIMEOUT_KEY, RETRIES_KEY};
use crate::rpc::{BoxFuture, Invoker, RpcFault, RpcInvocation, RpcResult};
use crate::url::Url;

/// One logical invoker over a directory's changing candidates.
pub struct FailoverClusterInvoker {
    directory: Arc<dyn Directory>,
    load_balance: Arc<dyn LoadBalance>,
}

impl FailoverClusterInvoker {
    pub fn new(directory: Arc<dyn Directory>, load_balance: Arc<dyn LoadBalance>) -> Self {
        Self {
            directory,
            load_balance,
        }
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    fn no_provider(&self, invocation: &RpcInvocation) -> RpcFault {
        RpcFault::forbidden(format!(
            "No provider available for {}.{}, discovery is {}",
            self.directory.interface(),
            invocation.method_name,
            self.directory.url().address()
        ))
    }

    async fn do_invoke(&self, invocation: &RpcInvocation) -> Result<RpcResult, RpcFault> {
        let method = invocation.method_name.as_str();
        let url = self.directory.url();

        let retries = url.method_parameter_i64(method, RETRIES_KEY, DEFAULT_RETRIES as i64);
        let tries = retries.saturating_add(1).max(1) as usize;
        let failover_timeout = url.method_parameter_bool(method, FAILOVER_TIMEOUT_KEY, DEFAULT_FAILOVER_TIMEOUT);

        let mut candidates = self.directory.list(invocation);
        if candidates.is_empty() {
            return Err(self.no_provider(invocation));
        }

        let mut last_fault: Option<RpcFault> = None;
        let mut invoked: Vec<Arc<dyn Invoker>> = Vec::with_capacity(candidates.len());
        let mut failed: Vec<String> = Vec::with_capacity(tries);

        for attempt in 0..tries {
            if attempt > 0 {
                candidates = self.directory.list(invocation);
            }

            let invoker = match self.load_balance.select(invocation, &candidates, &invoked) {
                Some(invoker) => invoker,
                None => {
                    last_fault = Some(self.no_provider(invocation));
                    continue;
                }
            };
            invoked.push(invoker.clone());

            let outcome = invoker.invoke(invocation).await;
            let fault = match outcome {
                Ok(result) => {
                    if let Some(fault) = &last_fault {
                        tracing::warn!(
                            "Failover for {}.{}, invoked server {}, failed servers [{}] ({}/{}), discovery is {}, last error is: {}",
                            self.directory.interface(),
                            method,
                            invoker.url().address(),
                            failed.join(", "),
                            failed.len(),
                            candidates.len(),
                            url.address(),
                            fault
                        );
                    }
                    return Ok(result);
                }
                Err(fault) => fault,
            };

            let address = invoker.url().address();
            if !failed.contains(&address) {
                failed.push(address);
            }

            if fault.is_business() {
                return Err(fault);
            }
            if fault.is_timeout() && !failover_timeout {
                return Err(fault);
            }
            tracing::debug!(
                attempt = attempt + 1,
                tries,
                server = %invoker.url().address(),
                error = %fault,
                "Invocation failed, trying next provider"
            );
            last_fault = Some(fault);
        }

        let last = last_fault.unwrap_or_else(|| self.no_provider(invocation));
        Err(RpcFault::new(
            last.kind(),
            format!(
                "Failed to invoke {}.{}, failed servers [{}] ({}/{}), discovery is {}, last error is: {}",
                self.directory.interface(),
                method,
                failed.join(", "),
                failed.len(),
                candidates.len(),
                url.address(),
                last.message()
            ),
        )
        .with_cause(last))
    }
}

impl Invoker for FailoverClusterInvoker {
    fn url(&self) -> &Url {
        self.directory.url()
    }

    fn interface(&self) -> &str {
        self.directory.interface()
    }

    fn is_available(&self) -> bool {
        self.directory.is_available()
    }

    fn invoke<'a>(&'a self, invocation: &'a RpcInvocation) -> BoxFuture<'a, Result<RpcResult, RpcFault>> {
        Box::pin(self.do_invoke(invocation))
    }
}
