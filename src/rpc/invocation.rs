//! Invocation and result entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One logical call: method, arguments and string attachments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RpcInvocation {
    /// Method name on the target service.
    pub method_name: String,
    /// Argument values in declaration order.
    pub arguments: Vec<Value>,
    /// Out-of-band key/value data (`path`, `interface`, `version`, ...).
    #[serde(default)]
    pub attachments: BTreeMap<String, String>,
}

impl RpcInvocation {
    pub fn new(method_name: &str, arguments: Vec<Value>) -> Self {
        Self {
            method_name: method_name.to_string(),
            arguments,
            attachments: BTreeMap::new(),
        }
    }

    /// Builder-style attachment setter.
    pub fn with_attachment(mut self, key: &str, value: impl ToString) -> Self {
        self.set_attachment(key, value);
        self
    }

    pub fn set_attachment(&mut self, key: &str, value: impl ToString) {
        self.attachments.insert(key.to_string(), value.to_string());
    }

    /// Set an attachment only if absent.
    pub fn set_attachment_if_absent(&mut self, key: &str, value: impl ToString) {
        self.attachments
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(|s| s.as_str())
    }

    pub fn attachment_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.attachment(key).unwrap_or(default)
    }
}

/// Outcome of a call as seen on the wire.
///
/// A business exception thrown by the remote implementation travels inside
/// the result; the invoker turns it into a business
/// [`RpcFault`](super::RpcFault) for the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RpcResult {
    /// Returned value (`Null` for no value).
    pub value: Value,
    /// Business exception message, if the call failed in user code.
    pub exception: Option<String>,
    #[serde(default)]
    pub attachments: BTreeMap<String, String>,
}

impl RpcResult {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self {
            exception: Some(message.into()),
            ..Self::default()
        }
    }

    #[inline]
    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attachments() {
        let mut inv = RpcInvocation::new("find", vec![json!(1)]).with_attachment("path", "svc");
        inv.set_attachment_if_absent("path", "other");
        inv.set_attachment_if_absent("version", "1.0.0");

        assert_eq!(inv.attachment("path"), Some("svc"));
        assert_eq!(inv.attachment("version"), Some("1.0.0"));
        assert_eq!(inv.attachment_or("group", "default"), "default");
    }

    #[test]
    fn test_result_constructors() {
        assert!(!RpcResult::value(json!("ok")).has_exception());
        let failed = RpcResult::exception("boom");
        assert!(failed.has_exception());
        assert_eq!(failed.value, Value::Null);
    }
}
