//! Connection descriptor.
//!
//! A [`Url`] identifies an endpoint and carries its configuration as
//! string parameters:
//!
//! ```text
//! dabb://10.0.0.7:20880/com.example.Greeter?retries=3&sayHello.timeout=500
//! ```
//!
//! Method-scoped parameters are written as `<method>.<key>` and take
//! precedence over the plain `<key>` when read through the
//! `method_parameter*` accessors.
//!
//! # Example
//!
//! ```
//! use dabb_rpc::Url;
//!
//! let url: Url = "dabb://127.0.0.1:20880/greeter?retries=3&hello.retries=0"
//!     .parse()
//!     .unwrap();
//! assert_eq!(url.address(), "127.0.0.1:20880");
//! assert_eq!(url.method_parameter_u32("hello", "retries", 2), 0);
//! assert_eq!(url.method_parameter_u32("bye", "retries", 2), 3);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{RemoteError, Result};

/// Immutable endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    protocol: String,
    host: String,
    port: u16,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl Url {
    /// Create a descriptor without parameters.
    pub fn new(protocol: &str, host: &str, port: u16, path: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
            path: path.trim_start_matches('/').to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Return a copy with one more parameter.
    pub fn with_parameter(mut self, key: &str, value: impl ToString) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }

    /// Return a copy with a method-scoped parameter.
    pub fn with_method_parameter(self, method: &str, key: &str, value: impl ToString) -> Self {
        self.with_parameter(&format!("{}.{}", method, key), value)
    }

    #[inline]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port`, used in diagnostics and failover bookkeeping.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// All parameters, ordered by key.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Raw parameter value.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(|s| s.as_str())
    }

    /// Parameter value or a default.
    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameter(key).filter(|v| !v.is_empty()).unwrap_or(default)
    }

    /// Numeric parameter; unparseable values fall back to the default.
    pub fn parameter_usize(&self, key: &str, default: usize) -> usize {
        parse_or(self.parameter(key), default)
    }

    /// Numeric parameter; unparseable values fall back to the default.
    pub fn parameter_u64(&self, key: &str, default: u64) -> u64 {
        parse_or(self.parameter(key), default)
    }

    /// Parameter value for a method, falling back to the plain key.
    pub fn method_parameter(&self, method: &str, key: &str) -> Option<&str> {
        self.parameters
            .get(&format!("{}.{}", method, key))
            .or_else(|| self.parameters.get(key))
            .map(|s| s.as_str())
    }

    pub fn method_parameter_u32(&self, method: &str, key: &str, default: u32) -> u32 {
        parse_or(self.method_parameter(method, key), default)
    }

    pub fn method_parameter_i64(&self, method: &str, key: &str, default: i64) -> i64 {
        parse_or(self.method_parameter(method, key), default)
    }

    pub fn method_parameter_u64(&self, method: &str, key: &str, default: u64) -> u64 {
        parse_or(self.method_parameter(method, key), default)
    }

    pub fn method_parameter_bool(&self, method: &str, key: &str, default: bool) -> bool {
        parse_or(self.method_parameter(method, key), default)
    }
}

fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}/{}", self.protocol, self.host, self.port, self.path)?;
        let mut sep = '?';
        for (key, value) in &self.parameters {
            write!(f, "{}{}={}", sep, key, value)?;
            sep = '&';
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RemoteError::InvalidUrl(s.to_string());

        let (protocol, rest) = s.split_once("://").ok_or_else(invalid)?;
        if protocol.is_empty() {
            return Err(invalid());
        }

        let (rest, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (authority, 0),
        };
        if host.is_empty() {
            return Err(invalid());
        }

        let mut url = Url::new(protocol, host, port, path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                url.parameters.insert(key.to_string(), value.to_string());
            }
        }
        Ok(url)
    }
}
