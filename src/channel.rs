//! Byte channel identity.
//!
//! The codec only needs to know who is on either side of a stream and which
//! descriptor configures it; the actual I/O lives in the exchange layer.

use std::net::SocketAddr;

use crate::url::Url;

/// Connection-scoped view handed to the codec.
pub trait Channel: Send + Sync {
    /// Descriptor carrying the channel's parameters.
    fn url(&self) -> &Url;

    /// Local endpoint, if known.
    fn local_address(&self) -> Option<SocketAddr>;

    /// Remote endpoint, if known.
    fn remote_address(&self) -> Option<SocketAddr>;
}

/// Plain channel description used by the exchange layer and tests.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    url: Url,
    local: Option<SocketAddr>,
    remote: Option<SocketAddr>,
}

impl ChannelInfo {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            local: None,
            remote: None,
        }
    }

    /// Attach socket addresses.
    pub fn with_addresses(mut self, local: Option<SocketAddr>, remote: Option<SocketAddr>) -> Self {
        self.local = local;
        self.remote = remote;
        self
    }
}

impl Channel for ChannelInfo {
    fn url(&self) -> &Url {
        &self.url
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.local
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.remote
    }
}
