//! Exchange layer - request/response correlation over async byte streams.
//!
//! - [`ExchangeClient`] - sends requests and matches responses by id
//! - [`ExchangeServer`] - decodes requests and replies through an [`ExchangeHandler`]
//! - [`WriterHandle`] - queue in front of the task that owns the write half
//!
//! Both sides run one read loop per connection. The loop owns the
//! connection's [`ChannelBuffer`](crate::buffer::ChannelBuffer), appends
//! every read to it and decodes until the codec asks for more input.

mod client;
mod server;
mod writer;

use crate::buffer::ChannelBuffer;
use crate::channel::Channel;
use crate::error::Result;
use crate::protocol::{BodyCodec, Message, Request, Response, SessionCodec};

pub use client::ExchangeClient;
pub use server::{ExchangeHandler, ExchangeServer};
pub use writer::{spawn_writer_task, WriterHandle};

/// Default writer channel capacity (frames).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default read chunk size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default maximum concurrently running server handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Connection tuning shared by clients and servers.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Frames that may wait for the writer task.
    pub channel_capacity: usize,
    /// Bytes requested from the stream per read.
    pub read_buffer_size: usize,
    /// Server requests handled at once; excess requests are rejected.
    pub max_concurrent_handlers: usize,
}

impl ExchangeConfig {
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.max_concurrent_handlers = limit;
        self
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
        }
    }
}

/// Encode one message into a standalone frame and queue it.
async fn write_message<B: BodyCodec>(
    codec: &SessionCodec<B>,
    channel: &dyn Channel,
    writer: &WriterHandle,
    message: Message,
) -> Result<()> {
    let mut buffer = ChannelBuffer::new();
    codec.encode(channel, &mut buffer, &message)?;
    writer.send(buffer.to_bytes()).await
}

/// Reply for an incoming heartbeat, if one is owed.
fn heartbeat_reply(request: &Request) -> Option<Response> {
    if request.event && request.two_way {
        Some(Response::ok(request, request.data.clone()))
    } else {
        None
    }
}
