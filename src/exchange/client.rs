//! Client side of an exchange.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dabb_rpc::exchange::{ExchangeClient, ExchangeConfig};
//! use dabb_rpc::protocol::{Payload, SessionCodec};
//! use dabb_rpc::serialization::SerializationRegistry;
//!
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:20880").await?;
//! let url = "dabb://127.0.0.1:20880/echo".parse()?;
//! let codec = Arc::new(SessionCodec::new(Arc::new(SerializationRegistry::with_defaults())));
//! let client = ExchangeClient::connect(stream, url, codec, ExchangeConfig::default());
//!
//! let response = client
//!     .request(Payload::Value("ping".into()), Duration::from_secs(1))
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::writer::{spawn_writer_task, WriterHandle};
use super::{heartbeat_reply, write_message, ExchangeConfig};
use crate::buffer::ChannelBuffer;
use crate::channel::{Channel, ChannelInfo};
use crate::error::{RemoteError, Result};
use crate::protocol::{BodyCodec, DataBodyCodec, DecodeResult, Payload, Request, Response, SessionCodec};
use crate::url::Url;

/// Outstanding two-way requests keyed by id.
#[derive(Default)]
struct PendingRequests {
    inner: Mutex<PendingState>,
}

#[derive(Default)]
struct PendingState {
    waiters: HashMap<u64, oneshot::Sender<Response>>,
    closed: bool,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, id: u64) -> Result<oneshot::Receiver<Response>> {
        let mut state = self.lock();
        if state.closed {
            return Err(RemoteError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id, tx);
        Ok(rx)
    }

    fn remove(&self, id: u64) {
        self.lock().waiters.remove(&id);
    }

    /// Hand a response to its waiter. Returns `false` if nobody waits for it.
    fn complete(&self, response: Response) -> bool {
        let waiter = self.lock().waiters.remove(&response.id);
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Drop every waiter and refuse new ones.
    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.waiters.clear();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn len(&self) -> usize {
        self.lock().waiters.len()
    }
}

/// Request/response client over one connection.
pub struct ExchangeClient<B: BodyCodec + 'static = DataBodyCodec> {
    channel: Arc<ChannelInfo>,
    codec: Arc<SessionCodec<B>>,
    writer: WriterHandle,
    pending: Arc<PendingRequests>,
    reader_task: JoinHandle<()>,
}

impl<B: BodyCodec + 'static> ExchangeClient<B> {
    /// Start the read loop and the writer task over `stream`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn connect<S>(stream: S, url: Url, codec: Arc<SessionCodec<B>>, config: ExchangeConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, _writer_task) = spawn_writer_task(write_half, config.channel_capacity);

        let channel = Arc::new(ChannelInfo::new(url));
        let pending = Arc::new(PendingRequests::default());

        let reader_task = tokio::spawn({
            let channel = channel.clone();
            let codec = codec.clone();
            let writer = writer.clone();
            let pending = pending.clone();
            async move {
                let result = read_loop(
                    read_half,
                    channel.as_ref(),
                    codec.as_ref(),
                    &writer,
                    &pending,
                    config.read_buffer_size,
                )
                .await;
                if let Err(e) = result {
                    tracing::error!(remote = %channel.url().address(), error = %e, "Client read loop failed");
                }
                pending.close();
            }
        });

        Self {
            channel,
            codec,
            writer,
            pending,
            reader_task,
        }
    }

    /// Descriptor of the connection.
    pub fn url(&self) -> &Url {
        self.channel.url()
    }

    /// Whether the connection has gone away.
    pub fn is_closed(&self) -> bool {
        self.pending.is_closed() || self.writer.is_closed()
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Send a two-way request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Timeout`] if no response arrives within
    /// `timeout`, and [`RemoteError::ConnectionClosed`] if the connection
    /// breaks first.
    pub async fn request(&self, data: Payload, timeout: Duration) -> Result<Response> {
        self.round_trip(Request::new(data), timeout).await
    }

    /// Send a one-way request.
    pub async fn send(&self, data: Payload) -> Result<()> {
        let mut request = Request::new(data);
        request.two_way = false;
        write_message(self.codec.as_ref(), self.channel.as_ref(), &self.writer, request.into()).await
    }

    /// Send a heartbeat event and wait for the echo.
    pub async fn heartbeat(&self, timeout: Duration) -> Result<Response> {
        self.round_trip(Request::heartbeat(), timeout).await
    }

    async fn round_trip(&self, request: Request, timeout: Duration) -> Result<Response> {
        let id = request.id;
        let rx = self.pending.register(id)?;

        if let Err(e) = write_message(self.codec.as_ref(), self.channel.as_ref(), &self.writer, request.into()).await {
            self.pending.remove(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(RemoteError::ConnectionClosed),
            Err(_) => {
                self.pending.remove(id);
                Err(RemoteError::Timeout {
                    id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl<B: BodyCodec + 'static> Drop for ExchangeClient<B> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop<R, B>(
    mut reader: R,
    channel: &ChannelInfo,
    codec: &SessionCodec<B>,
    writer: &WriterHandle,
    pending: &PendingRequests,
    read_buffer_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    B: BodyCodec,
{
    let mut buffer = ChannelBuffer::with_capacity(read_buffer_size);
    let mut chunk = vec![0u8; read_buffer_size.max(1)];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            tracing::debug!(remote = %channel.url().address(), "Connection closed by server");
            return Ok(());
        }
        buffer.write_bytes(&chunk[..n]);

        loop {
            match codec.decode(channel, &mut buffer)? {
                DecodeResult::NeedMoreInput => break,
                DecodeResult::Unrecognized(bytes) => {
                    tracing::warn!(len = bytes.len(), "Dropping unrecognized bytes");
                }
                DecodeResult::Response(response) => {
                    let id = response.id;
                    if !pending.complete(response) {
                        tracing::warn!(id, "Received response for unknown or expired request");
                    }
                }
                DecodeResult::Request(request) => match heartbeat_reply(&request) {
                    Some(reply) => write_message(codec, channel, writer, reply.into()).await?,
                    None => tracing::debug!(id = request.id, "Ignoring request sent to client"),
                },
            }
        }
        buffer.discard_read_bytes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status;
    use crate::serialization::SerializationRegistry;
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    fn codec() -> Arc<SessionCodec> {
        Arc::new(SessionCodec::new(Arc::new(SerializationRegistry::with_defaults())))
    }

    fn url() -> Url {
        Url::new("dabb", "127.0.0.1", 20880, "test")
    }

    fn decode_one(codec: &SessionCodec, buffer: &mut ChannelBuffer) -> DecodeResult {
        codec.decode(&ChannelInfo::new(url()), buffer).unwrap()
    }

    async fn read_request(codec: &SessionCodec, server: &mut DuplexStream, buffer: &mut ChannelBuffer) -> Request {
        let mut chunk = [0u8; 1024];
        loop {
            match decode_one(codec, buffer) {
                DecodeResult::Request(r) => return r,
                DecodeResult::NeedMoreInput => {
                    let n = server.read(&mut chunk).await.unwrap();
                    assert!(n > 0, "client closed");
                    buffer.write_bytes(&chunk[..n]);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    async fn write_frame(codec: &SessionCodec, server: &mut DuplexStream, response: Response) {
        let mut buffer = ChannelBuffer::new();
        codec.encode(&ChannelInfo::new(url()), &mut buffer, &response.into()).unwrap();
        server.write_all(buffer.readable()).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_matched_by_id() {
        let codec = codec();
        let (client_io, mut server) = duplex(4096);
        let client = ExchangeClient::connect(client_io, url(), codec.clone(), ExchangeConfig::default());

        let peer = {
            let codec = codec.clone();
            tokio::spawn(async move {
                let mut buffer = ChannelBuffer::new();
                let request = read_request(&codec, &mut server, &mut buffer).await;
                // Noise and a stray response first; both must be ignored.
                server.write_all(b"noise").await.unwrap();
                write_frame(&codec, &mut server, Response::new(request.id.wrapping_add(1000))).await;
                write_frame(&codec, &mut server, Response::ok(&request, request.data.clone())).await;
                server
            })
        };

        let response = client
            .request(Payload::Value(json!("ping")), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.status, status::OK);
        assert_eq!(response.result, Payload::Value(json!("ping")));
        assert_eq!(client.pending_requests(), 0);
        let _server = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (client_io, _server) = duplex(4096);
        let client = ExchangeClient::connect(client_io, url(), codec(), ExchangeConfig::default());

        let err = client
            .request(Payload::Value(json!(1)), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { timeout_ms: 20, .. }));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_broken_stream_fails_pending() {
        let codec = codec();
        let (client_io, mut server) = duplex(4096);
        let client = ExchangeClient::connect(client_io, url(), codec.clone(), ExchangeConfig::default());

        let peer = tokio::spawn(async move {
            let mut buffer = ChannelBuffer::new();
            let _ = read_request(&codec, &mut server, &mut buffer).await;
            drop(server);
        });

        let err = client
            .request(Payload::Empty, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::ConnectionClosed));
        peer.await.unwrap();

        // Give the read loop a moment to observe EOF.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.is_closed());
        assert!(matches!(
            client.request(Payload::Empty, Duration::from_secs(1)).await,
            Err(RemoteError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_one_way_send_has_no_pending_entry() {
        let codec = codec();
        let (client_io, mut server) = duplex(4096);
        let client = ExchangeClient::connect(client_io, url(), codec.clone(), ExchangeConfig::default());

        client.send(Payload::Value(json!("fire"))).await.unwrap();
        assert_eq!(client.pending_requests(), 0);

        let mut buffer = ChannelBuffer::new();
        let request = read_request(&codec, &mut server, &mut buffer).await;
        assert!(!request.two_way);
        assert_eq!(request.data, Payload::Value(json!("fire")));
    }

    #[tokio::test]
    async fn test_answers_server_heartbeat() {
        let codec = codec();
        let (client_io, mut server) = duplex(4096);
        let _client = ExchangeClient::connect(client_io, url(), codec.clone(), ExchangeConfig::default());

        let heartbeat = Request::heartbeat();
        let mut out = ChannelBuffer::new();
        codec
            .encode(&ChannelInfo::new(url()), &mut out, &heartbeat.clone().into())
            .unwrap();
        server.write_all(out.readable()).await.unwrap();

        let mut buffer = ChannelBuffer::new();
        let mut chunk = [0u8; 256];
        let reply = loop {
            match decode_one(&codec, &mut buffer) {
                DecodeResult::Response(r) => break r,
                DecodeResult::NeedMoreInput => {
                    let n = server.read(&mut chunk).await.unwrap();
                    buffer.write_bytes(&chunk[..n]);
                }
                other => panic!("unexpected {:?}", other),
            }
        };
        assert_eq!(reply.id, heartbeat.id);
        assert!(reply.event);
    }
}
