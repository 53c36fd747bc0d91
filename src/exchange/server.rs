//! Server side of an exchange.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::Semaphore;

use super::writer::{spawn_writer_task, WriterHandle};
use super::{heartbeat_reply, write_message, ExchangeConfig};
use crate::buffer::ChannelBuffer;
use crate::channel::{Channel, ChannelInfo};
use crate::error::{RemoteError, Result, ServiceError};
use crate::protocol::{status, BodyCodec, DecodeResult, Payload, Request, Response, SessionCodec};
use crate::rpc::BoxFuture;
use crate::url::Url;

/// Application callback answering decoded requests.
pub trait ExchangeHandler: Send + Sync + 'static {
    /// Produce the reply payload for a request.
    fn reply<'a>(&'a self, channel: &'a dyn Channel, data: Payload) -> BoxFuture<'a, std::result::Result<Payload, ServiceError>>;
}

/// Accepts requests on connections and replies through a handler.
pub struct ExchangeServer<B: BodyCodec + 'static, H: ExchangeHandler> {
    url: Url,
    codec: Arc<SessionCodec<B>>,
    handler: Arc<H>,
    config: ExchangeConfig,
}

impl<B: BodyCodec + 'static, H: ExchangeHandler> ExchangeServer<B, H> {
    pub fn new(url: Url, codec: Arc<SessionCodec<B>>, handler: Arc<H>) -> Self {
        Self {
            url,
            codec,
            handler,
            config: ExchangeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Serve one connection until the peer closes it.
    ///
    /// # Errors
    ///
    /// I/O failures and fatal decode errors (oversized payload, unknown
    /// serialization) end the connection and are returned.
    pub async fn serve<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, write_half) = tokio::io::split(stream);
        let (writer, _writer_task) = spawn_writer_task(write_half, self.config.channel_capacity);
        let channel = Arc::new(ChannelInfo::new(self.url.clone()));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_handlers.max(1)));

        let mut buffer = ChannelBuffer::with_capacity(self.config.read_buffer_size);
        let mut chunk = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                tracing::debug!(service = %self.url.path(), "Connection closed by client");
                return Ok(());
            }
            buffer.write_bytes(&chunk[..n]);

            loop {
                let decoded = match self.codec.decode(channel.as_ref(), &mut buffer) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::error!(error = %e, "Closing connection after fatal decode error");
                        return Err(e);
                    }
                };
                match decoded {
                    DecodeResult::NeedMoreInput => break,
                    DecodeResult::Unrecognized(bytes) => {
                        tracing::warn!(len = bytes.len(), "Dropping unrecognized bytes");
                    }
                    DecodeResult::Response(response) => {
                        tracing::debug!(id = response.id, "Ignoring response sent to server");
                    }
                    DecodeResult::Request(request) => {
                        self.dispatch(request, &channel, &writer, &semaphore).await?;
                    }
                }
            }
            buffer.discard_read_bytes();
        }
    }

    async fn dispatch(
        &self,
        mut request: Request,
        channel: &Arc<ChannelInfo>,
        writer: &WriterHandle,
        semaphore: &Arc<Semaphore>,
    ) -> Result<()> {
        if request.broken {
            let reason = match &request.data {
                Payload::Broken(reason) => reason.clone(),
                _ => String::from("undecodable request"),
            };
            tracing::warn!(id = request.id, reason = %reason, "Received broken request");
            if request.two_way {
                let reply = Response::error(&request, status::BAD_REQUEST, format!("Fail to decode request due to: {}", reason));
                return self.reply(channel.as_ref(), writer, reply).await;
            }
            return Ok(());
        }

        if request.event {
            return match heartbeat_reply(&request) {
                Some(reply) => self.reply(channel.as_ref(), writer, reply).await,
                None => Ok(()),
            };
        }

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(id = request.id, "Handler capacity reached, rejecting request");
                if request.two_way {
                    let reply = Response::error(&request, status::SERVER_ERROR, "Server side handler capacity is exhausted");
                    return self.reply(channel.as_ref(), writer, reply).await;
                }
                return Ok(());
            }
        };

        let data = std::mem::take(&mut request.data);
        let handler = self.handler.clone();
        let codec = self.codec.clone();
        let channel = channel.clone();
        let writer = writer.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let outcome = handler.reply(channel.as_ref(), data).await;
            if !request.two_way {
                if let Err(e) = outcome {
                    tracing::warn!(id = request.id, error = %e, "One-way request failed");
                }
                return;
            }

            let reply = match outcome {
                Ok(result) => Response::ok(&request, result),
                Err(ServiceError::NotFound(message)) => Response::error(&request, status::SERVICE_NOT_FOUND, message),
                Err(ServiceError::Failed(message)) => Response::error(&request, status::SERVICE_ERROR, message),
            };
            if let Err(e) = write_message(codec.as_ref(), channel.as_ref(), &writer, reply.into()).await {
                tracing::error!(id = request.id, error = %e, "Failed to send response");
            }
        });
        Ok(())
    }

    /// Queue a reply. Encoding failures are logged; a closed writer ends the connection.
    async fn reply(&self, channel: &dyn Channel, writer: &WriterHandle, response: Response) -> Result<()> {
        let id = response.id;
        match write_message(self.codec.as_ref(), channel, writer, response.into()).await {
            Ok(()) => Ok(()),
            Err(RemoteError::ConnectionClosed) => Err(RemoteError::ConnectionClosed),
            Err(e) => {
                tracing::error!(id, error = %e, "Failed to send response");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::exchange::ExchangeClient;
    use crate::serialization::SerializationRegistry;
    use serde_json::{json, Value};
    use tokio::io::duplex;

    struct Echo;

    impl ExchangeHandler for Echo {
        fn reply<'a>(&'a self, _: &'a dyn Channel, data: Payload) -> BoxFuture<'a, std::result::Result<Payload, ServiceError>> {
            Box::pin(async move {
                match data {
                    Payload::Value(Value::String(s)) if s == "missing" => Err(ServiceError::NotFound("no such thing".into())),
                    Payload::Value(Value::String(s)) if s == "fail" => Err(ServiceError::Failed("it broke".into())),
                    Payload::Value(Value::String(s)) if s == "slow" => {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(Payload::Value(json!("late")))
                    }
                    other => Ok(other),
                }
            })
        }
    }

    fn start(config: ExchangeConfig) -> ExchangeClient {
        let codec = Arc::new(SessionCodec::new(Arc::new(SerializationRegistry::with_defaults())));
        let url = Url::new("dabb", "127.0.0.1", 20880, "echo");
        let (client_io, server_io) = duplex(64 * 1024);

        let server = ExchangeServer::new(url.clone(), codec.clone(), Arc::new(Echo)).with_config(config);
        tokio::spawn(async move { server.serve(server_io).await });

        ExchangeClient::connect(client_io, url, codec, ExchangeConfig::default())
    }

    #[tokio::test]
    async fn test_handler_statuses() {
        let client = start(ExchangeConfig::default());
        let timeout = Duration::from_secs(2);

        let ok = client.request(Payload::Value(json!("hello")), timeout).await.unwrap();
        assert_eq!(ok.status, status::OK);
        assert_eq!(ok.result, Payload::Value(json!("hello")));

        let missing = client.request(Payload::Value(json!("missing")), timeout).await.unwrap();
        assert_eq!(missing.status, status::SERVICE_NOT_FOUND);
        assert_eq!(missing.error_message.as_deref(), Some("no such thing"));

        let failed = client.request(Payload::Value(json!("fail")), timeout).await.unwrap();
        assert_eq!(failed.status, status::SERVICE_ERROR);
        assert_eq!(failed.error_message.as_deref(), Some("it broke"));
    }

    #[tokio::test]
    async fn test_heartbeat_echo() {
        let client = start(ExchangeConfig::default());
        let reply = client.heartbeat(Duration::from_secs(2)).await.unwrap();
        assert!(reply.event);
        assert!(reply.is_ok());
    }

    #[tokio::test]
    async fn test_capacity_exhausted_is_server_error() {
        let client = start(ExchangeConfig::default().max_concurrent_handlers(1));
        let timeout = Duration::from_secs(2);

        let (slow, rejected) = tokio::join!(
            client.request(Payload::Value(json!("slow")), timeout),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                client.request(Payload::Value(json!("quick")), timeout).await
            }
        );
        assert_eq!(slow.unwrap().result, Payload::Value(json!("late")));
        assert_eq!(rejected.unwrap().status, status::SERVER_ERROR);
    }
}
