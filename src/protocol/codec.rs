//! Frame codec for requests and responses.
//!
//! [`SessionCodec`] turns [`Request`]/[`Response`] values into frames on a
//! [`ChannelBuffer`] and back. The frame body is produced by a
//! [`BodyCodec`], whose default methods write and read a single data value;
//! protocols specialize the request/response hooks (see
//! [`RpcBodyCodec`](crate::rpc::RpcBodyCodec)).
//!
//! Decoding is tolerant of partial reads and of garbage on the stream:
//!
//! - fewer than [`HEADER_LENGTH`] bytes, or an incomplete body, yields
//!   [`DecodeResult::NeedMoreInput`] and leaves the buffer untouched;
//! - bytes that do not start with the magic number are returned as
//!   [`DecodeResult::Unrecognized`], up to the next magic number;
//! - a body that fails to decode still yields a message (a `CLIENT_ERROR`
//!   response or a broken request) so the stream stays usable.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use dabb_rpc::buffer::ChannelBuffer;
//! use dabb_rpc::channel::ChannelInfo;
//! use dabb_rpc::protocol::{DecodeResult, Payload, Request, SessionCodec};
//! use dabb_rpc::serialization::SerializationRegistry;
//! use dabb_rpc::Url;
//!
//! let codec = SessionCodec::new(Arc::new(SerializationRegistry::with_defaults()));
//! let channel = ChannelInfo::new(Url::new("dabb", "127.0.0.1", 20880, "demo"));
//!
//! let request = Request::with_id(1, Payload::Value(serde_json::json!("ping")));
//! let mut buffer = ChannelBuffer::new();
//! codec.encode(&channel, &mut buffer, &request.clone().into()).unwrap();
//!
//! match codec.decode(&channel, &mut buffer).unwrap() {
//!     DecodeResult::Request(decoded) => assert_eq!(decoded, request),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use std::io::{BufRead, Read};
use std::sync::Arc;

use serde_json::Value;

use super::message::{status, DecodeResult, Message, Payload, Request, Response, PROTOCOL_VERSION};
use super::wire_format::{flags, FrameHeader, HEADER_LENGTH, MAGIC_HIGH, MAGIC_LOW};
use crate::buffer::ChannelBuffer;
use crate::channel::Channel;
use crate::constants::{DEFAULT_PAYLOAD, PAYLOAD_KEY};
use crate::error::{RemoteError, Result};
use crate::serialization::{ObjectInput, ObjectOutput, Serialization, SerializationRegistry};

/// Hooks that write and read frame bodies.
///
/// Every method has a default; implementors override the ones their
/// protocol specializes. Event bodies always go through
/// [`encode_data`](BodyCodec::encode_data) / [`decode_data`](BodyCodec::decode_data).
pub trait BodyCodec: Send + Sync {
    /// Write a payload as a single data value.
    fn encode_data(&self, out: &mut dyn ObjectOutput, data: &Payload) -> Result<()> {
        match data {
            Payload::Empty => out.write_object(&Value::Null),
            Payload::Value(value) => out.write_object(value),
            Payload::Invocation(invocation) => out.write_object(&serde_json::to_value(invocation)?),
            Payload::Result(result) => out.write_object(&serde_json::to_value(result)?),
            // Raw bytes only pass through verbatim in OK non-event responses.
            Payload::Encoded(bytes) => Err(RemoteError::Codec(format!(
                "Pre-encoded payload of {} bytes cannot be written as a data value",
                bytes.len()
            ))),
            Payload::Broken(reason) => Err(RemoteError::Codec(format!(
                "Refusing to encode broken payload: {}",
                reason
            ))),
        }
    }

    fn encode_request_data(
        &self,
        _channel: &dyn Channel,
        out: &mut dyn ObjectOutput,
        data: &Payload,
    ) -> Result<()> {
        self.encode_data(out, data)
    }

    fn encode_response_data(
        &self,
        _channel: &dyn Channel,
        out: &mut dyn ObjectOutput,
        data: &Payload,
    ) -> Result<()> {
        self.encode_data(out, data)
    }

    /// Read a single data value.
    fn decode_data(&self, input: &mut dyn ObjectInput) -> Result<Payload> {
        Ok(Payload::Value(input.read_object()?))
    }

    fn decode_request_data(
        &self,
        _channel: &dyn Channel,
        input: &mut dyn ObjectInput,
        _request: &Request,
    ) -> Result<Payload> {
        self.decode_data(input)
    }

    fn decode_response_data(
        &self,
        _channel: &dyn Channel,
        input: &mut dyn ObjectInput,
        _response: &Response,
    ) -> Result<Payload> {
        self.decode_data(input)
    }
}

/// Body codec using only the default hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataBodyCodec;

impl BodyCodec for DataBodyCodec {}

/// Maximum payload configured on a channel (`0` disables the check).
fn max_payload(channel: &dyn Channel) -> usize {
    channel.url().parameter_usize(PAYLOAD_KEY, DEFAULT_PAYLOAD)
}

/// Reject payloads larger than the channel allows.
pub fn check_payload(channel: &dyn Channel, length: usize) -> Result<()> {
    let max = max_payload(channel);
    if max > 0 && length > max {
        return Err(RemoteError::PayloadTooLarge { length, max });
    }
    Ok(())
}

/// Request/response frame codec.
pub struct SessionCodec<B: BodyCodec = DataBodyCodec> {
    serializations: Arc<SerializationRegistry>,
    body: B,
}

impl SessionCodec<DataBodyCodec> {
    /// Codec with the default body hooks.
    pub fn new(serializations: Arc<SerializationRegistry>) -> Self {
        Self::with_body(serializations, DataBodyCodec)
    }
}

impl<B: BodyCodec> SessionCodec<B> {
    /// Codec with custom body hooks.
    pub fn with_body(serializations: Arc<SerializationRegistry>, body: B) -> Self {
        Self {
            serializations,
            body,
        }
    }

    pub fn serializations(&self) -> &Arc<SerializationRegistry> {
        &self.serializations
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    /// Encode a message at the buffer's writer index.
    pub fn encode(&self, channel: &dyn Channel, buffer: &mut ChannelBuffer, message: &Message) -> Result<()> {
        match message {
            Message::Request(request) => self.encode_request(channel, buffer, request),
            Message::Response(response) => self.encode_response(channel, buffer, response),
        }
    }

    /// Encode a request frame.
    ///
    /// # Errors
    ///
    /// Serialization failures and oversized payloads are fatal; the buffer's
    /// writer index is restored so no partial frame is left behind.
    pub fn encode_request(&self, channel: &dyn Channel, buffer: &mut ChannelBuffer, request: &Request) -> Result<()> {
        let saved = buffer.writer_index();
        let result = self.write_request(channel, buffer, request, saved);
        if result.is_err() {
            buffer.set_writer_index(saved);
        }
        result
    }

    fn write_request(
        &self,
        channel: &dyn Channel,
        buffer: &mut ChannelBuffer,
        request: &Request,
        saved: usize,
    ) -> Result<()> {
        let serialization = self.serializations.for_url(channel.url())?;
        let frame_flags = flags::request(request.two_way, request.event, serialization.content_type_id());

        buffer.set_writer_index(saved + HEADER_LENGTH);
        {
            let mut out = serialization.serialize(buffer);
            if request.event {
                self.body.encode_data(out.as_mut(), &request.data)?;
            } else {
                self.body.encode_request_data(channel, out.as_mut(), &request.data)?;
            }
            out.flush_buffer()?;
        }

        let length = buffer.writer_index() - saved - HEADER_LENGTH;
        check_payload(channel, length)?;

        let header = FrameHeader::new(frame_flags, 0, request.id, length as u32);
        buffer.set_bytes(saved, &header.encode());
        Ok(())
    }

    /// Encode a response frame.
    ///
    /// If a normal response fails to encode, a `BAD_RESPONSE` frame with the
    /// same id describing the failure is written instead. Event responses and
    /// responses that are already `BAD_RESPONSE` return the error.
    pub fn encode_response(&self, channel: &dyn Channel, buffer: &mut ChannelBuffer, response: &Response) -> Result<()> {
        self.encode_response_guarded(channel, buffer, response, false)
    }

    fn encode_response_guarded(
        &self,
        channel: &dyn Channel,
        buffer: &mut ChannelBuffer,
        response: &Response,
        degraded: bool,
    ) -> Result<()> {
        let saved = buffer.writer_index();
        let error = match self.write_response(channel, buffer, response, saved) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        buffer.set_writer_index(saved);

        if degraded || response.event || response.is_bad_response() {
            return Err(error);
        }

        tracing::warn!(
            id = response.id,
            error = %error,
            "Fail to encode response: {}, send exception info instead",
            response
        );
        let mut bad = Response::with_version(response.id, &response.version);
        bad.status = status::BAD_RESPONSE;
        bad.error_message = Some(format!(
            "Failed to send response: {}, cause: {}",
            response, error
        ));
        self.encode_response_guarded(channel, buffer, &bad, true)
    }

    fn write_response(
        &self,
        channel: &dyn Channel,
        buffer: &mut ChannelBuffer,
        response: &Response,
        saved: usize,
    ) -> Result<()> {
        let serialization = self.serializations.for_url(channel.url())?;
        let frame_flags = flags::response(response.event, serialization.content_type_id());

        buffer.set_writer_index(saved + HEADER_LENGTH);
        match (&response.result, response.is_ok()) {
            (Payload::Encoded(raw), true) if !response.event => buffer.write_bytes(raw),
            _ => {
                let mut out = serialization.serialize(buffer);
                if !response.is_ok() {
                    out.write_utf(response.error_message.as_deref().unwrap_or(""))?;
                } else if response.event {
                    self.body.encode_data(out.as_mut(), &response.result)?;
                } else {
                    self.body.encode_response_data(channel, out.as_mut(), &response.result)?;
                }
                out.flush_buffer()?;
            }
        }

        let length = buffer.writer_index() - saved - HEADER_LENGTH;
        check_payload(channel, length)?;

        let header = FrameHeader::new(frame_flags, response.status, response.id, length as u32);
        buffer.set_bytes(saved, &header.encode());
        Ok(())
    }

    /// Decode one message from the buffer's readable region.
    ///
    /// # Errors
    ///
    /// A declared payload length above the channel's maximum is fatal and is
    /// reported before any body byte is read. An unknown serialization id is
    /// fatal as well; the offending frame is consumed.
    pub fn decode(&self, channel: &dyn Channel, buffer: &mut ChannelBuffer) -> Result<DecodeResult> {
        let readable = buffer.readable_bytes();
        let head = &buffer.readable()[..readable.min(HEADER_LENGTH)];

        if (readable > 0 && head[0] != MAGIC_HIGH) || (readable > 1 && head[1] != MAGIC_LOW) {
            return Ok(resync(buffer));
        }

        if readable < HEADER_LENGTH {
            return Ok(DecodeResult::NeedMoreInput);
        }

        let header = match FrameHeader::decode(head) {
            Some(header) => header,
            None => return Ok(DecodeResult::NeedMoreInput),
        };

        let length = header.length as usize;
        check_payload(channel, length)?;

        if readable < HEADER_LENGTH + length {
            return Ok(DecodeResult::NeedMoreInput);
        }

        buffer.skip_bytes(HEADER_LENGTH);
        let body_start = buffer.reader_index();
        let body_end = body_start + length;

        let decoded = {
            let mut body = (&mut *buffer).take(length as u64);
            self.decode_body(channel, &mut body, &header)
        };

        let unread = body_end.saturating_sub(buffer.reader_index());
        if unread > 0 {
            tracing::warn!(id = header.id, "Skip input stream {}", unread);
        }
        buffer.set_reader_index(body_end);

        decoded
    }

    fn decode_body(&self, channel: &dyn Channel, body: &mut dyn BufRead, header: &FrameHeader) -> Result<DecodeResult> {
        let serialization = self
            .serializations
            .for_frame(channel.url(), header.serialization_id())?;

        if header.is_request() {
            Ok(DecodeResult::Request(self.decode_request(channel, serialization.as_ref(), body, header)))
        } else {
            self.decode_response(channel, serialization.as_ref(), body, header)
                .map(DecodeResult::Response)
        }
    }

    fn decode_response(
        &self,
        channel: &dyn Channel,
        serialization: &dyn Serialization,
        body: &mut dyn BufRead,
        header: &FrameHeader,
    ) -> Result<Response> {
        let mut response = Response::new(header.id);
        response.event = header.is_event();
        response.status = header.status;

        let mut input = serialization.deserialize(body);
        if response.is_ok() {
            let data = if response.event {
                self.body.decode_data(input.as_mut())
            } else {
                self.body.decode_response_data(channel, input.as_mut(), &response)
            };
            match data {
                Ok(data) => response.result = data,
                Err(e) => {
                    tracing::warn!(id = header.id, error = %e, "Decode response failed");
                    response.status = status::CLIENT_ERROR;
                    response.error_message = Some(e.to_string());
                }
            }
        } else {
            response.error_message = Some(input.read_utf()?);
        }
        Ok(response)
    }

    fn decode_request(
        &self,
        channel: &dyn Channel,
        serialization: &dyn Serialization,
        body: &mut dyn BufRead,
        header: &FrameHeader,
    ) -> Request {
        let mut request = Request::with_id(header.id, Payload::Empty);
        request.version = PROTOCOL_VERSION.to_string();
        request.two_way = header.is_two_way();
        request.event = header.is_event();

        let mut input = serialization.deserialize(body);
        let data = if request.event {
            self.body.decode_data(input.as_mut())
        } else {
            self.body.decode_request_data(channel, input.as_mut(), &request)
        };
        match data {
            Ok(data) => request.data = data,
            Err(e) => {
                tracing::warn!(id = header.id, error = %e, "Decode request failed");
                request.broken = true;
                request.data = Payload::Broken(e.to_string());
            }
        }
        request
    }
}

/// Skip every buffered byte before the next magic number.
///
/// The scan starts at offset 1 so a frame that is corrupt in its second
/// byte is dropped rather than matched again. A trailing first magic byte
/// is kept since its partner may not have arrived yet.
fn resync(buffer: &mut ChannelBuffer) -> DecodeResult {
    let data = buffer.readable();
    let end = data.len();
    let cut = (1..end)
        .find(|&i| data[i] == MAGIC_HIGH && data.get(i + 1).map_or(true, |&b| b == MAGIC_LOW))
        .unwrap_or(end);
    DecodeResult::Unrecognized(buffer.read_chunk(cut))
}
