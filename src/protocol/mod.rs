//! Protocol module - wire format, messages and the frame codec.
//!
//! - 16-byte header encoding/decoding ([`FrameHeader`])
//! - Request/response entities ([`Request`], [`Response`])
//! - Frame codec with resync and partial-read handling ([`SessionCodec`])

mod codec;
mod message;
mod wire_format;

pub use codec::{check_payload, BodyCodec, DataBodyCodec, SessionCodec};
pub use message::{
    next_request_id, status, DecodeResult, Message, Payload, Request, Response, PROTOCOL_VERSION,
};
pub use wire_format::{flags, FrameHeader, HEADER_LENGTH, MAGIC, MAGIC_HIGH, MAGIC_LOW};
