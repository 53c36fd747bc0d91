//! Serialization plug-ins for frame payloads.
//!
//! A [`Serialization`] is identified on the wire by a 5-bit content type id
//! stored in the frame flags, and in configuration by its name:
//!
//! - [`MsgPackSerialization`] - MessagePack via `rmp-serde` (id 1, `msgpack`)
//! - [`JsonSerialization`] - newline separated JSON via `serde_json` (id 2, `json`)
//!
//! Writes go through an [`ObjectOutput`], which buffers typed values until
//! [`ObjectOutput::flush_buffer`] is called. Reads go through an
//! [`ObjectInput`] positioned on the frame body.
//!
//! # Example
//!
//! ```
//! use dabb_rpc::serialization::{MsgPackSerialization, Serialization};
//!
//! let mut wire = Vec::new();
//! {
//!     let mut out = MsgPackSerialization.serialize(&mut wire);
//!     out.write_utf("hello").unwrap();
//!     out.write_i64(42).unwrap();
//!     out.flush_buffer().unwrap();
//! }
//!
//! let mut reader = &wire[..];
//! let mut input = MsgPackSerialization.deserialize(&mut reader);
//! assert_eq!(input.read_utf().unwrap(), "hello");
//! assert_eq!(input.read_i64().unwrap(), 42);
//! ```

mod json;
mod msgpack;
mod registry;

use std::io::{BufRead, Write};

use serde_json::Value;

use crate::error::Result;

pub use json::JsonSerialization;
pub use msgpack::MsgPackSerialization;
pub use registry::SerializationRegistry;

/// Largest content type id that fits the frame flags.
pub const MAX_CONTENT_TYPE_ID: u8 = 0x1f;

/// Buffered typed writer.
pub trait ObjectOutput {
    fn write_bool(&mut self, v: bool) -> Result<()>;

    fn write_byte(&mut self, v: u8) -> Result<()>;

    fn write_i32(&mut self, v: i32) -> Result<()>;

    fn write_i64(&mut self, v: i64) -> Result<()>;

    fn write_f64(&mut self, v: f64) -> Result<()>;

    /// Write a string (also used for error messages).
    fn write_utf(&mut self, v: &str) -> Result<()>;

    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Write an arbitrary data value.
    fn write_object(&mut self, v: &Value) -> Result<()>;

    /// Push everything buffered so far to the underlying writer.
    fn flush_buffer(&mut self) -> Result<()>;
}

/// Typed reader over a frame body.
pub trait ObjectInput {
    fn read_bool(&mut self) -> Result<bool>;

    fn read_byte(&mut self) -> Result<u8>;

    fn read_i32(&mut self) -> Result<i32>;

    fn read_i64(&mut self) -> Result<i64>;

    fn read_f64(&mut self) -> Result<f64>;

    /// Read a string written by [`ObjectOutput::write_utf`].
    fn read_utf(&mut self) -> Result<String>;

    fn read_bytes(&mut self) -> Result<Vec<u8>>;

    /// Read an arbitrary data value.
    fn read_object(&mut self) -> Result<Value>;
}

/// Payload codec plug-in.
pub trait Serialization: Send + Sync {
    /// Id carried in bits 0-4 of the frame flags.
    fn content_type_id(&self) -> u8;

    /// Name used in configuration (`serialization=<name>`).
    fn name(&self) -> &'static str;

    /// Open a buffered writer over `output`.
    fn serialize<'a>(&self, output: &'a mut dyn Write) -> Box<dyn ObjectOutput + 'a>;

    /// Open a reader over `input`.
    fn deserialize<'a>(&self, input: &'a mut dyn BufRead) -> Box<dyn ObjectInput + 'a>;
}
