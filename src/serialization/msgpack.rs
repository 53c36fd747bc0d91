//! MsgPack serialization using `rmp-serde`.
//!
//! Structured values are written with `write_named`, so maps keep their
//! field names and peers in other languages can decode them without a
//! schema.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{ObjectInput, ObjectOutput, Serialization};
use crate::error::Result;

/// MessagePack plug-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerialization;

impl MsgPackSerialization {
    /// Content type id on the wire.
    pub const ID: u8 = 1;
    /// Configuration name.
    pub const NAME: &'static str = "msgpack";
}

impl Serialization for MsgPackSerialization {
    fn content_type_id(&self) -> u8 {
        Self::ID
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn serialize<'a>(&self, output: &'a mut dyn Write) -> Box<dyn ObjectOutput + 'a> {
        Box::new(MsgPackObjectOutput {
            sink: output,
            buf: Vec::with_capacity(128),
        })
    }

    fn deserialize<'a>(&self, input: &'a mut dyn BufRead) -> Box<dyn ObjectInput + 'a> {
        Box::new(MsgPackObjectInput { source: input })
    }
}

struct MsgPackObjectOutput<'a> {
    sink: &'a mut dyn Write,
    buf: Vec<u8>,
}

impl MsgPackObjectOutput<'_> {
    #[inline]
    fn put<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        rmp_serde::encode::write_named(&mut self.buf, value)?;
        Ok(())
    }
}

impl ObjectOutput for MsgPackObjectOutput<'_> {
    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.put(&v)
    }

    fn write_byte(&mut self, v: u8) -> Result<()> {
        self.put(&v)
    }

    fn write_i32(&mut self, v: i32) -> Result<()> {
        self.put(&v)
    }

    fn write_i64(&mut self, v: i64) -> Result<()> {
        self.put(&v)
    }

    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.put(&v)
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        self.put(v)
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.put(serde_bytes::Bytes::new(v))
    }

    fn write_object(&mut self, v: &Value) -> Result<()> {
        self.put(v)
    }

    fn flush_buffer(&mut self) -> Result<()> {
        self.sink.write_all(&self.buf)?;
        self.buf.clear();
        self.sink.flush()?;
        Ok(())
    }
}

struct MsgPackObjectInput<'a> {
    source: &'a mut dyn BufRead,
}

impl MsgPackObjectInput<'_> {
    #[inline]
    fn get<T: DeserializeOwned>(&mut self) -> Result<T> {
        Ok(rmp_serde::from_read(&mut *self.source)?)
    }
}

impl ObjectInput for MsgPackObjectInput<'_> {
    fn read_bool(&mut self) -> Result<bool> {
        self.get()
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.get()
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.get()
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.get()
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.get()
    }

    fn read_utf(&mut self) -> Result<String> {
        self.get()
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let bytes: serde_bytes::ByteBuf = self.get()?;
        Ok(bytes.into_vec())
    }

    fn read_object(&mut self) -> Result<Value> {
        self.get()
    }
}
