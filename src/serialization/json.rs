//! JSON serialization using `serde_json`.
//!
//! Each value is written as one JSON document followed by `\n`. Reading
//! parses one document and then skips the separator so the next read
//! starts on a value boundary.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ObjectInput, ObjectOutput, Serialization};
use crate::error::{RemoteError, Result};

/// JSON plug-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerialization;

impl JsonSerialization {
    /// Content type id on the wire.
    pub const ID: u8 = 2;
    /// Configuration name.
    pub const NAME: &'static str = "json";
}

impl Serialization for JsonSerialization {
    fn content_type_id(&self) -> u8 {
        Self::ID
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn serialize<'a>(&self, output: &'a mut dyn Write) -> Box<dyn ObjectOutput + 'a> {
        Box::new(JsonObjectOutput {
            sink: output,
            buf: Vec::with_capacity(128),
        })
    }

    fn deserialize<'a>(&self, input: &'a mut dyn BufRead) -> Box<dyn ObjectInput + 'a> {
        Box::new(JsonObjectInput { source: input })
    }
}

struct JsonObjectOutput<'a> {
    sink: &'a mut dyn Write,
    buf: Vec<u8>,
}

impl JsonObjectOutput<'_> {
    fn put<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.buf, value)?;
        self.buf.push(b'\n');
        Ok(())
    }
}

impl ObjectOutput for JsonObjectOutput<'_> {
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
        if !v.is_finite() {
            return Err(RemoteError::Codec(format!("JSON cannot represent {}", v)));
        }
        self.put(&v)
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        self.put(v)
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        // JSON has no binary type; bytes travel as an array of numbers.
        self.put(v)
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

struct JsonObjectInput<'a> {
    source: &'a mut dyn BufRead,
}

impl JsonObjectInput<'_> {
    fn get<T: DeserializeOwned>(&mut self) -> Result<T> {
        let value = {
            let mut de = serde_json::Deserializer::from_reader(&mut *self.source);
            T::deserialize(&mut de)?
        };
        self.skip_separator()?;
        Ok(value)
    }

    fn skip_separator(&mut self) -> Result<()> {
        loop {
            let available = self.source.fill_buf()?;
            let blanks = available
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            if blanks == 0 {
                return Ok(());
            }
            self.source.consume(blanks);
        }
    }
}

impl ObjectInput for JsonObjectInput<'_> {
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
        self.get()
    }

    fn read_object(&mut self) -> Result<Value> {
        self.get()
    }
}
