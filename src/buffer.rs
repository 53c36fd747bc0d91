//! Cursor-based byte buffer.
//!
//! [`ChannelBuffer`] keeps two independent cursors over one growable
//! storage region:
//!
//! ```text
//!  +-----------------+------------------+-----------------+
//!  | discarded bytes |  readable bytes  |  writable bytes |
//!  +-----------------+------------------+-----------------+
//!  0        reader_index       writer_index          capacity
//! ```
//!
//! The codec writes a frame by reserving the header region, streaming the
//! body after it and backfilling the header with [`ChannelBuffer::set_bytes`].
//! Decoding peeks at [`ChannelBuffer::readable`] and only moves the reader
//! cursor once a frame (or a chunk of garbage) is accepted.
//!
//! A buffer belongs to exactly one channel; calls that move its cursors
//! must not overlap.

use std::io;

use bytes::{Bytes, BytesMut};

/// Growable byte container with read/write cursors.
#[derive(Debug, Default, Clone)]
pub struct ChannelBuffer {
    storage: BytesMut,
    reader_index: usize,
    writer_index: usize,
}

impl ChannelBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create an empty buffer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: BytesMut::with_capacity(capacity),
            reader_index: 0,
            writer_index: 0,
        }
    }

    /// Create a buffer whose readable region is a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(data.len());
        buffer.write_bytes(data);
        buffer
    }

    #[inline]
    pub fn reader_index(&self) -> usize {
        self.reader_index
    }

    #[inline]
    pub fn writer_index(&self) -> usize {
        self.writer_index
    }

    /// Move the reader cursor.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the writer cursor.
    pub fn set_reader_index(&mut self, index: usize) {
        assert!(
            index <= self.writer_index,
            "reader index {} out of bounds (writer index {})",
            index,
            self.writer_index
        );
        self.reader_index = index;
    }

    /// Move the writer cursor, growing storage with zeroes if needed.
    ///
    /// # Panics
    ///
    /// Panics if `index` is before the reader cursor.
    pub fn set_writer_index(&mut self, index: usize) {
        assert!(
            index >= self.reader_index,
            "writer index {} before reader index {}",
            index,
            self.reader_index
        );
        self.ensure_len(index);
        self.writer_index = index;
    }

    /// Number of bytes between the two cursors.
    #[inline]
    pub fn readable_bytes(&self) -> usize {
        self.writer_index - self.reader_index
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.readable_bytes() > 0
    }

    /// Borrow the readable region without consuming it.
    #[inline]
    pub fn readable(&self) -> &[u8] {
        &self.storage[self.reader_index..self.writer_index]
    }

    /// Byte at an absolute index.
    pub fn get_byte(&self, index: usize) -> Option<u8> {
        if index < self.writer_index {
            Some(self.storage[index])
        } else {
            None
        }
    }

    /// Copy readable bytes into `dst`, advancing the reader cursor.
    ///
    /// Returns the number of bytes copied.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.readable_bytes());
        dst[..n].copy_from_slice(&self.storage[self.reader_index..self.reader_index + n]);
        self.reader_index += n;
        n
    }

    /// Take `len` readable bytes as an owned chunk.
    pub fn read_chunk(&mut self, len: usize) -> Bytes {
        let n = len.min(self.readable_bytes());
        let chunk = Bytes::copy_from_slice(&self.storage[self.reader_index..self.reader_index + n]);
        self.reader_index += n;
        chunk
    }

    /// Advance the reader cursor, clamped to the readable region.
    pub fn skip_bytes(&mut self, len: usize) -> usize {
        let n = len.min(self.readable_bytes());
        self.reader_index += n;
        n
    }

    /// Append bytes at the writer cursor.
    pub fn write_bytes(&mut self, src: &[u8]) {
        let end = self.writer_index + src.len();
        self.ensure_len(end);
        self.storage[self.writer_index..end].copy_from_slice(src);
        self.writer_index = end;
    }

    /// Overwrite bytes at an absolute index without moving any cursor.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the writer cursor.
    pub fn set_bytes(&mut self, index: usize, src: &[u8]) {
        let end = index + src.len();
        assert!(end <= self.writer_index, "set_bytes past writer index");
        self.storage[index..end].copy_from_slice(src);
    }

    /// Reset both cursors to zero.
    pub fn clear(&mut self) {
        self.reader_index = 0;
        self.writer_index = 0;
    }

    /// Drop already-read bytes and shift the readable region to offset 0.
    pub fn discard_read_bytes(&mut self) {
        if self.reader_index == 0 {
            return;
        }
        let _ = self.storage.split_to(self.reader_index);
        self.writer_index -= self.reader_index;
        self.reader_index = 0;
    }

    /// Copy the readable region into an owned `Bytes`.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.readable())
    }

    fn ensure_len(&mut self, len: usize) {
        if self.storage.len() < len {
            self.storage.resize(len, 0);
        }
    }
}

impl io::Read for ChannelBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf))
    }
}

impl io::BufRead for ChannelBuffer {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.readable())
    }

    fn consume(&mut self, amt: usize) {
        self.skip_bytes(amt);
    }
}

impl io::Write for ChannelBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
