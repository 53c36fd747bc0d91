//! Wire format encoding and decoding.
//!
//! Implements the 16-byte header format:
//! ```text
//! ┌─────────┬───────┬────────┬────────────┬────────────┐
//! │ Magic   │ Flags │ Status │ Request ID │ Length     │
//! │ 2 bytes │ 1 byte│ 1 byte │ 8 bytes    │ 4 bytes    │
//! │ 0xDABB  │       │        │ uint64 BE  │ uint32 BE  │
//! └─────────┴───────┴────────┴────────────┴────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The status byte is only
//! meaningful for responses.

/// Header size in bytes (fixed, exactly 16).
pub const HEADER_LENGTH: usize = 16;

/// Magic number opening every frame.
pub const MAGIC: u16 = 0xDABB;

/// First byte of the magic number.
pub const MAGIC_HIGH: u8 = (MAGIC >> 8) as u8;

/// Second byte of the magic number.
pub const MAGIC_LOW: u8 = MAGIC as u8;

/// Flag constants for the protocol.
pub mod flags {
    /// Message type: request (1) or response (0).
    pub const REQUEST: u8 = 0b1000_0000;
    /// Reply expected (requests only).
    pub const TWO_WAY: u8 = 0b0100_0000;
    /// Control message (heartbeat, etc.) rather than a business call.
    pub const EVENT: u8 = 0b0010_0000;
    /// Serialization content type id (bits 0-4).
    pub const SERIALIZATION_MASK: u8 = 0b0001_1111;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }

    /// Build the flags byte for a request.
    #[inline]
    pub fn request(two_way: bool, event: bool, serialization_id: u8) -> u8 {
        let mut flags = REQUEST | (serialization_id & SERIALIZATION_MASK);
        if two_way {
            flags |= TWO_WAY;
        }
        if event {
            flags |= EVENT;
        }
        flags
    }

    /// Build the flags byte for a response.
    #[inline]
    pub fn response(event: bool, serialization_id: u8) -> u8 {
        let mut flags = serialization_id & SERIALIZATION_MASK;
        if event {
            flags |= EVENT;
        }
        flags
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Response status (0 for requests).
    pub status: u8,
    /// Request identifier shared by a request and its response.
    pub id: u64,
    /// Payload length in bytes.
    pub length: u32,
}

impl FrameHeader {
    /// Create a new header.
    pub fn new(flags: u8, status: u8, id: u64, length: u32) -> Self {
        Self {
            flags,
            status,
            id,
            length,
        }
    }

    /// Encode header to bytes (Big Endian), magic included.
    ///
    /// # Example
    ///
    /// ```
    /// use dabb_rpc::protocol::{flags, FrameHeader, HEADER_LENGTH};
    ///
    /// let header = FrameHeader::new(flags::request(true, false, 1), 0, 42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), HEADER_LENGTH);
    /// assert_eq!(&bytes[..2], &[0xDA, 0xBB]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_LENGTH] {
        let mut buf = [0u8; HEADER_LENGTH];
        buf[0] = MAGIC_HIGH;
        buf[1] = MAGIC_LOW;
        buf[2] = self.flags;
        buf[3] = self.status;
        buf[4..12].copy_from_slice(&self.id.to_be_bytes());
        buf[12..16].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if the buffer is too short or does not start with the
    /// magic number.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LENGTH || buf[0] != MAGIC_HIGH || buf[1] != MAGIC_LOW {
            return None;
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[4..12]);
        Some(Self {
            flags: buf[2],
            status: buf[3],
            id: u64::from_be_bytes(id),
            length: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    /// Check if this is a request.
    #[inline]
    pub fn is_request(&self) -> bool {
        flags::has_flag(self.flags, flags::REQUEST)
    }

    /// Check if a reply is expected.
    #[inline]
    pub fn is_two_way(&self) -> bool {
        flags::has_flag(self.flags, flags::TWO_WAY)
    }

    /// Check if this is an event.
    #[inline]
    pub fn is_event(&self) -> bool {
        flags::has_flag(self.flags, flags::EVENT)
    }

    /// Serialization content type id.
    #[inline]
    pub fn serialization_id(&self) -> u8 {
        self.flags & flags::SERIALIZATION_MASK
    }
}
