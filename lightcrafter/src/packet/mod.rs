//! Wire packets exchanged with the projector.
//!
//! ```text
//! offset 0       : kind
//! offset 1-2     : command id, high byte first
//! offset 3       : continuation flag
//! offset 4-5     : payload length, low byte first
//! offset 6..6+N  : payload
//! offset 6+N     : checksum, low byte of the sum of all previous bytes
//! ```

pub mod parser;

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub const HEADER_SIZE: usize = 6;
pub const CHECKSUM_SIZE: usize = 1;
/// Largest payload a single packet can carry
pub const MAX_PAYLOAD_SIZE: usize = 0xFFFF;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PacketKind {
    Busy = 0x00,
    Error = 0x01,
    Write = 0x02,
    WriteResponse = 0x03,
    Read = 0x04,
    ReadResponse = 0x05,
}

impl PacketKind {
    pub fn try_from_code(c: u8) -> Result<Self> {
        match c {
            0x00 => Ok(PacketKind::Busy),
            0x01 => Ok(PacketKind::Error),
            0x02 => Ok(PacketKind::Write),
            0x03 => Ok(PacketKind::WriteResponse),
            0x04 => Ok(PacketKind::Read),
            0x05 => Ok(PacketKind::ReadResponse),
            _ => Err(Error::UnknownPacketKind(c)),
        }
    }

    /// Kind of the packet a device answers a request of this kind with
    pub fn response(self) -> Option<Self> {
        match self {
            PacketKind::Write => Some(PacketKind::WriteResponse),
            PacketKind::Read => Some(PacketKind::ReadResponse),
            _ => None,
        }
    }
}

/// Position of a packet within a transfer
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum Continuation {
    /// The whole transfer fits into this packet
    #[default]
    Single = 0,
    /// First packet, more will follow
    First = 1,
    /// Continues a previous packet, more will follow
    Middle = 2,
    /// Continues a previous packet, transfer ends here
    Last = 3,
}

impl Continuation {
    pub fn try_from_code(flag: u8) -> Result<Self> {
        use Continuation::*;
        match flag {
            0 => Ok(Single),
            1 => Ok(First),
            2 => Ok(Middle),
            3 => Ok(Last),
            _ => Err(Error::InvalidContinuation { flag }),
        }
    }

    /// Whether another packet of the same transfer follows this one
    pub fn more(self) -> bool {
        matches!(self, Continuation::First | Continuation::Middle)
    }

    /// Whether this packet may open a transfer
    pub fn starts_transfer(self) -> bool {
        matches!(self, Continuation::Single | Continuation::First)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Header {
    pub kind: PacketKind,
    pub command: u16,
    pub continuation: Continuation,
    pub payload_len: usize,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub command: u16,
    pub continuation: Continuation,
    pub payload: Bytes,
}

/// Low byte of the sum of all bytes
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |accum, b| accum.wrapping_add(*b))
}

impl Packet {
    pub fn new(kind: PacketKind, command: u16, continuation: Continuation, payload: &[u8]) -> Self {
        Packet {
            kind,
            command,
            continuation,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Total size of the packet on the wire
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(self.payload.len()));
        }
        let start = dst.len();
        dst.reserve(self.wire_len());
        dst.put_u8(self.kind as u8);
        dst.put_u16(self.command);
        dst.put_u8(self.continuation as u8);
        dst.put_u16_le(self.payload.len() as u16);
        dst.put_slice(&self.payload);
        let sum = checksum(&dst[start..]);
        dst.put_u8(sum);
        Ok(())
    }

    /// Decodes a complete packet. The checksum is verified before anything else, so a
    /// corrupted byte anywhere in the buffer is reported as a checksum mismatch.
    pub fn decode(src: &[u8]) -> Result<Packet> {
        let (body, expected) = match src.split_last() {
            Some((expected, body)) if src.len() >= HEADER_SIZE + CHECKSUM_SIZE => (body, *expected),
            _ => return Err(Error::UnexpectedEop),
        };
        let actual = checksum(body);
        if actual != expected {
            return Err(Error::ChecksumMismatch { expected, actual });
        }
        let header = parser::decode_header(body)?;
        let payload = &body[HEADER_SIZE..];
        if header.payload_len != payload.len() {
            return Err(Error::LengthMismatch {
                declared: header.payload_len,
                actual: payload.len(),
            });
        }
        Ok(Packet {
            kind: header.kind,
            command: header.command,
            continuation: header.continuation,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}
