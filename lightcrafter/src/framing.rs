//! Request/response transfers on top of single packets.
//!
//! A request is assembled with `begin` and the `put_*` calls and sent with `finish`, which
//! waits for the response. Payloads larger than one packet are split transparently using the
//! continuation flag, in both directions.

use crate::{
    command::CommandId,
    error::{DeviceError, Error, Result},
    io_adapter::IoAdapter,
    packet::{
        parser::header_parser, Continuation, Packet, PacketKind, CHECKSUM_SIZE, HEADER_SIZE,
        MAX_PAYLOAD_SIZE,
    },
};
use bytes::{BufMut, BytesMut};
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

const FILE_CHUNK_SIZE: usize = 0x4000;

/// Request being assembled
struct Outgoing {
    kind: PacketKind,
    command: u16,
    payload: BytesMut,
    /// At least one packet of this request was already sent
    continuing: bool,
}

/// Response being consumed, possibly spanning several packets
struct PendingTransfer {
    kind: PacketKind,
    command: u16,
    packet: Packet,
    /// Bytes of the current packet payload already consumed
    cursor: usize,
}

impl PendingTransfer {
    fn remaining(&self) -> &[u8] {
        &self.packet.payload[self.cursor..]
    }

    fn more(&self) -> bool {
        self.packet.continuation.more()
    }
}

pub struct Link<IO: IoAdapter> {
    io: IO,
    tx: BytesMut,
    outgoing: Option<Outgoing>,
    incoming: Option<PendingTransfer>,
    broken: bool,
}

impl<IO: IoAdapter> Link<IO> {
    pub fn new(io: IO) -> Self {
        Link {
            io,
            tx: BytesMut::with_capacity(HEADER_SIZE + MAX_PAYLOAD_SIZE + CHECKSUM_SIZE),
            outgoing: None,
            incoming: None,
            broken: false,
        }
    }

    /// False once a transport or framing error left the stream in an unknown state
    pub fn is_valid(&self) -> bool {
        !self.broken
    }

    pub fn get_ref(&self) -> &IO {
        &self.io
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    fn check(&mut self) -> Result<()> {
        if self.broken {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }

    /// Marks the link as unusable when `res` carries an error that desynchronized the stream
    fn track<T>(&mut self, res: Result<T>) -> Result<T> {
        if let Err(e) = &res {
            if e.breaks_connection() {
                log::warn!("Connection is no longer usable: {}", e);
                self.broken = true;
                self.outgoing = None;
                self.incoming = None;
            }
        }
        res
    }

    /// Starts assembling a new request
    pub fn begin(&mut self, kind: PacketKind, command: CommandId) -> Result<()> {
        self.check()?;
        let res = self.drain_incoming();
        self.track(res)?;
        self.outgoing = Some(Outgoing {
            kind,
            command: command.code(),
            payload: BytesMut::new(),
            continuing: false,
        });
        Ok(())
    }

    /// Consumes packets left over from a response that was not read to the end
    fn drain_incoming(&mut self) -> Result<()> {
        while let Some(transfer) = self.incoming.take() {
            if !transfer.more() {
                break;
            }
            log::warn!(
                "Dropping unread continuation of command {:#06x}",
                transfer.command
            );
            let packet = self.receive_packet(transfer.kind, false)?;
            self.incoming = Some(PendingTransfer {
                packet,
                cursor: 0,
                ..transfer
            });
        }
        Ok(())
    }

    fn outgoing(&mut self) -> Result<&mut Outgoing> {
        self.check()?;
        self.outgoing.as_mut().ok_or(Error::NoTransfer)
    }

    pub fn put_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        self.outgoing()?;
        while !data.is_empty() {
            if self.outgoing()?.payload.len() == MAX_PAYLOAD_SIZE {
                let res = self.send_packet(true);
                self.track(res)?;
            }
            let out = self.outgoing()?;
            let count = data.len().min(MAX_PAYLOAD_SIZE - out.payload.len());
            out.payload.put_slice(&data[..count]);
            data = &data[count..];
        }
        Ok(())
    }

    /// Writes the low `width` bytes of `value`, little-endian
    pub fn put_int(&mut self, value: u32, width: usize) -> Result<()> {
        if width > 4 {
            return Err(Error::InvalidIntWidth(width));
        }
        self.put_bytes(&value.to_le_bytes()[..width])
    }

    /// Streams the whole file into the request, returns the number of bytes sent
    pub fn put_file(&mut self, path: &Path) -> Result<u64> {
        let mut file = File::open(path)?;
        let mut chunk = [0u8; FILE_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let count = file.read(&mut chunk)?;
            if count == 0 {
                break;
            }
            self.put_bytes(&chunk[..count])?;
            total += count as u64;
        }
        log::debug!("Queued {} bytes from {:?}", total, path);
        Ok(total)
    }

    /// Sends whatever payload is buffered as one packet
    fn send_packet(&mut self, more: bool) -> Result<()> {
        let out = self.outgoing.as_mut().ok_or(Error::NoTransfer)?;
        let continuation = match (out.continuing, more) {
            (false, false) => Continuation::Single,
            (false, true) => Continuation::First,
            (true, true) => Continuation::Middle,
            (true, false) => Continuation::Last,
        };
        let packet = Packet {
            kind: out.kind,
            command: out.command,
            continuation,
            payload: out.payload.split().freeze(),
        };
        out.continuing = more;

        self.tx.clear();
        packet.encode(&mut self.tx)?;
        log::debug!(
            "Sending {:?} {:#06x} ({:?}, {} bytes)",
            packet.kind,
            packet.command,
            packet.continuation,
            packet.payload.len()
        );
        self.io.write_all(&self.tx)
    }

    /// Sends the last packet of the request and waits for the first packet of the response
    pub fn finish(&mut self) -> Result<()> {
        let res = self.finish_inner();
        self.track(res)
    }

    fn finish_inner(&mut self) -> Result<()> {
        self.send_packet(false)?;
        let out = self.outgoing.take().ok_or(Error::NoTransfer)?;
        let kind = out.kind.response().ok_or(Error::NoTransfer)?;
        let packet = self.receive_packet(kind, true)?;
        self.incoming = Some(PendingTransfer {
            kind,
            command: out.command,
            packet,
            cursor: 0,
        });
        Ok(())
    }

    /// Reads one packet and validates it as part of a response of `expected` kind
    fn receive_packet(&mut self, expected: PacketKind, first: bool) -> Result<Packet> {
        let mut raw = vec![0u8; HEADER_SIZE];
        self.io.read_exact(&mut raw)?;
        let (_, (_, _, _, payload_len)) =
            header_parser(&raw).map_err(|_| Error::UnexpectedEop)?;
        raw.resize(HEADER_SIZE + payload_len + CHECKSUM_SIZE, 0);
        self.io.read_exact(&mut raw[HEADER_SIZE..])?;

        let packet = Packet::decode(&raw)?;
        log::debug!(
            "Received {:?} {:#06x} ({:?}, {} bytes)",
            packet.kind,
            packet.command,
            packet.continuation,
            packet.payload.len()
        );
        match packet.kind {
            kind if kind == expected => {
                if packet.continuation.starts_transfer() != first {
                    return Err(Error::InvalidContinuation {
                        flag: packet.continuation as u8,
                    });
                }
                Ok(packet)
            }
            PacketKind::Busy => Err(DeviceError::Busy.into()),
            PacketKind::Error => {
                let err = DeviceError::from_payload(&packet.payload);
                log::warn!("Device rejected command {:#06x}: {}", packet.command, err);
                Err(err.into())
            }
            actual => Err(Error::UnexpectedResponse { expected, actual }),
        }
    }

    fn incoming(&mut self) -> Result<&mut PendingTransfer> {
        self.check()?;
        self.incoming.as_mut().ok_or(Error::NoTransfer)
    }

    /// Makes sure the current response packet has unread bytes, pulling the next
    /// continuation packet if needed. Returns false when the response is fully consumed.
    fn refill(&mut self) -> Result<bool> {
        let transfer = self.incoming()?;
        if !transfer.remaining().is_empty() {
            return Ok(true);
        }
        if !transfer.more() {
            return Ok(false);
        }
        let kind = transfer.kind;
        log::trace!("Response continues in the next packet");
        let res = self.receive_packet(kind, false);
        let packet = self.track(res)?;
        let transfer = self.incoming()?;
        transfer.packet = packet;
        transfer.cursor = 0;
        Ok(true)
    }

    /// Reads exactly `buf.len()` bytes of the response
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if !self.refill()? {
                return Err(Error::UnexpectedEop);
            }
            let transfer = self.incoming()?;
            let available = transfer.remaining();
            let count = available.len().min(buf.len() - filled);
            buf[filled..filled + count].copy_from_slice(&available[..count]);
            transfer.cursor += count;
            filled += count;
        }
        Ok(())
    }

    /// Reads a little-endian integer of `width` bytes
    pub fn get_int(&mut self, width: usize) -> Result<u32> {
        if width > 4 {
            return Err(Error::InvalidIntWidth(width));
        }
        let mut bytes = [0u8; 4];
        self.get_bytes(&mut bytes[..width])?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Stores `size` bytes of the response into a file. A `size` of 0 stores everything
    /// until the device marks the end of the transfer.
    pub fn get_file(&mut self, path: &Path, size: usize) -> Result<u64> {
        let mut file = File::create(path)?;
        let mut total = 0u64;
        if size == 0 {
            while self.refill()? {
                let transfer = self.incoming()?;
                let available = transfer.remaining();
                file.write_all(available)?;
                total += available.len() as u64;
                transfer.cursor = transfer.packet.payload.len();
            }
        } else {
            let mut chunk = [0u8; FILE_CHUNK_SIZE];
            let mut left = size;
            while left > 0 {
                let count = left.min(FILE_CHUNK_SIZE);
                self.get_bytes(&mut chunk[..count])?;
                file.write_all(&chunk[..count])?;
                left -= count;
                total += count as u64;
            }
        }
        log::debug!("Stored {} bytes into {:?}", total, path);
        Ok(total)
    }

    /// One complete exchange with a payload that fits in memory. Returns the first response
    /// packet, any further continuation packets are left for `get_*` calls.
    pub fn send_command(
        &mut self,
        kind: PacketKind,
        command: CommandId,
        payload: &[u8],
    ) -> Result<Packet> {
        self.begin(kind, command)?;
        self.put_bytes(payload)?;
        self.finish()?;
        Ok(self.incoming()?.packet.clone())
    }
}
