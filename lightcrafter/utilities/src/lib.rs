use lazy_static::lazy_static;
use mockall::mock;
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::multispace0,
    combinator::{all_consuming, map_res},
    multi::many1,
    sequence::delimited,
    IResult,
};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    io::{Read, Write},
    rc::Rc,
};

const HEADER_SIZE: usize = 6;
const MAX_PAYLOAD_SIZE: usize = 0xFFFF;

/// Decodes a pair of chars formatted as hex into a byte. For example "FF" -> 255
fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |hex| u8::from_str_radix(hex, 16),
    )(input)
}

/// Parses a whitespace separated hex dump, as stored in resources/test
pub fn parse_hex_str(input: &str) -> IResult<&str, Vec<u8>> {
    all_consuming(many1(delimited(multispace0, hex_byte, multispace0)))(input)
}

/// Encodes a packet independently from the crate under test
pub fn encode_packet(kind: u8, command: u16, flag: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let [cmd_hi, cmd_lo] = command.to_be_bytes();
    let [len_lo, len_hi] = len.to_le_bytes();
    let mut packet = vec![kind, cmd_hi, cmd_lo, flag, len_lo, len_hi];
    packet.extend_from_slice(payload);
    let sum = packet.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    packet.push(sum);
    packet
}

lazy_static! {
    /// What a freshly powered projector answers to read requests
    pub static ref DEFAULT_READ_RESPONSES: HashMap<u16, Vec<u8>> = {
        let mut revision = b"DM365 SW 5.0.0".to_vec();
        revision.resize(32, 0);
        HashMap::from([
            (0x0100, revision),
            // Pattern sequence display
            (0x0101, vec![0x04]),
            // Checkerboard
            (0x0103, vec![0x00]),
            // Red, green, blue LED current of 274
            (0x0104, vec![0x12, 0x01, 0x12, 0x01, 0x12, 0x01]),
            (0x0107, vec![0x00, 0x00, 0x00]),
            (0x0404, vec![0x00; 10]),
            (0x0480, vec![0x00; 19]),
        ])
    };
}

mock! {
    pub IO {}
    impl Read for IO {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    }
    impl Write for IO {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
        fn flush(&mut self) -> std::io::Result<()>;
    }
}

/// One packet as the projector received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPacket {
    pub kind: u8,
    pub command: u16,
    pub flag: u8,
    pub payload: Vec<u8>,
}

/// A whole request, continuation packets joined together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub kind: u8,
    pub command: u16,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct DeviceState {
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    received: Vec<RecordedPacket>,
    transfers: Vec<Transfer>,
    pending: Option<Transfer>,
    read_responses: HashMap<u16, Vec<u8>>,
    errors: HashMap<u16, Vec<u8>>,
    busy: HashSet<u16>,
    kind_overrides: HashMap<u16, u8>,
    flag_overrides: HashMap<u16, u8>,
    corrupt_next: bool,
}

impl DeviceState {
    fn process_inbox(&mut self) {
        while self.inbox.len() >= HEADER_SIZE {
            let len = u16::from_le_bytes([self.inbox[4], self.inbox[5]]) as usize;
            let total = HEADER_SIZE + len + 1;
            if self.inbox.len() < total {
                return;
            }
            let raw: Vec<u8> = self.inbox.drain(..total).collect();
            let packet = RecordedPacket {
                kind: raw[0],
                command: u16::from_be_bytes([raw[1], raw[2]]),
                flag: raw[3],
                payload: raw[HEADER_SIZE..HEADER_SIZE + len].to_vec(),
            };
            self.accept(packet);
        }
    }

    fn accept(&mut self, packet: RecordedPacket) {
        let transfer = self.pending.get_or_insert_with(|| Transfer {
            kind: packet.kind,
            command: packet.command,
            payload: Vec::new(),
        });
        transfer.payload.extend_from_slice(&packet.payload);
        let complete = packet.flag == 0 || packet.flag == 3;
        self.received.push(packet);
        if complete {
            if let Some(transfer) = self.pending.take() {
                self.respond(&transfer);
                self.transfers.push(transfer);
            }
        }
    }

    fn respond(&mut self, request: &Transfer) {
        let command = request.command;
        if self.busy.contains(&command) {
            self.queue(encode_packet(0x00, command, 0, &[]));
            return;
        }
        if let Some(indices) = self.errors.get(&command).cloned() {
            self.queue(encode_packet(0x01, command, 0, &indices));
            return;
        }
        let kind = self
            .kind_overrides
            .get(&command)
            .copied()
            .unwrap_or(request.kind + 1);
        let payload = if request.kind == 0x04 {
            self.read_responses
                .get(&command)
                .or_else(|| DEFAULT_READ_RESPONSES.get(&command))
                .cloned()
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&[]]
        } else {
            payload.chunks(MAX_PAYLOAD_SIZE).collect()
        };
        let last = chunks.len() - 1;
        let mut packets = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let flag = match (i, last) {
                (0, 0) => 0,
                (0, _) => 1,
                (i, last) if i == last => 3,
                _ => 2,
            };
            let flag = self.flag_overrides.get(&command).copied().unwrap_or(flag);
            packets.push(encode_packet(kind, command, flag, chunk));
        }
        for packet in packets {
            self.queue(packet);
        }
    }

    fn queue(&mut self, mut packet: Vec<u8>) {
        if self.corrupt_next {
            self.corrupt_next = false;
            if let Some(sum) = packet.last_mut() {
                *sum = sum.wrapping_add(1);
            }
        }
        self.outbox.extend(packet);
    }
}

/// In-memory projector. Answers every complete request the way the real device would,
/// and records everything it was sent. Clones share the same device.
#[derive(Clone, Default)]
pub struct FakeProjector {
    state: Rc<RefCell<DeviceState>>,
}

impl FakeProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload returned for read requests of `command`
    pub fn set_read_response(&self, command: u16, payload: Vec<u8>) {
        self.state.borrow_mut().read_responses.insert(command, payload);
    }

    /// Answer requests of `command` with an ERROR packet carrying the given bit indices
    pub fn fail_with(&self, command: u16, indices: Vec<u8>) {
        self.state.borrow_mut().errors.insert(command, indices);
    }

    pub fn busy_on(&self, command: u16) {
        self.state.borrow_mut().busy.insert(command);
    }

    pub fn respond_with_kind(&self, command: u16, kind: u8) {
        self.state.borrow_mut().kind_overrides.insert(command, kind);
    }

    pub fn respond_with_flag(&self, command: u16, flag: u8) {
        self.state.borrow_mut().flag_overrides.insert(command, flag);
    }

    /// Break the checksum of the next packet sent back
    pub fn corrupt_next_response(&self) {
        self.state.borrow_mut().corrupt_next = true;
    }

    /// Every packet received so far
    pub fn received(&self) -> Vec<RecordedPacket> {
        self.state.borrow().received.clone()
    }

    /// Every complete request received so far
    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.borrow().transfers.clone()
    }

    /// Complete requests for one command
    pub fn transfers_for(&self, command: u16) -> Vec<Transfer> {
        self.state
            .borrow()
            .transfers
            .iter()
            .filter(|t| t.command == command)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        let mut state = self.state.borrow_mut();
        state.received.clear();
        state.transfers.clear();
    }
}

impl Read for FakeProjector {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.state.borrow_mut();
        let count = buf.len().min(state.outbox.len());
        for (dst, src) in buf.iter_mut().zip(state.outbox.drain(..count)) {
            *dst = src;
        }
        Ok(count)
    }
}

impl Write for FakeProjector {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.inbox.extend_from_slice(buf);
        state.process_inbox();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
