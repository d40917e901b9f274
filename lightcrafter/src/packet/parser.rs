use nom::{
    number::streaming::{be_u16, le_u16, le_u8},
    sequence::tuple,
    IResult,
};

use super::{Continuation, Header, PacketKind};
use crate::error::{Error, Result};

/// Raw header fields, codes are validated separately so a bad code is reported precisely
fn raw_header_parser(input: &[u8]) -> IResult<&[u8], (u8, u16, u8, u16)> {
    tuple((le_u8, be_u16, le_u8, le_u16))(input)
}

/// Parses a header, leaving payload and checksum in the remaining input
pub fn header_parser(input: &[u8]) -> IResult<&[u8], (u8, u16, u8, usize)> {
    let (input, (kind, command, flag, len)) = raw_header_parser(input)?;
    Ok((input, (kind, command, flag, len as usize)))
}

/// Decodes the first 6 bytes of `input` into a validated header
pub fn decode_header(input: &[u8]) -> Result<Header> {
    let (_, (kind, command, flag, payload_len)) =
        header_parser(input).map_err(|_| Error::UnexpectedEop)?;
    Ok(Header {
        kind: PacketKind::try_from_code(kind)?,
        command,
        continuation: Continuation::try_from_code(flag)?,
        payload_len,
    })
}
