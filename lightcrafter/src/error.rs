use crate::command::CommandId;
use core::result::Result as CoreResult;
use thiserror::Error;

pub type Result<T> = CoreResult<T, Error>;

/// Reason reported by the projector in an ERROR packet, or by a BUSY packet
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum DeviceError {
    #[error("Device is busy, try again later")]
    Busy,
    #[error("Command failed")]
    CommandFailed,
    #[error("Command is not supported")]
    UnsupportedCommand,
    #[error("Invalid parameter")]
    InvalidParameter,
    #[error("Device ran out of resources")]
    OutOfResource,
    #[error("Device failure")]
    DeviceFailure,
    #[error("Device is busy processing another request")]
    DeviceBusy,
    #[error("Device is not initialized")]
    NotInitialized,
    #[error("Requested object was not found")]
    NotFound,
    #[error("Device reported a checksum failure")]
    ChecksumFailed,
    #[error("Device reported a malformed packet")]
    PacketFormatError,
    #[error("Device reported a broken continuation sequence")]
    ContinuationFailed,
    #[error("Device reported an error without a reason")]
    Unspecified,
}

impl DeviceError {
    /// Bitmask positions in the order they are checked, lowest bit wins
    const BY_BIT: [DeviceError; 11] = [
        DeviceError::CommandFailed,
        DeviceError::UnsupportedCommand,
        DeviceError::InvalidParameter,
        DeviceError::OutOfResource,
        DeviceError::DeviceFailure,
        DeviceError::DeviceBusy,
        DeviceError::NotInitialized,
        DeviceError::NotFound,
        DeviceError::ChecksumFailed,
        DeviceError::PacketFormatError,
        DeviceError::ContinuationFailed,
    ];

    /// Decodes the payload of an ERROR packet. Each byte is a 1-based index of a bit in the
    /// error bitmask; indices outside of the known range are ignored.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mask = payload
            .iter()
            .filter(|idx| (1..=Self::BY_BIT.len() as u8).contains(*idx))
            .fold(0u16, |mask, idx| mask | 1 << (idx - 1));
        Self::from_mask(mask)
    }

    pub fn from_mask(mask: u16) -> Self {
        Self::BY_BIT
            .iter()
            .enumerate()
            .find(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, err)| *err)
            .unwrap_or(DeviceError::Unspecified)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection id should look like \"<host>:<port>\", got {0:?}")]
    InvalidAddress(String),
    #[error("Not connected to a device")]
    NotConnected,
    #[error("Connection was closed by the device")]
    ConnectionClosed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid checksum, expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("Expected {expected:?} packet, got {actual:?}")]
    UnexpectedResponse {
        expected: crate::packet::PacketKind,
        actual: crate::packet::PacketKind,
    },
    #[error("Unknown packet kind {0:#04x}")]
    UnknownPacketKind(u8),
    #[error("Continuation flag {flag} is not valid here")]
    InvalidContinuation { flag: u8 },
    #[error("Payload length field says {declared} bytes, packet carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("Unexpected end of package")]
    UnexpectedEop,
    #[error("Payload of {0} bytes does not fit into a single packet")]
    PayloadTooLarge(usize),
    #[error("Integers are limited to 4 bytes, requested {0}")]
    InvalidIntWidth(usize),
    #[error("No transfer is in progress")]
    NoTransfer,

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("{command} failed: {source}")]
    Command {
        command: CommandId,
        #[source]
        source: Box<Error>,
    },

    #[error("{0} is not a valid {1} code")]
    InvalidCode(u8, &'static str),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Bit depth {0} is not supported, expected 1 to 8")]
    InvalidBitDepth(u8),
    #[error("Exposure of {exposure}us is outside of {min}..={max}us allowed for bit depth {bit_depth}")]
    ExposureOutOfRange {
        bit_depth: u8,
        exposure: u32,
        min: u32,
        max: u32,
    },
    #[error("Period of {period}us is shorter than exposure of {exposure}us")]
    PeriodShorterThanExposure { exposure: u32, period: u32 },
    #[error("Pattern {index} differs from the first pattern in {field}")]
    HeterogeneousSequence { index: usize, field: &'static str },
    #[error("{count} patterns of bit depth {bit_depth} do not fit into the bitplane budget")]
    ExceedsBitplaneBudget { bit_depth: u8, count: usize },
    #[error("Image is {width}x{height}, expected {expected_width}x{expected_height}")]
    InvalidImageSize {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Sequence has no patterns")]
    EmptySequence,
    #[error("Patterns {start}..{end} are out of range for a sequence of {len}")]
    InvalidSequenceRange { start: usize, end: usize, len: usize },
    #[error("No pattern sequence was prepared")]
    NoSequencePrepared,
}

impl Error {
    /// Device reported reason behind this error, if there is one
    pub fn device_error(&self) -> Option<DeviceError> {
        match self {
            Error::Device(e) => Some(*e),
            Error::Command { source, .. } => source.device_error(),
            _ => None,
        }
    }

    /// True for errors after which the connection can no longer be trusted
    pub(crate) fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ConnectionClosed
                | Error::ChecksumMismatch { .. }
                | Error::UnexpectedResponse { .. }
                | Error::UnknownPacketKind(_)
                | Error::InvalidContinuation { .. }
                | Error::LengthMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lowest_bit_wins() {
        // Indices are 1-based: 3 = invalid parameter, 6 = device busy
        assert_eq!(DeviceError::from_payload(&[6, 3]), DeviceError::InvalidParameter);
        assert_eq!(DeviceError::from_payload(&[11]), DeviceError::ContinuationFailed);
        assert_eq!(DeviceError::from_payload(&[1, 2, 3]), DeviceError::CommandFailed);
    }

    #[test]
    fn unknown_indices_are_ignored() {
        assert_eq!(DeviceError::from_payload(&[]), DeviceError::Unspecified);
        assert_eq!(DeviceError::from_payload(&[0, 12, 200]), DeviceError::Unspecified);
        assert_eq!(DeviceError::from_payload(&[0, 8]), DeviceError::NotFound);
    }

    #[test]
    fn device_error_through_command_context() {
        let err = Error::Command {
            command: CommandId::DisplayMode,
            source: Box::new(Error::Device(DeviceError::NotInitialized)),
        };
        assert_eq!(err.device_error(), Some(DeviceError::NotInitialized));
        assert_eq!(Error::UnexpectedEop.device_error(), None);
    }
}
