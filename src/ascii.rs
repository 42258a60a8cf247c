//! Modbus ASCII framing for "Read Holding Registers" (function code `0x03`).
//!
//! An ASCII frame is a `:` followed by the binary message encoded as
//! uppercase hexadecimal digit pairs, terminated by a longitudinal
//! redundancy check (LRC) byte and `CR LF`.

use crate::protocol::RegisterBlock;

pub const FUNCTION_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const EXCEPTION_FLAG: u8 = 0x80;
pub const FRAME_START: u8 = b':';
pub const FRAME_END: &[u8] = b"\r\n";
/// Longest frame permitted by the Modbus serial line specification.
pub const MAX_FRAME_LEN: usize = 513;

/// A malformed or unexpected answer from the device.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Frame does not contain a start character")]
    MissingStart,

    #[error("Frame exceeds 513 characters")]
    TooLong,

    #[error("Frame is too short ({0} bytes)")]
    TooShort(usize),

    #[error("Frame contains invalid hexadecimal data: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("LRC mismatch: received {received:#04X}, calculated {calculated:#04X}")]
    LrcMismatch { received: u8, calculated: u8 },

    #[error("Answer from slave {received} while slave {expected} was addressed")]
    UnexpectedSlave { expected: u8, received: u8 },

    #[error("Unexpected function code {0:#04X}")]
    UnexpectedFunction(u8),

    #[error("Device answered with exception code {0:#04X}")]
    Exception(u8),

    #[error("Byte count {declared} does not match the {expected} expected data bytes")]
    ByteCountMismatch { declared: usize, expected: usize },
}

/// Two's complement of the 8-bit sum of all message bytes.
pub fn lrc(message: &[u8]) -> u8 {
    message
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

fn encode_frame(message: &[u8]) -> Vec<u8> {
    let mut binary = message.to_vec();
    binary.push(lrc(message));

    let mut frame = Vec::with_capacity(binary.len() * 2 + 3);
    frame.push(FRAME_START);
    frame.extend_from_slice(hex::encode_upper(&binary).as_bytes());
    frame.extend_from_slice(FRAME_END);
    frame
}

/// Builds the request frame reading `block` from `slave`.
pub fn encode_read_holding_registers(slave: u8, block: &RegisterBlock) -> Vec<u8> {
    let mut message = vec![slave, FUNCTION_READ_HOLDING_REGISTERS];
    message.extend_from_slice(&block.start().to_be_bytes());
    message.extend_from_slice(&block.count().to_be_bytes());
    encode_frame(&message)
}

/// Extracts the binary message (without LRC) from an ASCII frame.
///
/// Anything received before the start character is ignored.
pub fn decode_frame(raw: &[u8]) -> Result<Vec<u8>, FrameError> {
    let start = raw
        .iter()
        .position(|b| *b == FRAME_START)
        .ok_or(FrameError::MissingStart)?;
    let body = raw[start + 1..]
        .strip_suffix(FRAME_END)
        .unwrap_or(&raw[start + 1..]);
    if body.len() + 3 > MAX_FRAME_LEN {
        return Err(FrameError::TooLong);
    }

    let mut message = hex::decode(body)?;
    let received = match message.pop() {
        Some(received) if !message.is_empty() => received,
        _ => return Err(FrameError::TooShort(body.len() / 2)),
    };
    let calculated = lrc(&message);
    if received != calculated {
        return Err(FrameError::LrcMismatch {
            received,
            calculated,
        });
    }
    Ok(message)
}

/// Decodes the answer to a request built by [`encode_read_holding_registers`]
/// and returns the register data bytes.
pub fn decode_read_holding_registers(
    raw: &[u8],
    slave: u8,
    block: &RegisterBlock,
) -> Result<Vec<u8>, FrameError> {
    let message = decode_frame(raw)?;
    if message.len() < 3 {
        return Err(FrameError::TooShort(message.len()));
    }
    if message[0] != slave {
        return Err(FrameError::UnexpectedSlave {
            expected: slave,
            received: message[0],
        });
    }
    match message[1] {
        FUNCTION_READ_HOLDING_REGISTERS => {}
        code if code == FUNCTION_READ_HOLDING_REGISTERS | EXCEPTION_FLAG => {
            return Err(FrameError::Exception(message[2]));
        }
        code => return Err(FrameError::UnexpectedFunction(code)),
    }

    let data = &message[3..];
    let declared = message[2] as usize;
    if declared != data.len() || declared != block.byte_len() {
        return Err(FrameError::ByteCountMismatch {
            declared,
            expected: block.byte_len(),
        });
    }
    Ok(data.to_vec())
}
