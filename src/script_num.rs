//! Script number codec.
//!
//! Script numbers are little-endian sign-magnitude integers where the top bit
//! of the final byte carries the sign. Zero is the empty byte string.

use thiserror::Error;

use crate::ScriptError;

/// Maximum byte length of numbers consumed by arithmetic operations.
pub const MAXIMUM_SCRIPT_NUMBER_LENGTH: usize = 4;
/// Maximum byte length of numbers read by the time-lock operations.
pub const MAXIMUM_LOCKTIME_NUMBER_LENGTH: usize = 5;

const SIGN_BIT: u8 = 0x80;

/// Decoding failures.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScriptNumError {
    #[error("script number exceeds the maximum byte length")]
    OutOfRange,
    #[error("script number is not minimally encoded")]
    RequiresMinimal,
}

impl From<ScriptNumError> for ScriptError {
    fn from(_: ScriptNumError) -> Self {
        ScriptError::InvalidScriptNumber
    }
}

/// Decodes a script number of at most `max_length` bytes.
///
/// `max_length` must not exceed 8, the widest magnitude an `i64` can hold.
pub fn decode(
    bytes: &[u8],
    require_minimal: bool,
    max_length: usize,
) -> Result<i64, ScriptNumError> {
    debug_assert!(max_length <= 8);
    if bytes.len() > max_length {
        return Err(ScriptNumError::OutOfRange);
    }
    if require_minimal && !is_minimally_encoded(bytes) {
        return Err(ScriptNumError::RequiresMinimal);
    }
    Ok(decode_unchecked(bytes))
}

fn decode_unchecked(bytes: &[u8]) -> i64 {
    let Some((&last, _)) = bytes.split_last() else {
        return 0;
    };

    let mut magnitude: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        magnitude |= u64::from(byte) << (8 * i);
    }

    if last & SIGN_BIT != 0 {
        let mask = !(u64::from(SIGN_BIT) << (8 * (bytes.len() - 1)));
        -((magnitude & mask) as i64)
    } else {
        magnitude as i64
    }
}

/// Encodes `value` using the shortest representation.
pub fn encode(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut result = Vec::with_capacity(9);
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    if let Some(last) = result.last_mut() {
        if *last & SIGN_BIT != 0 {
            result.push(if negative { SIGN_BIT } else { 0x00 });
        } else if negative {
            *last |= SIGN_BIT;
        }
    }

    result
}

/// Encodes a boolean as a script number: `1` or the empty byte string.
pub fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

/// Whether `bytes` could not be any shorter without changing its value.
pub fn is_minimally_encoded(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [.., last] if last & !SIGN_BIT != 0 => true,
        [_] => false,
        [.., second_last, _] => second_last & SIGN_BIT != 0,
    }
}

/// Strips redundant padding from an arbitrary-length number encoding.
///
/// Works on the raw bytes so that numbers wider than a host integer (up to
/// the maximum stack item length) can be normalized.
pub fn minimally_encode(bytes: &[u8]) -> Vec<u8> {
    let mut data = bytes.to_vec();
    if is_minimally_encoded(&data) {
        return data;
    }

    let sign = data[data.len() - 1] & SIGN_BIT;
    let mut end = data.len() - 1;
    while end > 0 {
        let byte = data[end - 1];
        if byte != 0 {
            if byte & SIGN_BIT != 0 {
                data[end] = sign;
                data.truncate(end + 1);
            } else {
                data[end - 1] |= sign;
                data.truncate(end);
            }
            return data;
        }
        end -= 1;
    }
    Vec::new()
}

/// Pads a minimally-encoded number to exactly `length` bytes, moving the sign
/// bit into the new final byte.
pub fn pad_to_length(minimal: &[u8], length: usize) -> Vec<u8> {
    if minimal.len() >= length {
        return minimal.to_vec();
    }
    let mut padded = minimal.to_vec();
    let mut sign = 0x00;
    if let Some(last) = padded.last_mut() {
        sign = *last & SIGN_BIT;
        *last &= !SIGN_BIT;
    }
    padded.resize(length - 1, 0x00);
    padded.push(sign);
    padded
}

/// Stack item truthiness: any non-zero byte, except a lone trailing sign bit
/// (negative zero).
pub fn stack_item_is_truthy(item: &[u8]) -> bool {
    for (i, &byte) in item.iter().enumerate() {
        if byte != 0 {
            return !(i == item.len() - 1 && byte == SIGN_BIT);
        }
    }
    false
}
