//! Fixed-layout binary codec for [`OrderRecord`].
//!
//! Layout (little-endian, no padding, no length prefix):
//!
//! | offset | size | field          |
//! |--------|------|----------------|
//! | 0      | 4    | id (u32)       |
//! | 4      | 100  | description, zero padded |
//! | 104    | 8    | submitted_at (i64 ms) |
//! | 112    | 8    | ready_at (i64 ms) |

use crate::error::CodecError;
use crate::types::{MAX_DESCRIPTION, OrderRecord, bound_description};

const ID_OFFSET: usize = 0;
const DESCRIPTION_OFFSET: usize = ID_OFFSET + 4;
const SUBMITTED_OFFSET: usize = DESCRIPTION_OFFSET + MAX_DESCRIPTION;
const READY_OFFSET: usize = SUBMITTED_OFFSET + 8;

/// Size in bytes of one record on the wire.
pub const RECORD_SIZE: usize = READY_OFFSET + 8;

pub fn encode(record: &OrderRecord) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[ID_OFFSET..DESCRIPTION_OFFSET].copy_from_slice(&record.id.to_le_bytes());
    let text = bound_description(&record.description).as_bytes();
    buf[DESCRIPTION_OFFSET..DESCRIPTION_OFFSET + text.len()].copy_from_slice(text);
    buf[SUBMITTED_OFFSET..READY_OFFSET].copy_from_slice(&record.submitted_at.to_le_bytes());
    buf[READY_OFFSET..RECORD_SIZE].copy_from_slice(&record.ready_at.to_le_bytes());
    buf
}

pub fn decode(buf: &[u8]) -> Result<OrderRecord, CodecError> {
    if buf.len() != RECORD_SIZE {
        return Err(CodecError::Length {
            expected: RECORD_SIZE,
            actual: buf.len(),
        });
    }
    let field = &buf[DESCRIPTION_OFFSET..SUBMITTED_OFFSET];
    let text_len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let description = std::str::from_utf8(&field[..text_len])?.to_string();
    Ok(OrderRecord {
        id: u32::from_le_bytes(le_array(&buf[ID_OFFSET..DESCRIPTION_OFFSET])),
        description,
        submitted_at: i64::from_le_bytes(le_array(&buf[SUBMITTED_OFFSET..READY_OFFSET])),
        ready_at: i64::from_le_bytes(le_array(&buf[READY_OFFSET..RECORD_SIZE])),
    })
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
