//! Client-side RAM byte-cost previews. The chain's own accounting is
//! authoritative; these mirror its fixed per-row overhead plus field
//! lengths.

use crate::locator::Record;

/// Storage-side bookkeeping bytes charged per row.
pub const FIXED_ROW_COST: i64 = 284;

/// Bytes consumed by inserting `key` with `value`.
pub fn add(key: &str, value: &str) -> i64 {
    FIXED_ROW_COST + key.len() as i64 + value.len() as i64
}

/// Byte delta of replacing the stored value with `new_value`.
pub fn set(current: &Record, new_value: &str) -> i64 {
    new_value.len() as i64 - current.value.len() as i64
}

/// Byte delta of renaming the stored key to `new_key`.
pub fn rekey(current: &Record, new_key: &str) -> i64 {
    new_key.len() as i64 - current.key.len() as i64
}

/// Bytes released by deleting the row.
pub fn delete(current: &Record) -> i64 {
    -(FIXED_ROW_COST + current.key.len() as i64 + current.value.len() as i64)
}
