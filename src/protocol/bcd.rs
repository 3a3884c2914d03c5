//! Packed-BCD integer decoding.
//!
//! Each byte carries two decimal digits, high nibble first.  Meters
//! disagree on byte order, so there are two scan directions:
//!
//! - [`bcd_to_int`]: least-significant byte first (M-Bus style), e.g.
//!   `56 34 12 00` → `123456`.
//! - [`reverse_bcd_to_int`]: most-significant byte first, e.g.
//!   `12 34 56` → `123456`.
//!
//! Both are total functions: an empty slice decodes to `0`.  Nibbles above
//! 9 are not rejected; they contribute their numeric value just as the
//! meters' own reference decoding does.  Arithmetic wraps instead of
//! panicking on absurdly long inputs.

/// Decode bytes scanned from the last to the first.
pub fn bcd_to_int(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0, |acc, &b| push_digits(acc, b))
}

/// Decode bytes scanned from the first to the last.
pub fn reverse_bcd_to_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| push_digits(acc, b))
}

#[inline]
fn push_digits(acc: u64, byte: u8) -> u64 {
    let hi = u64::from(byte >> 4);
    let lo = u64::from(byte & 0x0F);
    acc.wrapping_mul(10)
        .wrapping_add(hi)
        .wrapping_mul(10)
        .wrapping_add(lo)
}
