//! Machine-format integers used inside redo log bodies.
//!
//! Fixed-width integers are big-endian. Compressed integers spend one to five
//! bytes depending on magnitude; the leading bits of the first byte encode
//! the width:
//!
//! | value range            | bytes | first byte  |
//! |------------------------|-------|-------------|
//! | `< 0x80`               | 1     | `0xxxxxxx`  |
//! | `< 0x4000`             | 2     | `10xxxxxx`  |
//! | `< 0x20_0000`          | 3     | `110xxxxx`  |
//! | `< 0x1000_0000`        | 4     | `1110xxxx`  |
//! | otherwise              | 5     | `11110000`  |

use common::{DbError, DbResult};

pub fn compressed_size(n: u32) -> usize {
    match n {
        0..0x80 => 1,
        0x80..0x4000 => 2,
        0x4000..0x20_0000 => 3,
        0x20_0000..0x1000_0000 => 4,
        _ => 5,
    }
}

pub fn write_compressed(out: &mut Vec<u8>, n: u32) -> usize {
    match compressed_size(n) {
        1 => out.push(n as u8),
        2 => out.extend_from_slice(&((n | 0x8000) as u16).to_be_bytes()),
        3 => out.extend_from_slice(&(n | 0xC0_0000).to_be_bytes()[1..]),
        4 => out.extend_from_slice(&(n | 0xE000_0000).to_be_bytes()),
        _ => {
            out.push(0xF0);
            out.extend_from_slice(&n.to_be_bytes());
        }
    }
    compressed_size(n)
}

/// Decode a compressed integer at the start of `buf`, returning the value
/// and the number of bytes consumed. `Ok(None)` when `buf` ends early; a
/// first byte above `0xF0` is never written and is reported as corruption.
pub fn parse_compressed(buf: &[u8]) -> DbResult<Option<(u32, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let width = match first {
        0..0x80 => 1,
        0x80..0xC0 => 2,
        0xC0..0xE0 => 3,
        0xE0..0xF0 => 4,
        0xF0 => 5,
        _ => {
            return Err(DbError::CorruptLog(format!(
                "compressed integer prefix {first:#04x}"
            )));
        }
    };
    let Some(bytes) = buf.get(..width) else {
        return Ok(None);
    };
    let value = match width {
        1 => first as u32,
        2 => u16::from_be_bytes([bytes[0], bytes[1]]) as u32 & 0x7FFF,
        3 => u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]) & 0x3F_FFFF,
        4 => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & 0x1FFF_FFFF,
        _ => u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
    };
    Ok(Some((value, width)))
}

pub fn read_u16(buf: &[u8]) -> Option<u16> {
    let bytes = buf.get(..2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(buf: &[u8]) -> Option<u32> {
    let bytes = buf.get(..4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn widths_follow_magnitude() {
        for (n, width) in [
            (0, 1),
            (0x7F, 1),
            (0x80, 2),
            (0x3FFF, 2),
            (0x4000, 3),
            (0x1F_FFFF, 3),
            (0x20_0000, 4),
            (0x0FFF_FFFF, 4),
            (0x1000_0000, 5),
            (u32::MAX, 5),
        ] {
            let mut out = Vec::new();
            assert_eq!(write_compressed(&mut out, n), width, "{n:#x}");
            assert_eq!(out.len(), width);
            assert_eq!(parse_compressed(&out).unwrap(), Some((n, width)));
        }
    }

    #[test]
    fn known_encodings() {
        let mut out = Vec::new();
        write_compressed(&mut out, 0x1234);
        assert_eq!(out, [0x92, 0x34]);
        out.clear();
        write_compressed(&mut out, 0x12_3456);
        assert_eq!(out, [0xD2, 0x34, 0x56]);
        out.clear();
        write_compressed(&mut out, 0x0123_4567);
        assert_eq!(out, [0xE1, 0x23, 0x45, 0x67]);
    }

    #[test]
    fn truncated_input_is_incomplete() {
        let mut out = Vec::new();
        write_compressed(&mut out, 0x4_0000);
        assert_eq!(parse_compressed(&out[..2]).unwrap(), None);
        assert_eq!(parse_compressed(&[]).unwrap(), None);
        assert_eq!(read_u16(&[1]), None);
        assert_eq!(read_u32(&[1, 2, 3]), None);
    }

    #[test]
    fn only_0xf0_introduces_the_five_byte_form() {
        for first in 0xF1..=0xFF {
            let buf = [first, 0x12, 0x34, 0x56, 0x78];
            assert!(
                matches!(parse_compressed(&buf), Err(DbError::CorruptLog(_))),
                "{first:#x}"
            );
        }
        let buf = [0xF0, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(parse_compressed(&buf).unwrap(), Some((0x1234_5678, 5)));
        // An invalid prefix is corruption even when the rest is missing.
        assert!(parse_compressed(&[0xFF]).is_err());
    }

    proptest! {
        #[test]
        fn any_value_survives(n in any::<u32>(), tail in proptest::collection::vec(any::<u8>(), 0..4)) {
            let mut out = Vec::new();
            let width = write_compressed(&mut out, n);
            out.extend_from_slice(&tail);
            prop_assert_eq!(parse_compressed(&out).unwrap(), Some((n, width)));
        }
    }
}
