//! Physical record header and the record-format seam.
//!
//! Every record carries a five byte fixed header right before its origin:
//!
//! ```text
//!  origin-5        origin-4 .. origin-3        origin-2 .. origin-1
//! ┌───────────────┬──────────────────────────┬──────────────────────┐
//! │ info | owned  │ heap_no (13) | status (3)│ relative next (i16)  │
//! └───────────────┴──────────────────────────┴──────────────────────┘
//! ```
//!
//! Bytes before `origin-5` belong to the record format (field lengths, null
//! markers) and are only interpreted through a [`RecordView`].

use std::ops::Range;

use common::DbResult;

pub const REC_N_NEW_EXTRA_BYTES: usize = 5;

const REC_NEW_INFO_BITS: usize = 5;
const REC_NEW_HEAP_NO: usize = 4;
const REC_NEXT: usize = 2;

pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;
pub const REC_INFO_DELETED_FLAG: u8 = 0x20;
const REC_INFO_BITS_MASK: u8 = 0xF0;
const REC_N_OWNED_MASK: u8 = 0x0F;
pub const REC_MAX_N_OWNED: usize = REC_N_OWNED_MASK as usize;

pub const REC_STATUS_ORDINARY: u8 = 0;
pub const REC_STATUS_NODE_PTR: u8 = 1;
pub const REC_STATUS_INFIMUM: u8 = 2;
pub const REC_STATUS_SUPREMUM: u8 = 3;
const REC_STATUS_MASK: u16 = 0x7;
const REC_HEAP_NO_SHIFT: u16 = 3;

pub fn n_owned(buf: &[u8], origin: usize) -> usize {
    (buf[origin - REC_NEW_INFO_BITS] & REC_N_OWNED_MASK) as usize
}

pub fn set_n_owned(buf: &mut [u8], origin: usize, n: usize) {
    debug_assert!(n <= REC_MAX_N_OWNED);
    let b = &mut buf[origin - REC_NEW_INFO_BITS];
    *b = (*b & REC_INFO_BITS_MASK) | (n as u8 & REC_N_OWNED_MASK);
}

pub fn info_bits(buf: &[u8], origin: usize) -> u8 {
    buf[origin - REC_NEW_INFO_BITS] & REC_INFO_BITS_MASK
}

pub fn set_info_bits(buf: &mut [u8], origin: usize, bits: u8) {
    let b = &mut buf[origin - REC_NEW_INFO_BITS];
    *b = (*b & REC_N_OWNED_MASK) | (bits & REC_INFO_BITS_MASK);
}

fn heap_field(buf: &[u8], origin: usize) -> u16 {
    let pos = origin - REC_NEW_HEAP_NO;
    u16::from_be_bytes([buf[pos], buf[pos + 1]])
}

fn set_heap_field(buf: &mut [u8], origin: usize, value: u16) {
    let pos = origin - REC_NEW_HEAP_NO;
    buf[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn status(buf: &[u8], origin: usize) -> u8 {
    (heap_field(buf, origin) & REC_STATUS_MASK) as u8
}

pub fn set_status(buf: &mut [u8], origin: usize, status: u8) {
    let field = heap_field(buf, origin) & !REC_STATUS_MASK;
    set_heap_field(buf, origin, field | (status as u16 & REC_STATUS_MASK));
}

pub fn heap_no(buf: &[u8], origin: usize) -> u16 {
    heap_field(buf, origin) >> REC_HEAP_NO_SHIFT
}

pub fn set_heap_no(buf: &mut [u8], origin: usize, heap_no: u16) {
    let field = heap_field(buf, origin) & REC_STATUS_MASK;
    set_heap_field(buf, origin, field | (heap_no << REC_HEAP_NO_SHIFT));
}

/// Info bits in the high nibble, status in the low three bits.
pub fn info_and_status_bits(buf: &[u8], origin: usize) -> u8 {
    info_bits(buf, origin) | status(buf, origin)
}

pub fn set_info_and_status_bits(buf: &mut [u8], origin: usize, bits: u8) {
    set_info_bits(buf, origin, bits);
    set_status(buf, origin, bits & REC_STATUS_MASK as u8);
}

/// Absolute offset of the next record, or 0 at the end of a list.
pub fn next_offs(buf: &[u8], origin: usize) -> usize {
    let pos = origin - REC_NEXT;
    let field = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
    if field == 0 {
        0
    } else {
        (origin as u16).wrapping_add(field) as usize
    }
}

/// Store `next` relative to `origin`; 0 terminates the list.
pub fn set_next_offs(buf: &mut [u8], origin: usize, next: usize) {
    let field = if next == 0 {
        0
    } else {
        (next as u16).wrapping_sub(origin as u16)
    };
    let pos = origin - REC_NEXT;
    buf[pos..pos + 2].copy_from_slice(&field.to_be_bytes());
}

/// Copy the record described by `offsets` from `src` into `dst` starting at
/// byte `start`. Returns the origin of the copy.
pub fn copy_rec(
    dst: &mut [u8],
    start: usize,
    src: &[u8],
    origin: usize,
    offsets: &RecOffsets,
) -> usize {
    let extra = offsets.extra_size();
    let total = offsets.total_size();
    let from = origin - extra;
    dst[start..start + total].copy_from_slice(&src[from..from + total]);
    start + extra
}

/// Layout of one physical record: header size and per-field data ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecOffsets {
    extra: usize,
    ends: Vec<usize>,
    nulls: Vec<bool>,
}

impl RecOffsets {
    pub fn new(extra: usize) -> Self {
        Self {
            extra,
            ends: Vec::new(),
            nulls: Vec::new(),
        }
    }

    /// Layout shared by both sentinels: fixed header and one 8-byte field.
    pub fn sentinel() -> Self {
        let mut offsets = Self::new(REC_N_NEW_EXTRA_BYTES);
        offsets.push_field(8, false);
        offsets
    }

    pub fn reset(&mut self) {
        self.extra = 0;
        self.ends.clear();
        self.nulls.clear();
    }

    pub fn set_extra_size(&mut self, extra: usize) {
        self.extra = extra;
    }

    pub fn push_field(&mut self, len: usize, null: bool) {
        let start = self.data_size();
        self.ends.push(start + len);
        self.nulls.push(null);
    }

    /// Header bytes before the origin.
    pub fn extra_size(&self) -> usize {
        self.extra
    }

    /// Data bytes from the origin on.
    pub fn data_size(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn total_size(&self) -> usize {
        self.extra + self.data_size()
    }

    pub fn n_fields(&self) -> usize {
        self.ends.len()
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.nulls[i]
    }

    /// Range of field `i` relative to the origin; `None` for SQL NULL.
    pub fn field_range(&self, i: usize) -> Option<Range<usize>> {
        if self.nulls[i] {
            return None;
        }
        let start = if i == 0 { 0 } else { self.ends[i - 1] };
        Some(start..self.ends[i])
    }
}

/// Borrowed view of one record inside a buffer.
#[derive(Clone, Copy, Debug)]
pub struct RecordRef<'a> {
    buf: &'a [u8],
    origin: usize,
}

impl<'a> RecordRef<'a> {
    pub fn new(buf: &'a [u8], origin: usize) -> Self {
        Self { buf, origin }
    }

    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn status(&self) -> u8 {
        status(self.buf, self.origin)
    }

    pub fn info_bits(&self) -> u8 {
        info_bits(self.buf, self.origin)
    }

    pub fn heap_no(&self) -> u16 {
        heap_no(self.buf, self.origin)
    }

    pub fn n_owned(&self) -> usize {
        n_owned(self.buf, self.origin)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.status(), REC_STATUS_INFIMUM | REC_STATUS_SUPREMUM)
    }

    /// Bytes of field `i`, or `None` for SQL NULL.
    pub fn field(&self, offsets: &RecOffsets, i: usize) -> Option<&'a [u8]> {
        offsets
            .field_range(i)
            .map(|r| &self.buf[self.origin + r.start..self.origin + r.end])
    }

    /// The whole record, header bytes included.
    pub fn bytes(&self, offsets: &RecOffsets) -> &'a [u8] {
        let start = self.origin - offsets.extra_size();
        &self.buf[start..self.origin + offsets.data_size()]
    }
}

/// Computes the physical layout of records stored in some format.
pub trait RecordView {
    /// Parse the format-specific header of the user record at `origin`.
    /// Returns `None` when the header does not fit inside `buf`.
    fn parse_user_record(&self, buf: &[u8], origin: usize, out: &mut RecOffsets)
    -> Option<()>;

    /// Layout of any record, sentinels included; `None` on a malformed header.
    fn try_offsets_into(&self, buf: &[u8], origin: usize, out: &mut RecOffsets) -> Option<()> {
        if origin < REC_N_NEW_EXTRA_BYTES || origin > buf.len() {
            return None;
        }
        out.reset();
        match status(buf, origin) {
            REC_STATUS_INFIMUM | REC_STATUS_SUPREMUM => *out = RecOffsets::sentinel(),
            _ => self.parse_user_record(buf, origin, out)?,
        }
        if origin + out.data_size() > buf.len() {
            return None;
        }
        Some(())
    }

    /// Layout of a record already known to be well formed.
    ///
    /// # Panics
    /// If the header is malformed; page contents are trusted.
    fn offsets_into(&self, buf: &[u8], origin: usize, out: &mut RecOffsets) {
        if self.try_offsets_into(buf, origin, out).is_none() {
            panic!("record at offset {origin} has a malformed header");
        }
    }

    fn offsets(&self, buf: &[u8], origin: usize) -> RecOffsets {
        let mut out = RecOffsets::default();
        self.offsets_into(buf, origin, &mut out);
        out
    }
}

/// A record format that can also build physical records from logical tuples.
pub trait RecordFormat: RecordView {
    type Tuple: ?Sized;

    fn convert(&self, tuple: &Self::Tuple) -> DbResult<PhysRecord>;
}

/// A standalone physical record with a zeroed fixed header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhysRecord {
    pub bytes: Vec<u8>,
    pub origin: usize,
}

impl PhysRecord {
    pub fn record(&self) -> RecordRef<'_> {
        RecordRef::new(&self.bytes, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_do_not_clobber_each_other() {
        let mut buf = vec![0u8; 32];
        let origin = 16;
        set_heap_no(&mut buf, origin, 8191);
        set_status(&mut buf, origin, REC_STATUS_NODE_PTR);
        set_n_owned(&mut buf, origin, 7);
        set_info_bits(&mut buf, origin, REC_INFO_DELETED_FLAG);
        assert_eq!(heap_no(&buf, origin), 8191);
        assert_eq!(status(&buf, origin), REC_STATUS_NODE_PTR);
        assert_eq!(n_owned(&buf, origin), 7);
        assert_eq!(
            info_and_status_bits(&buf, origin),
            REC_INFO_DELETED_FLAG | REC_STATUS_NODE_PTR
        );
    }

    #[test]
    fn next_pointer_is_relative_and_wraps() {
        let mut buf = vec![0u8; 256];
        set_next_offs(&mut buf, 200, 120);
        assert_eq!(next_offs(&buf, 200), 120);
        set_next_offs(&mut buf, 120, 200);
        assert_eq!(next_offs(&buf, 120), 200);
        set_next_offs(&mut buf, 120, 0);
        assert_eq!(next_offs(&buf, 120), 0);
    }

    #[test]
    fn field_ranges_skip_nulls() {
        let mut offsets = RecOffsets::new(7);
        offsets.push_field(4, false);
        offsets.push_field(0, true);
        offsets.push_field(3, false);
        assert_eq!(offsets.field_range(0), Some(0..4));
        assert_eq!(offsets.field_range(1), None);
        assert_eq!(offsets.field_range(2), Some(4..7));
        assert_eq!(offsets.total_size(), 14);
    }
}
