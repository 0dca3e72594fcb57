//! Compact row format.
//!
//! Field lengths are stored backwards from the byte before the fixed header,
//! one byte for lengths below 128, two bytes otherwise, and a single `0xC0`
//! marker for SQL NULL. Field data follows the origin back to back using the
//! memcomparable encoding from [`types::Value::encode_field`].

use common::{DbError, DbResult};
use types::{SqlType, Value};

use crate::rec::{
    PhysRecord, REC_N_NEW_EXTRA_BYTES, REC_STATUS_ORDINARY, RecOffsets, RecordFormat, RecordRef,
    RecordView, set_status,
};

const NULL_MARKER: u8 = 0xC0;
const TWO_BYTE_FLAG: u8 = 0x80;
const ONE_BYTE_MAX: usize = 0x7F;
/// Longest field the two-byte length form can describe.
pub const MAX_FIELD_LEN: usize = 0x3FFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactFormat {
    n_fields: usize,
}

impl CompactFormat {
    pub fn new(n_fields: usize) -> Self {
        Self { n_fields }
    }

    pub fn n_fields(&self) -> usize {
        self.n_fields
    }

    /// Decode a user record back into values of the given column types.
    pub fn decode(
        &self,
        rec: RecordRef<'_>,
        offsets: &RecOffsets,
        types: &[SqlType],
    ) -> DbResult<Vec<Value>> {
        if types.len() != self.n_fields {
            return Err(DbError::Storage(format!(
                "expected {} column types, got {}",
                self.n_fields,
                types.len()
            )));
        }
        types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                Value::decode_field(*ty, rec.field(offsets, i)).ok_or_else(|| {
                    DbError::Storage(format!("field {i} is not a valid {ty:?} encoding"))
                })
            })
            .collect()
    }
}

impl RecordView for CompactFormat {
    fn parse_user_record(
        &self,
        buf: &[u8],
        origin: usize,
        out: &mut RecOffsets,
    ) -> Option<()> {
        let mut pos = origin - REC_N_NEW_EXTRA_BYTES;
        for _ in 0..self.n_fields {
            pos = pos.checked_sub(1)?;
            let b = buf[pos];
            if b == NULL_MARKER {
                out.push_field(0, true);
            } else if b & TWO_BYTE_FLAG != 0 {
                pos = pos.checked_sub(1)?;
                let len = (((b & 0x3F) as usize) << 8) | buf[pos] as usize;
                out.push_field(len, false);
            } else {
                out.push_field(b as usize, false);
            }
        }
        out.set_extra_size(origin - pos);
        Some(())
    }
}

impl RecordFormat for CompactFormat {
    type Tuple = [Value];

    fn convert(&self, tuple: &[Value]) -> DbResult<PhysRecord> {
        if tuple.len() != self.n_fields {
            return Err(DbError::Storage(format!(
                "tuple has {} fields, index expects {}",
                tuple.len(),
                self.n_fields
            )));
        }

        // Length bytes in the order they sit walking backwards from the origin.
        let mut lens = Vec::with_capacity(tuple.len());
        let mut data = Vec::new();
        for value in tuple {
            match value.encode_field() {
                None => lens.push(NULL_MARKER),
                Some(bytes) if bytes.len() <= ONE_BYTE_MAX => {
                    lens.push(bytes.len() as u8);
                    data.extend_from_slice(&bytes);
                }
                Some(bytes) if bytes.len() <= MAX_FIELD_LEN => {
                    lens.push(TWO_BYTE_FLAG | (bytes.len() >> 8) as u8);
                    lens.push((bytes.len() & 0xFF) as u8);
                    data.extend_from_slice(&bytes);
                }
                Some(bytes) => {
                    return Err(DbError::Storage(format!(
                        "field of {} bytes exceeds the {MAX_FIELD_LEN} byte limit",
                        bytes.len()
                    )));
                }
            }
        }

        let mut bytes: Vec<u8> = lens.into_iter().rev().collect();
        bytes.extend_from_slice(&[0u8; REC_N_NEW_EXTRA_BYTES]);
        let origin = bytes.len();
        bytes.extend_from_slice(&data);
        set_status(&mut bytes, origin, REC_STATUS_ORDINARY);
        Ok(PhysRecord { bytes, origin })
    }
}
