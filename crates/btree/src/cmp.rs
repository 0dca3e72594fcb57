//! Ordering search keys against physical records.

use std::cmp::Ordering;

use storage::{RecOffsets, RecordRef};
use types::Value;

/// Prefix of a key known to equal a record: complete fields, then bytes
/// into the first unequal field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Matched {
    pub fields: usize,
    pub bytes: usize,
}

impl Matched {
    pub fn new(fields: usize, bytes: usize) -> Self {
        Self { fields, bytes }
    }
}

/// Compares search keys with user records.
///
/// `matched` carries a prefix the caller already knows to be equal; the
/// comparator may skip it and must leave the actual matched prefix behind.
/// Implementations never see the infimum or supremum.
pub trait KeyComparator {
    type Key: ?Sized;

    fn compare(
        &self,
        key: &Self::Key,
        rec: RecordRef<'_>,
        offsets: &RecOffsets,
        matched: &mut Matched,
    ) -> Ordering;

    /// Whether the record's field at `matched.fields` strictly extends the
    /// key's field at the same position.
    fn extends(
        &self,
        _key: &Self::Key,
        _rec: RecordRef<'_>,
        _offsets: &RecOffsets,
        _matched: Matched,
    ) -> bool {
        false
    }
}

/// A search key: a prefix of index fields in their stored encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchKey {
    fields: Vec<Option<Vec<u8>>>,
}

impl SearchKey {
    pub fn from_values(values: &[Value]) -> Self {
        Self {
            fields: values.iter().map(Value::encode_field).collect(),
        }
    }

    pub fn from_fields(fields: Vec<Option<Vec<u8>>>) -> Self {
        Self { fields }
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, i: usize) -> Option<&[u8]> {
        self.fields.get(i).and_then(|f| f.as_deref())
    }

    fn is_null(&self, i: usize) -> bool {
        self.fields[i].is_none()
    }
}

impl From<&[Value]> for SearchKey {
    fn from(values: &[Value]) -> Self {
        Self::from_values(values)
    }
}

/// Field-by-field comparison of encoded bytes. NULL sorts first and a key
/// that runs out of fields compares equal to every record it prefixes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TupleComparator;

fn rec_field<'a>(rec: RecordRef<'a>, offsets: &RecOffsets, i: usize) -> Option<Option<&'a [u8]>> {
    (i < offsets.n_fields()).then(|| rec.field(offsets, i))
}

impl KeyComparator for TupleComparator {
    type Key = SearchKey;

    fn compare(
        &self,
        key: &SearchKey,
        rec: RecordRef<'_>,
        offsets: &RecOffsets,
        matched: &mut Matched,
    ) -> Ordering {
        let mut fields = matched.fields;
        let mut bytes = matched.bytes;

        while fields < key.n_fields() {
            let Some(rf) = rec_field(rec, offsets, fields) else {
                *matched = Matched::new(fields, 0);
                return Ordering::Greater;
            };
            let ord = match (key.is_null(fields), rf) {
                (true, None) => Ordering::Equal,
                (true, Some(_)) => Ordering::Less,
                (false, None) => Ordering::Greater,
                (false, Some(r)) => {
                    let k = key.field(fields).unwrap_or_default();
                    let common = k.len().min(r.len());
                    let mut j = bytes.min(common);
                    while j < common && k[j] == r[j] {
                        j += 1;
                    }
                    bytes = j;
                    if j < common {
                        k[j].cmp(&r[j])
                    } else {
                        k.len().cmp(&r.len())
                    }
                }
            };
            if ord != Ordering::Equal {
                if key.is_null(fields) || rf.is_none() {
                    bytes = 0;
                }
                *matched = Matched::new(fields, bytes);
                return ord;
            }
            fields += 1;
            bytes = 0;
        }

        *matched = Matched::new(fields, 0);
        Ordering::Equal
    }

    fn extends(
        &self,
        key: &SearchKey,
        rec: RecordRef<'_>,
        offsets: &RecOffsets,
        matched: Matched,
    ) -> bool {
        let i = matched.fields;
        match (key.field(i), rec_field(rec, offsets, i).flatten()) {
            (Some(k), Some(r)) => r.len() > k.len() && r.starts_with(k),
            _ => false,
        }
    }
}
