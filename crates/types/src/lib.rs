//! Logical values stored in index records.
//!
//! Every value has a byte encoding whose `memcmp` order matches the logical
//! order of the value, so records can be compared field by field on raw bytes.

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Text,
    Bool,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

const INT_SIGN_FLIP: u64 = 1 << 63;

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Order-preserving field bytes, `None` for SQL NULL.
    ///
    /// Integers are stored big-endian with the sign bit flipped.
    pub fn encode_field(&self) -> Option<Vec<u8>> {
        match self {
            Value::Int(v) => Some(((*v as u64) ^ INT_SIGN_FLIP).to_be_bytes().to_vec()),
            Value::Text(s) => Some(s.as_bytes().to_vec()),
            Value::Bool(b) => Some(vec![u8::from(*b)]),
            Value::Null => None,
        }
    }

    /// Inverse of [`Value::encode_field`]. Returns `None` when the bytes do not
    /// form a valid value of `ty`.
    pub fn decode_field(ty: SqlType, bytes: Option<&[u8]>) -> Option<Value> {
        let Some(bytes) = bytes else {
            return Some(Value::Null);
        };
        match ty {
            SqlType::Int => {
                let raw: [u8; 8] = bytes.try_into().ok()?;
                Some(Value::Int((u64::from_be_bytes(raw) ^ INT_SIGN_FLIP) as i64))
            }
            SqlType::Text => std::str::from_utf8(bytes)
                .ok()
                .map(|s| Value::Text(s.to_string())),
            SqlType::Bool => match bytes {
                [0] => Some(Value::Bool(false)),
                [1] => Some(Value::Bool(true)),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering::Less;

    #[test]
    fn cmp_same_type_works() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    }

    #[test]
    fn int_encoding_preserves_order() {
        let values = [i64::MIN, -300, -1, 0, 1, 255, 256, i64::MAX];
        let encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|v| Value::Int(*v).encode_field().unwrap())
            .collect();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn decode_inverts_encode() {
        for value in [
            Value::Int(-42),
            Value::Text("hello".into()),
            Value::Bool(true),
            Value::Null,
        ] {
            let ty = match value {
                Value::Int(_) | Value::Null => SqlType::Int,
                Value::Text(_) => SqlType::Text,
                Value::Bool(_) => SqlType::Bool,
            };
            let bytes = value.encode_field();
            assert_eq!(Value::decode_field(ty, bytes.as_deref()), Some(value));
        }
    }

    #[test]
    fn decode_rejects_bad_width() {
        assert_eq!(Value::decode_field(SqlType::Int, Some(&[1, 2, 3])), None);
        assert_eq!(Value::decode_field(SqlType::Bool, Some(&[7])), None);
    }

    #[test]
    fn value_serializes_to_json() {
        let json = serde_json::to_string(&Value::Int(7)).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Int(7));
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn int_bytes_follow_numeric_order(a in any::<i64>(), b in any::<i64>()) {
                let ea = Value::Int(a).encode_field().unwrap();
                let eb = Value::Int(b).encode_field().unwrap();
                prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
            }

            #[test]
            fn text_bytes_follow_string_order(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
                let ea = Value::Text(a.clone()).encode_field().unwrap();
                let eb = Value::Text(b.clone()).encode_field().unwrap();
                prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
            }
        }
    }
}
