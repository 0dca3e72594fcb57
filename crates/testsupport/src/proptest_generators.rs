//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, values and sequences of page operations.

use proptest::prelude::*;
use types::Value;

/// Strategy for generating random `Value` instances.
///
/// Generates a mix of Int, Text, Bool, and Null values.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        "[a-z]{1,20}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

/// Integer keys from a narrow range so duplicates and neighbours are common.
pub fn arb_int_key() -> impl Strategy<Value = i64> {
    -500i64..500
}

/// Text keys over a tiny alphabet, rich in shared prefixes.
pub fn arb_text_key() -> impl Strategy<Value = String> {
    "[a-c]{0,6}"
}

/// Every supported page size.
pub fn arb_page_size() -> impl Strategy<Value = usize> {
    prop_oneof![Just(4096usize), Just(8192), Just(16384), Just(32768)]
}

/// One step of a random page workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageOp {
    Insert(i64),
    /// Delete the key at this position (modulo the number of keys).
    Delete(usize),
}

/// Strategy for one page operation, inserts twice as likely as deletes.
pub fn arb_page_op() -> impl Strategy<Value = PageOp> {
    prop_oneof![
        2 => arb_int_key().prop_map(PageOp::Insert),
        1 => any::<usize>().prop_map(PageOp::Delete),
    ]
}

/// Strategy for a workload of up to `max_len` operations.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::{PageOp, arb_page_ops};
///
/// proptest! {
///     #[test]
///     fn ops_are_bounded(ops in arb_page_ops(30)) {
///         prop_assert!(ops.len() <= 30);
///     }
/// }
/// ```
pub fn arb_page_ops(max_len: usize) -> impl Strategy<Value = Vec<PageOp>> {
    prop::collection::vec(arb_page_op(), 0..=max_len)
}
