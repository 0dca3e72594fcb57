//! Custom assertion helpers for page structure.

use common::DbResult;
use storage::{PAGE_DIR_SLOT_MAX_N_OWNED, PAGE_DIR_SLOT_MIN_N_OWNED, Page, RecordView};

/// Assert that the page passes its own consistency check.
///
/// # Example
///
/// ```
/// use storage::CompactFormat;
/// use testsupport::prelude::*;
///
/// let page = index_page(16384);
/// assert_page_valid(&page, &CompactFormat::new(1));
/// ```
pub fn assert_page_valid<V: RecordView + ?Sized>(page: &Page, view: &V) {
    if let Err(e) = page.validate(view) {
        panic!("page failed validation: {e}\n{:?}", page);
    }
}

/// Assert the directory invariants directly: every slot between the two
/// sentinels owns between the minimum and maximum number of records, the
/// infimum owns only itself, and the owned counts add up to every record.
pub fn assert_directory_bounds(page: &Page) {
    let n_slots = page.n_slots();
    assert_eq!(page.slot_n_owned(0), 1, "infimum must own only itself");
    let mut total = 0;
    for slot in 0..n_slots {
        let owned = page.slot_n_owned(slot);
        if slot > 0 && slot + 1 < n_slots {
            assert!(
                (PAGE_DIR_SLOT_MIN_N_OWNED..=PAGE_DIR_SLOT_MAX_N_OWNED).contains(&owned),
                "slot {slot} owns {owned} records"
            );
        }
        total += owned;
    }
    let last = page.slot_n_owned(n_slots - 1);
    assert!(
        (1..=PAGE_DIR_SLOT_MAX_N_OWNED).contains(&last),
        "supremum slot owns {last} records"
    );
    assert_eq!(total, page.n_recs() + 2, "owned counts do not cover the list");
}

/// Assert that two page images are byte-identical, reporting the first
/// differing offset instead of dumping both pages.
pub fn assert_same_image(left: &Page, right: &Page) {
    assert_eq!(left.size(), right.size(), "page sizes differ");
    if let Some(pos) = left
        .as_bytes()
        .iter()
        .zip(right.as_bytes())
        .position(|(a, b)| a != b)
    {
        panic!(
            "page images differ at byte {pos}: {:#04x} != {:#04x}\nleft: {left:?}\nright: {right:?}",
            left.as_bytes()[pos],
            right.as_bytes()[pos]
        );
    }
}

/// Assert that an operation returns an error containing a specific substring.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let result: Result<(), common::DbError> = Err(common::DbError::CorruptLog("bad offset".into()));
/// assert_error_contains(result, "bad offset");
/// ```
pub fn assert_error_contains<T>(result: DbResult<T>, expected_msg: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{expected_msg}', but operation succeeded"),
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected_msg),
                "Expected error containing '{expected_msg}', got: {msg}"
            );
        }
    }
}
