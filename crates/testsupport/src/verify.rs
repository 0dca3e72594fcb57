//! Reference implementations the page code is checked against.

use std::cmp::Ordering;

use btree::{KeyComparator, Matched, SearchKey, SearchMode, TupleComparator};
use storage::{Page, RecOffsets, RecordRef, RecordView};

/// Where a search in `mode` must land, found by walking every record and
/// comparing from scratch.
pub fn linear_search<V, C>(page: &Page, view: &V, cmp: &C, key: &C::Key, mode: SearchMode) -> usize
where
    V: RecordView + ?Sized,
    C: KeyComparator + ?Sized,
{
    let mut offsets = RecOffsets::default();
    let mut low = page.infimum();
    let mut rec = page.rec_next(low);
    while !page.is_supremum(rec) {
        view.offsets_into(page.as_bytes(), rec, &mut offsets);
        let mut matched = Matched::default();
        let ord = cmp.compare(key, page.rec_ref(rec), &offsets, &mut matched);
        let on_low_side = match mode {
            SearchMode::Less | SearchMode::GreaterOrEqual => ord == Ordering::Greater,
            SearchMode::LessOrEqual | SearchMode::Greater => ord != Ordering::Less,
            SearchMode::LessOrExtends => {
                ord != Ordering::Less || cmp.extends(key, page.rec_ref(rec), &offsets, matched)
            }
        };
        if !on_low_side {
            break;
        }
        low = rec;
        rec = page.rec_next(rec);
    }
    match mode {
        SearchMode::Less | SearchMode::LessOrEqual | SearchMode::LessOrExtends => low,
        SearchMode::Greater | SearchMode::GreaterOrEqual => rec,
    }
}

/// Compares like [`TupleComparator`] but discards the matched prefix it is
/// handed, so searches must not depend on the hint being used.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForgetfulComparator;

impl KeyComparator for ForgetfulComparator {
    type Key = SearchKey;

    fn compare(
        &self,
        key: &SearchKey,
        rec: RecordRef<'_>,
        offsets: &RecOffsets,
        matched: &mut Matched,
    ) -> Ordering {
        *matched = Matched::default();
        TupleComparator.compare(key, rec, offsets, matched)
    }

    fn extends(
        &self,
        key: &SearchKey,
        rec: RecordRef<'_>,
        offsets: &RecOffsets,
        matched: Matched,
    ) -> bool {
        TupleComparator.extends(key, rec, offsets, matched)
    }
}
