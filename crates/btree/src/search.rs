//! Positioning inside one page: directory binary search, then a linear walk
//! inside the final slot window.

use std::cmp::Ordering;

use common::{Config, ExtensionPolicy};
use serde::{Deserialize, Serialize};
use storage::{Direction, Page, RecOffsets, RecordView};

use crate::cmp::{KeyComparator, Matched};

/// Where a search leaves the cursor relative to the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// Last record strictly smaller than the key.
    Less,
    /// Last record smaller than or equal to the key.
    LessOrEqual,
    /// First record strictly greater than the key.
    Greater,
    /// First record greater than or equal to the key.
    GreaterOrEqual,
    /// Like `LessOrEqual`, but records extending the key's last partially
    /// matched field also sort on the low side.
    LessOrExtends,
}

impl SearchMode {
    fn lands_low(self) -> bool {
        matches!(
            self,
            SearchMode::Less | SearchMode::LessOrEqual | SearchMode::LessOrExtends
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    MoveLow,
    MoveUp,
}

fn decide(cmp: Ordering, mode: SearchMode, extends: bool) -> Step {
    match cmp {
        Ordering::Greater => Step::MoveLow,
        Ordering::Less if extends && mode == SearchMode::LessOrExtends => Step::MoveLow,
        Ordering::Less => Step::MoveUp,
        Ordering::Equal => match mode {
            SearchMode::Greater | SearchMode::LessOrEqual | SearchMode::LessOrExtends => {
                Step::MoveLow
            }
            SearchMode::GreaterOrEqual | SearchMode::Less => Step::MoveUp,
        },
    }
}

/// Matched prefixes against the records bracketing the search result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchMatch {
    pub low: Matched,
    pub up: Matched,
    /// The last-insert shortcut answered the search.
    pub shortcut: bool,
}

struct KeyWalk<'a, V: ?Sized, C: KeyComparator + ?Sized> {
    page: &'a Page,
    view: &'a V,
    cmp: &'a C,
    key: &'a C::Key,
    mode: SearchMode,
    offsets: RecOffsets,
}

impl<V, C> KeyWalk<'_, V, C>
where
    V: RecordView + ?Sized,
    C: KeyComparator + ?Sized,
{
    fn step(&mut self, rec: usize, matched: &mut Matched) -> Step {
        let cmp = self.compare(rec, matched);
        let extends = cmp == Ordering::Less
            && self.mode == SearchMode::LessOrExtends
            && self
                .cmp
                .extends(self.key, self.page.rec_ref(rec), &self.offsets, *matched);
        decide(cmp, self.mode, extends)
    }

    fn compare(&mut self, rec: usize, matched: &mut Matched) -> Ordering {
        debug_assert!(self.page.is_user_rec(rec));
        self.view
            .offsets_into(self.page.as_bytes(), rec, &mut self.offsets);
        self.cmp
            .compare(self.key, self.page.rec_ref(rec), &self.offsets, matched)
    }
}

/// Try to answer a `LessOrEqual` search from the last-insert hint when
/// inserts have been ascending: the hint wins if `hint <= key < next(hint)`.
pub fn try_search_shortcut<V, C>(
    page: &Page,
    view: &V,
    cmp: &C,
    key: &C::Key,
) -> Option<(usize, SearchMatch)>
where
    V: RecordView + ?Sized,
    C: KeyComparator + ?Sized,
{
    if !page.is_leaf() || page.direction() != Direction::Right || page.n_direction() <= 3 {
        return None;
    }
    let hint = page.last_insert()?;
    let mut walk = KeyWalk {
        page,
        view,
        cmp,
        key,
        mode: SearchMode::LessOrEqual,
        offsets: RecOffsets::default(),
    };

    let mut low = Matched::default();
    if walk.compare(hint, &mut low) == Ordering::Less {
        return None;
    }

    let mut up = Matched::default();
    let next = page.rec_next(hint);
    if !page.is_supremum(next) && walk.compare(next, &mut up) != Ordering::Less {
        return None;
    }

    Some((
        hint,
        SearchMatch {
            low,
            up,
            shortcut: true,
        },
    ))
}

/// Search the page for `key` and return the record the cursor should rest on.
///
/// `matched` holds the prefixes the caller already knows every record of the
/// page shares with the key below (`low`) and above (`up`) it; zero is
/// always valid. On return it holds the prefixes matched against the
/// bracketing records.
pub fn search_with_match<V, C>(
    page: &Page,
    view: &V,
    cmp: &C,
    key: &C::Key,
    mode: SearchMode,
    config: &Config,
    matched: &mut SearchMatch,
) -> usize
where
    V: RecordView + ?Sized,
    C: KeyComparator + ?Sized,
{
    let mode = match (mode, config.extension) {
        (SearchMode::LessOrExtends, ExtensionPolicy::Strict) => SearchMode::LessOrEqual,
        (mode, _) => mode,
    };

    if config.adaptive_search && mode == SearchMode::LessOrEqual {
        if let Some((rec, found)) = try_search_shortcut(page, view, cmp, key) {
            *matched = found;
            return rec;
        }
    }

    let mut walk = KeyWalk {
        page,
        view,
        cmp,
        key,
        mode,
        offsets: RecOffsets::default(),
    };
    let mut low_match = matched.low;
    let mut up_match = matched.up;

    // Binary search over the directory; slot 0 and the last slot are the
    // sentinels and are never compared.
    let mut low = 0usize;
    let mut up = page.n_slots() - 1;
    while up - low > 1 {
        let mid = (low + up) / 2;
        let mut cur = low_match.min(up_match);
        match walk.step(page.slot_rec(mid), &mut cur) {
            Step::MoveLow => {
                low = mid;
                low_match = cur;
            }
            Step::MoveUp => {
                up = mid;
                up_match = cur;
            }
        }
    }

    // Linear walk between the two remaining owners.
    let mut low_rec = page.slot_rec(low);
    let mut up_rec = page.slot_rec(up);
    while page.rec_next(low_rec) != up_rec {
        let mid_rec = page.rec_next(low_rec);
        let mut cur = low_match.min(up_match);
        match walk.step(mid_rec, &mut cur) {
            Step::MoveLow => {
                low_rec = mid_rec;
                low_match = cur;
            }
            Step::MoveUp => {
                up_rec = mid_rec;
                up_match = cur;
            }
        }
    }

    *matched = SearchMatch {
        low: low_match,
        up: up_match,
        shortcut: false,
    };
    if mode.lands_low() { low_rec } else { up_rec }
}
