//! Page cursor: a position on one record of a page plus the mutations that
//! happen at that position.

use common::{Config, DbResult};
use log::trace;
use storage::rec::{REC_STATUS_NODE_PTR, set_status};
use storage::{
    Direction, PAGE_DIR_SLOT_MAX_N_OWNED, PAGE_DIR_SLOT_MIN_N_OWNED, Page, RecOffsets,
    RecordFormat, RecordView,
};
use wal::LogSink;

use crate::cmp::KeyComparator;
use crate::redo::{write_delete_log, write_insert_log};
use crate::search::{SearchMatch, SearchMode, search_with_match};

/// A position on a page. The cursor borrows the page exclusively for its
/// whole life; it is never persisted.
#[derive(Debug)]
pub struct PageCursor<'a> {
    page: &'a mut Page,
    rec: usize,
}

impl<'a> PageCursor<'a> {
    /// Position on an arbitrary record offset.
    pub fn at(page: &'a mut Page, rec: usize) -> Self {
        Self { page, rec }
    }

    pub fn before_first(page: &'a mut Page) -> Self {
        let rec = page.infimum();
        Self { page, rec }
    }

    pub fn after_last(page: &'a mut Page) -> Self {
        let rec = page.supremum();
        Self { page, rec }
    }

    /// Position the cursor with a page search.
    pub fn search<V, C>(
        page: &'a mut Page,
        view: &V,
        cmp: &C,
        key: &C::Key,
        mode: SearchMode,
        config: &Config,
    ) -> (Self, SearchMatch)
    where
        V: RecordView + ?Sized,
        C: KeyComparator + ?Sized,
    {
        let mut matched = SearchMatch::default();
        let cursor = Self::search_from(page, view, cmp, key, mode, config, &mut matched);
        (cursor, matched)
    }

    /// Like [`PageCursor::search`], but starting from prefixes the caller
    /// already knows, typically carried down from a search one level up.
    pub fn search_from<V, C>(
        page: &'a mut Page,
        view: &V,
        cmp: &C,
        key: &C::Key,
        mode: SearchMode,
        config: &Config,
        matched: &mut SearchMatch,
    ) -> Self
    where
        V: RecordView + ?Sized,
        C: KeyComparator + ?Sized,
    {
        let rec = search_with_match(page, view, cmp, key, mode, config, matched);
        Self { page, rec }
    }

    pub fn rec(&self) -> usize {
        self.rec
    }

    pub fn page(&self) -> &Page {
        self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        self.page
    }

    pub fn is_before_first(&self) -> bool {
        self.page.is_infimum(self.rec)
    }

    pub fn is_after_last(&self) -> bool {
        self.page.is_supremum(self.rec)
    }

    pub fn is_on_user_rec(&self) -> bool {
        self.page.is_user_rec(self.rec)
    }

    pub fn move_to_next(&mut self) {
        assert!(!self.is_after_last(), "cursor is already after the last record");
        self.rec = self.page.rec_next(self.rec);
    }

    pub fn move_to_prev(&mut self) {
        assert!(!self.is_before_first(), "cursor is already before the first record");
        self.rec = self.page.rec_prev(self.rec);
    }

    /// Convert `tuple` and insert it after the cursor. On non-leaf pages the
    /// record is stored as a node pointer.
    ///
    /// Returns `Ok(None)` when the page has no room for the record.
    pub fn insert_tuple<F, L>(
        &mut self,
        format: &F,
        tuple: &F::Tuple,
        log: &mut L,
    ) -> DbResult<Option<usize>>
    where
        F: RecordFormat + ?Sized,
        L: LogSink + ?Sized,
    {
        let mut phys = format.convert(tuple)?;
        if !self.page.is_leaf() {
            set_status(&mut phys.bytes, phys.origin, REC_STATUS_NODE_PTR);
        }
        let offsets = format.offsets(&phys.bytes, phys.origin);
        Ok(self.insert_rec(&phys.bytes, phys.origin, &offsets, format, log))
    }

    /// Insert a copy of the physical record at `src[origin]` after the
    /// cursor, returning its offset. The cursor does not move.
    ///
    /// Returns `None` when the page has no room for the record.
    pub fn insert_rec<V, L>(
        &mut self,
        src: &[u8],
        origin: usize,
        offsets: &RecOffsets,
        view: &V,
        log: &mut L,
    ) -> Option<usize>
    where
        V: RecordView + ?Sized,
        L: LogSink + ?Sized,
    {
        let page = &mut *self.page;
        let current = self.rec;
        assert!(
            !page.is_supremum(current),
            "cannot insert after the supremum"
        );

        let rec_size = offsets.total_size();
        let alloc = page.alloc(rec_size, view)?;
        let insert = page.copy_rec_in(alloc.start, src, origin, offsets);

        let next = page.rec_next(current);
        page.set_rec_next(insert, next);
        page.set_rec_next(current, insert);
        page.set_n_recs(page.n_recs() + 1);

        page.set_rec_n_owned(insert, 0);
        page.set_rec_heap_no(insert, alloc.heap_no);

        match page.last_insert() {
            None => {
                page.set_direction(Direction::NoDirection);
                page.set_n_direction(0);
            }
            Some(last) if last == current && page.direction() != Direction::Left => {
                page.set_direction(Direction::Right);
                page.set_n_direction(page.n_direction() + 1);
            }
            Some(last) if page.rec_next(insert) == last && page.direction() != Direction::Right => {
                page.set_direction(Direction::Left);
                page.set_n_direction(page.n_direction() + 1);
            }
            Some(_) => {
                page.set_direction(Direction::NoDirection);
                page.set_n_direction(0);
            }
        }
        page.set_last_insert(Some(insert));

        let owner = page.rec_find_owner(insert);
        let slot = page.find_owner_slot(owner);
        let n_owned = page.rec_n_owned(owner);
        page.set_rec_n_owned(owner, n_owned + 1);
        if n_owned == PAGE_DIR_SLOT_MAX_N_OWNED {
            page.split_slot(slot);
        }

        write_insert_log(page, insert, rec_size, current, view, log);
        trace!(
            "page {}: inserted record {insert} (heap_no {}, {rec_size} bytes) after {current}",
            page.id().0,
            alloc.heap_no
        );
        Some(insert)
    }

    /// Delete the record under the cursor; the cursor moves to its successor.
    ///
    /// # Panics
    /// If the cursor rests on the infimum or the supremum.
    pub fn delete<V, L>(&mut self, view: &V, log: &mut L)
    where
        V: RecordView + ?Sized,
        L: LogSink + ?Sized,
    {
        let page = &mut *self.page;
        let current = self.rec;
        assert!(page.is_user_rec(current), "cannot delete a page sentinel");

        let offsets = view.offsets(page.as_bytes(), current);
        let slot = page.find_owner_slot(current);
        let owner = page.slot_rec(slot);
        let n_owned = page.rec_n_owned(owner);

        write_delete_log(page, current, log);
        page.set_last_insert(None);
        page.modify_clock_inc();

        // The predecessor lies between the previous owner and `current`.
        let mut prev = page.slot_rec(slot - 1);
        loop {
            let next = page.rec_next(prev);
            if next == current {
                break;
            }
            prev = next;
        }

        let next = page.rec_next(current);
        self.rec = next;
        page.set_rec_next(prev, next);
        page.set_n_recs(page.n_recs() - 1);

        if owner == current {
            page.set_rec_n_owned(current, 0);
            page.set_slot_rec(slot, prev);
        }
        page.set_slot_n_owned(slot, n_owned - 1);

        page.free(current, &offsets);
        if n_owned <= PAGE_DIR_SLOT_MIN_N_OWNED {
            page.balance_slot(slot);
        }
        trace!("page {}: deleted record {current}", page.id().0);
    }
}

/// Positions cursors on pseudo-random user records, for sampling.
#[derive(Clone, Debug, Default)]
pub struct RandomCursor {
    rnd: u64,
}

const RANDOM_STEP: u64 = 87_584_577;

impl RandomCursor {
    pub fn new(seed: u64) -> Self {
        Self { rnd: seed }
    }

    /// Land on a user record, or before the first record of an empty page.
    pub fn open_on_random_user_rec<'a>(&mut self, page: &'a mut Page) -> PageCursor<'a> {
        let n_recs = page.n_recs() as u64;
        if n_recs == 0 {
            return PageCursor::before_first(page);
        }
        self.rnd = self.rnd.wrapping_add(RANDOM_STEP);
        let steps = self.rnd % n_recs;
        let mut cursor = PageCursor::before_first(page);
        for _ in 0..=steps {
            cursor.move_to_next();
        }
        cursor
    }
}
