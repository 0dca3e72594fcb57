//! Sparse page directory.
//!
//! Slots grow downward from the page trailer. Slot `i` stores the offset of
//! its owner record; the owner's header carries how many records the slot
//! owns (itself plus the records since the previous owner). Slot 0 always
//! owns just the infimum and the last slot always owns the supremum.

use common::pretty::{TableStyleKind, render_string_table};
use log::debug;

use crate::rec::REC_MAX_N_OWNED;
use crate::{FIL_PAGE_DATA_END, PAGE_N_DIR_SLOTS, Page};

pub const PAGE_DIR_SLOT_SIZE: usize = 2;
pub const PAGE_DIR_SLOT_MIN_N_OWNED: usize = 4;
pub const PAGE_DIR_SLOT_MAX_N_OWNED: usize = 8;

const _: () = assert!(PAGE_DIR_SLOT_MIN_N_OWNED >= 2);
const _: () = assert!(PAGE_DIR_SLOT_MAX_N_OWNED <= REC_MAX_N_OWNED);
// A split of MAX + 1 records must leave both halves at or above MIN.
const _: () = assert!((PAGE_DIR_SLOT_MAX_N_OWNED + 1) / 2 >= PAGE_DIR_SLOT_MIN_N_OWNED);
// Merging an underfull slot into a neighbour at MIN must stay within MAX.
const _: () = assert!(2 * PAGE_DIR_SLOT_MIN_N_OWNED - 1 <= PAGE_DIR_SLOT_MAX_N_OWNED);

impl Page {
    pub fn n_slots(&self) -> usize {
        self.n_dir_slots()
    }

    fn slot_pos(&self, i: usize) -> usize {
        self.size() - FIL_PAGE_DATA_END - (i + 1) * PAGE_DIR_SLOT_SIZE
    }

    /// Lowest byte used by the directory; the heap may grow up to here.
    pub fn dir_start(&self) -> usize {
        self.size() - FIL_PAGE_DATA_END - self.n_slots() * PAGE_DIR_SLOT_SIZE
    }

    pub fn slot_rec(&self, i: usize) -> usize {
        let pos = self.slot_pos(i);
        u16::from_be_bytes([self.data[pos], self.data[pos + 1]]) as usize
    }

    pub fn set_slot_rec(&mut self, i: usize, rec: usize) {
        let pos = self.slot_pos(i);
        self.data[pos..pos + 2].copy_from_slice(&(rec as u16).to_be_bytes());
    }

    pub fn slot_n_owned(&self, i: usize) -> usize {
        self.rec_n_owned(self.slot_rec(i))
    }

    pub fn set_slot_n_owned(&mut self, i: usize, n: usize) {
        let rec = self.slot_rec(i);
        self.set_rec_n_owned(rec, n);
    }

    /// First record at or after `rec` that owns a slot.
    pub fn rec_find_owner(&self, rec: usize) -> usize {
        let mut r = rec;
        while self.rec_n_owned(r) == 0 {
            r = self.rec_next(r);
        }
        r
    }

    /// Index of the slot owning `rec`.
    ///
    /// # Panics
    /// If no slot points at the owner; the directory is corrupt.
    pub fn find_owner_slot(&self, rec: usize) -> usize {
        let owner = self.rec_find_owner(rec);
        (0..self.n_slots())
            .rev()
            .find(|&i| self.slot_rec(i) == owner)
            .unwrap_or_else(|| {
                panic!(
                    "page {}: no directory slot points at owner {owner} of record {rec}",
                    self.id().0
                )
            })
    }

    /// Predecessor of `rec` in the record list.
    pub fn rec_prev(&self, rec: usize) -> usize {
        let slot = self.find_owner_slot(rec);
        assert!(slot > 0, "the infimum has no predecessor");
        let mut r = self.slot_rec(slot - 1);
        loop {
            let next = self.rec_next(r);
            if next == rec {
                return r;
            }
            r = next;
        }
    }

    /// Open a gap for a new slot right after `start`, shifting the slots
    /// above it one position up.
    fn add_slot(&mut self, start: usize) {
        let n = self.n_slots();
        let lo = self.slot_pos(n - 1);
        let hi = self.slot_pos(start);
        assert!(
            lo - PAGE_DIR_SLOT_SIZE >= self.heap_top(),
            "directory would overlap the record heap"
        );
        self.data.copy_within(lo..hi, lo - PAGE_DIR_SLOT_SIZE);
        self.set_header_field(PAGE_N_DIR_SLOTS, (n + 1) as u16);
    }

    /// Remove slot `i`, shifting the slots above it one position down.
    fn delete_slot(&mut self, i: usize) {
        let n = self.n_slots();
        let lo = self.slot_pos(n - 1);
        let hi = self.slot_pos(i);
        self.data.copy_within(lo..hi, lo + PAGE_DIR_SLOT_SIZE);
        self.data[lo..lo + PAGE_DIR_SLOT_SIZE].fill(0);
        self.set_header_field(PAGE_N_DIR_SLOTS, (n - 1) as u16);
    }

    /// Split an overfull slot: the lower half of its records moves to a new
    /// slot inserted just below it.
    pub fn split_slot(&mut self, slot: usize) {
        assert!(slot > 0, "slot 0 owns only the infimum");
        let n_owned = self.slot_n_owned(slot);
        let half = n_owned / 2;

        let mut rec = self.slot_rec(slot - 1);
        for _ in 0..half {
            rec = self.rec_next(rec);
        }

        self.add_slot(slot - 1);
        self.set_slot_rec(slot, rec);
        self.set_slot_n_owned(slot, half);
        self.set_slot_n_owned(slot + 1, n_owned - half);
        debug!(
            "page {}: split slot {slot} ({n_owned} records) into {half} + {}",
            self.id().0,
            n_owned - half
        );
    }

    /// Restore the minimum ownership of an underfull slot by borrowing a
    /// record from the upper neighbour, or merging into it when the
    /// neighbour has none to spare. The supremum slot is allowed to run low.
    pub fn balance_slot(&mut self, slot: usize) {
        assert!(slot > 0, "slot 0 owns only the infimum");
        if slot + 1 == self.n_slots() {
            return;
        }

        let n_owned = self.slot_n_owned(slot);
        let up_n_owned = self.slot_n_owned(slot + 1);
        let old_rec = self.slot_rec(slot);

        if up_n_owned > PAGE_DIR_SLOT_MIN_N_OWNED {
            let new_rec = self.rec_next(old_rec);
            self.set_rec_n_owned(old_rec, 0);
            self.set_rec_n_owned(new_rec, n_owned + 1);
            self.set_slot_rec(slot, new_rec);
            self.set_slot_n_owned(slot + 1, up_n_owned - 1);
            debug!(
                "page {}: slot {slot} borrowed a record from slot {}",
                self.id().0,
                slot + 1
            );
        } else {
            self.set_rec_n_owned(old_rec, 0);
            self.set_slot_n_owned(slot + 1, n_owned + up_n_owned);
            self.delete_slot(slot);
            debug!(
                "page {}: merged slot {slot} into its upper neighbour",
                self.id().0
            );
        }
    }

    /// Render the directory as a table, one row per slot.
    pub fn render_directory(&self, style: TableStyleKind) -> String {
        let rows = (0..self.n_slots())
            .map(|i| {
                let rec = self.slot_rec(i);
                vec![
                    i.to_string(),
                    rec.to_string(),
                    self.rec_n_owned(rec).to_string(),
                    self.rec_heap_no(rec).to_string(),
                ]
            })
            .collect();
        render_string_table(&["slot", "owner", "n_owned", "heap_no"], rows, style)
    }
}
