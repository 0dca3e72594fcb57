use std::collections::HashSet;

use common::{DbError, DbResult};

use crate::rec::{RecOffsets, RecordView};
use crate::{
    PAGE_DIR_SLOT_MAX_N_OWNED, PAGE_DIR_SLOT_MIN_N_OWNED, PAGE_HEAP_NO_USER_LOW, PAGE_INFIMUM,
    PAGE_SUPREMUM, PAGE_SUPREMUM_END, Page,
};

fn corrupt(page: &Page, msg: String) -> DbError {
    DbError::Storage(format!("page {} is inconsistent: {msg}", page.id().0))
}

impl Page {
    /// Walk the record list, the directory and the free list, checking every
    /// structural invariant of the page.
    pub fn validate<V: RecordView + ?Sized>(&self, view: &V) -> DbResult<()> {
        let n_slots = self.n_slots();
        if n_slots < 2 {
            return Err(corrupt(self, format!("{n_slots} directory slots")));
        }
        if self.slot_rec(0) != PAGE_INFIMUM || self.slot_rec(n_slots - 1) != PAGE_SUPREMUM {
            return Err(corrupt(
                self,
                "first and last slots must own the sentinels".into(),
            ));
        }
        let heap_top = self.heap_top();
        if heap_top < PAGE_SUPREMUM_END || heap_top > self.dir_start() {
            return Err(corrupt(self, format!("heap top {heap_top} out of range")));
        }

        let n_heap = self.n_heap() as usize;
        let mut heap_nos = HashSet::new();
        let mut offsets = RecOffsets::default();
        let check_bounds = |page: &Page, rec: usize, offsets: &mut RecOffsets| {
            if rec < PAGE_SUPREMUM_END || rec >= heap_top {
                return Err(corrupt(page, format!("record {rec} outside the heap")));
            }
            if view.try_offsets_into(&page.data, rec, offsets).is_none()
                || rec - offsets.extra_size() < PAGE_SUPREMUM_END
                || rec + offsets.data_size() > heap_top
            {
                return Err(corrupt(page, format!("record {rec} overruns the heap")));
            }
            Ok(())
        };

        let mut rec = PAGE_INFIMUM;
        let mut slot = 0usize;
        let mut owned_since_last = 0usize;
        let mut n_user = 0usize;
        loop {
            if n_user > n_heap {
                return Err(corrupt(self, "record list does not terminate".into()));
            }
            if self.is_user_rec(rec) {
                check_bounds(self, rec, &mut offsets)?;
                n_user += 1;
            }
            let heap_no = self.rec_heap_no(rec);
            if heap_no as usize >= n_heap || !heap_nos.insert(heap_no) {
                return Err(corrupt(self, format!("record {rec} has heap number {heap_no}")));
            }
            if self.is_user_rec(rec) && heap_no < PAGE_HEAP_NO_USER_LOW {
                return Err(corrupt(self, format!("user record {rec} uses a sentinel heap number")));
            }

            owned_since_last += 1;
            let n_owned = self.rec_n_owned(rec);
            if n_owned != 0 {
                if slot >= n_slots || self.slot_rec(slot) != rec {
                    return Err(corrupt(self, format!("owner {rec} is not slot {slot}")));
                }
                if n_owned != owned_since_last {
                    return Err(corrupt(
                        self,
                        format!("slot {slot} claims {n_owned} records, owns {owned_since_last}"),
                    ));
                }
                let interior = slot != 0 && slot + 1 != n_slots;
                if slot == 0 && n_owned != 1 {
                    return Err(corrupt(self, "infimum slot must own one record".into()));
                }
                if n_owned > PAGE_DIR_SLOT_MAX_N_OWNED
                    || (interior && n_owned < PAGE_DIR_SLOT_MIN_N_OWNED)
                {
                    return Err(corrupt(
                        self,
                        format!("slot {slot} owns {n_owned} records"),
                    ));
                }
                slot += 1;
                owned_since_last = 0;
            }

            if self.is_supremum(rec) {
                break;
            }
            let next = self.rec_next(rec);
            if next == 0 {
                return Err(corrupt(self, format!("record {rec} ends the list early")));
            }
            rec = next;
        }

        if slot != n_slots {
            return Err(corrupt(
                self,
                format!("{slot} owners found for {n_slots} slots"),
            ));
        }
        if n_user != self.n_recs() {
            return Err(corrupt(
                self,
                format!("{n_user} records linked, header says {}", self.n_recs()),
            ));
        }

        let mut n_free = 0usize;
        for free in self.free_recs() {
            n_free += 1;
            if n_free > n_heap {
                return Err(corrupt(self, "free list does not terminate".into()));
            }
            check_bounds(self, free, &mut offsets)?;
            if self.rec_n_owned(free) != 0 {
                return Err(corrupt(self, format!("free record {free} owns a slot")));
            }
        }
        Ok(())
    }
}
