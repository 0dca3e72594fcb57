//! Record heap allocation.
//!
//! Space comes from the free list of deleted records (first fit) or from the
//! unused gap between the heap top and the directory. Heap numbers are handed
//! out monotonically and never recycled, even when a freed block is reused.

use crate::rec::{RecOffsets, RecordView};
use crate::{PAGE_DIR_SLOT_SIZE, PAGE_HEAP_NO_MAX, Page};

/// A freshly reserved block of the record heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapAlloc {
    /// First byte of the block; the record's extra bytes start here.
    pub start: usize,
    pub heap_no: u16,
}

impl Page {
    /// Bytes between the heap top and the directory.
    pub fn free_space(&self) -> usize {
        self.dir_start().saturating_sub(self.heap_top())
    }

    /// Reserve `need` bytes for a new record. Returns `None` when neither the
    /// free list nor the heap gap has room, leaving one directory slot of
    /// headroom for a later split.
    pub fn alloc<V: RecordView + ?Sized>(&mut self, need: usize, view: &V) -> Option<HeapAlloc> {
        let heap_no = self.n_heap();
        if heap_no > PAGE_HEAP_NO_MAX {
            return None;
        }
        let dir_start = self.dir_start();
        let heap_top = self.heap_top();

        if heap_top + PAGE_DIR_SLOT_SIZE <= dir_start {
            if let Some(start) = self.take_free(need, view) {
                self.set_n_heap(heap_no + 1);
                return Some(HeapAlloc { start, heap_no });
            }
        }

        if heap_top + need + PAGE_DIR_SLOT_SIZE <= dir_start {
            self.set_heap_top(heap_top + need);
            self.set_n_heap(heap_no + 1);
            return Some(HeapAlloc {
                start: heap_top,
                heap_no,
            });
        }
        None
    }

    /// Unlink the first free record at least `need` bytes long.
    fn take_free<V: RecordView + ?Sized>(&mut self, need: usize, view: &V) -> Option<usize> {
        let mut offsets = RecOffsets::default();
        let mut prev: Option<usize> = None;
        let mut cur = self.free_head();
        while let Some(rec) = cur {
            view.offsets_into(&self.data, rec, &mut offsets);
            let next = match self.rec_next(rec) {
                0 => None,
                n => Some(n),
            };
            if offsets.total_size() >= need {
                match prev {
                    None => self.set_free_head(next),
                    Some(p) => self.set_rec_next(p, next.unwrap_or(0)),
                }
                self.set_garbage(self.garbage().saturating_sub(need));
                return Some(rec - offsets.extra_size());
            }
            prev = Some(rec);
            cur = next;
        }
        None
    }

    /// Push a record that is no longer linked into the list onto the free
    /// list and account its bytes as garbage.
    pub fn free(&mut self, rec: usize, offsets: &RecOffsets) {
        let head = self.free_head().unwrap_or(0);
        self.set_rec_next(rec, head);
        self.set_rec_n_owned(rec, 0);
        self.set_free_head(Some(rec));
        self.set_garbage(self.garbage() + offsets.total_size());
    }

    /// Offsets of the records on the free list, most recently freed first.
    pub fn free_recs(&self) -> FreeRecs<'_> {
        FreeRecs {
            page: self,
            rec: self.free_head(),
        }
    }
}

pub struct FreeRecs<'a> {
    page: &'a Page,
    rec: Option<usize>,
}

impl Iterator for FreeRecs<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.rec?;
        self.rec = match self.page.rec_next(current) {
            0 => None,
            n => Some(n),
        };
        Some(current)
    }
}
