//! Index page layout.
//!
//! A page is a fixed-size byte buffer holding a singly linked list of
//! variable-length records between two sentinels, a heap the records are
//! carved from, and a sparse slot directory growing backwards from the tail.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────┬──────────┬──────────────┬───────┬───────────┬─────────┐
//! │ FIL header   │ page header  │ infimum  │ supremum │ record heap  │ free  │ directory │ trailer │
//! │ 0..38        │ 38..94       │ 94..107  │ 107..120 │ 120..top     │       │ ← slots   │ 8 bytes │
//! └──────────────┴──────────────┴──────────┴──────────┴──────────────┴───────┴───────────┴─────────┘
//! ```
//!
//! Records are addressed by the offset of their *origin*: the first data byte.
//! The fixed record header occupies the five bytes before the origin, and any
//! format-specific header bytes precede that.


mod compact;
pub mod dir;
pub mod heap;
pub mod rec;
mod validate;

pub use compact::CompactFormat;
pub use dir::{PAGE_DIR_SLOT_MAX_N_OWNED, PAGE_DIR_SLOT_MIN_N_OWNED, PAGE_DIR_SLOT_SIZE};
pub use heap::HeapAlloc;
pub use rec::{PhysRecord, RecOffsets, RecordFormat, RecordRef, RecordView};

use std::fmt;

use common::{DbError, DbResult, Lsn, PageId, SpaceId, validate_page_size};
use rec::REC_N_NEW_EXTRA_BYTES;

pub const FIL_PAGE_OFFSET: usize = 4;
pub const FIL_PAGE_LSN: usize = 16;
pub const FIL_PAGE_TYPE: usize = 24;
pub const FIL_PAGE_SPACE_ID: usize = 34;
/// Start of the page header, right after the FIL header.
pub const FIL_PAGE_DATA: usize = 38;
/// Size of the page trailer; the directory ends right before it.
pub const FIL_PAGE_DATA_END: usize = 8;
pub const FIL_PAGE_INDEX: u16 = 17855;

pub const PAGE_HEADER: usize = FIL_PAGE_DATA;

// Page header fields, relative to PAGE_HEADER.
pub const PAGE_N_DIR_SLOTS: usize = 0;
pub const PAGE_HEAP_TOP: usize = 2;
pub const PAGE_N_HEAP: usize = 4;
pub const PAGE_FREE: usize = 6;
pub const PAGE_GARBAGE: usize = 8;
pub const PAGE_LAST_INSERT: usize = 10;
pub const PAGE_DIRECTION: usize = 12;
pub const PAGE_N_DIRECTION: usize = 14;
pub const PAGE_N_RECS: usize = 16;
pub const PAGE_MAX_TRX_ID: usize = 18;
pub const PAGE_LEVEL: usize = 26;
pub const PAGE_INDEX_ID: usize = 28;

const FSEG_HEADER_SIZE: usize = 10;

/// First byte after the page header and the two segment headers.
pub const PAGE_DATA: usize = PAGE_HEADER + 36 + 2 * FSEG_HEADER_SIZE;
pub const PAGE_INFIMUM: usize = PAGE_DATA + REC_N_NEW_EXTRA_BYTES;
pub const PAGE_SUPREMUM: usize = PAGE_INFIMUM + 8 + REC_N_NEW_EXTRA_BYTES;
pub const PAGE_SUPREMUM_END: usize = PAGE_SUPREMUM + 8;

pub const PAGE_HEAP_NO_INFIMUM: u16 = 0;
pub const PAGE_HEAP_NO_SUPREMUM: u16 = 1;
pub const PAGE_HEAP_NO_USER_LOW: u16 = 2;
/// Heap numbers are 13 bits wide.
pub const PAGE_HEAP_NO_MAX: u16 = (1 << 13) - 1;

const INFIMUM_DATA: &[u8; 8] = b"infimum\0";
const SUPREMUM_DATA: &[u8; 8] = b"supremum";

/// Trend of the most recent inserts, used by the adaptive search shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    NoDirection,
}

impl Direction {
    fn to_u16(self) -> u16 {
        match self {
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::NoDirection => 5,
        }
    }

    fn from_u16(v: u16) -> Self {
        match v {
            1 => Direction::Left,
            2 => Direction::Right,
            _ => Direction::NoDirection,
        }
    }
}

/// An index page buffer plus its in-memory modify clock.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Vec<u8>,
    modify_clock: u64,
}

impl Page {
    /// Allocate a zeroed page carrying only its FIL identity.
    pub fn new(space: SpaceId, id: PageId, page_size: usize) -> DbResult<Self> {
        validate_page_size(page_size)?;
        let mut page = Self {
            data: vec![0u8; page_size],
            modify_clock: 0,
        };
        page.write_u32(FIL_PAGE_OFFSET, id.0);
        page.write_u32(FIL_PAGE_SPACE_ID, space.0);
        page.write_u16(FIL_PAGE_TYPE, FIL_PAGE_INDEX);
        Ok(page)
    }

    /// Allocate a page and format it as an empty index page.
    pub fn new_index(space: SpaceId, id: PageId, page_size: usize) -> DbResult<Self> {
        let mut page = Self::new(space, id, page_size)?;
        page.create();
        Ok(page)
    }

    /// Wrap an existing page image.
    pub fn from_bytes(data: Vec<u8>) -> DbResult<Self> {
        validate_page_size(data.len())?;
        let page = Self {
            data,
            modify_clock: 0,
        };
        if page.n_dir_slots() < 2 || page.heap_top() > page.size() {
            return Err(DbError::Storage(format!(
                "page {} is not a formatted index page",
                page.id().0
            )));
        }
        Ok(page)
    }

    /// Format the page as an empty index page: the two sentinels, two
    /// directory slots and a reset header. FIL identity and LSN are kept.
    pub fn create(&mut self) {
        let size = self.size();
        self.data[FIL_PAGE_DATA..size - FIL_PAGE_DATA_END].fill(0);

        let inf = PAGE_INFIMUM;
        let sup = PAGE_SUPREMUM;
        self.data[inf..inf + 8].copy_from_slice(INFIMUM_DATA);
        self.data[sup..sup + 8].copy_from_slice(SUPREMUM_DATA);
        rec::set_n_owned(&mut self.data, inf, 1);
        rec::set_heap_no(&mut self.data, inf, PAGE_HEAP_NO_INFIMUM);
        rec::set_status(&mut self.data, inf, rec::REC_STATUS_INFIMUM);
        rec::set_next_offs(&mut self.data, inf, sup);
        rec::set_n_owned(&mut self.data, sup, 1);
        rec::set_heap_no(&mut self.data, sup, PAGE_HEAP_NO_SUPREMUM);
        rec::set_status(&mut self.data, sup, rec::REC_STATUS_SUPREMUM);
        rec::set_next_offs(&mut self.data, sup, 0);

        self.set_header_field(PAGE_N_DIR_SLOTS, 2);
        self.set_heap_top(PAGE_SUPREMUM_END);
        self.set_n_heap(PAGE_HEAP_NO_USER_LOW);
        self.set_last_insert(None);
        self.set_direction(Direction::NoDirection);
        self.set_n_direction(0);
        self.set_slot_rec(0, inf);
        self.set_slot_rec(1, sup);
        self.modify_clock_inc();
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn id(&self) -> PageId {
        PageId(self.read_u32(FIL_PAGE_OFFSET))
    }

    pub fn space(&self) -> SpaceId {
        SpaceId(self.read_u32(FIL_PAGE_SPACE_ID))
    }

    pub fn lsn(&self) -> Lsn {
        self.read_u64(FIL_PAGE_LSN)
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.write_u64(FIL_PAGE_LSN, lsn);
    }

    /// Counter that optimistic readers compare to detect structural changes.
    pub fn modify_clock(&self) -> u64 {
        self.modify_clock
    }

    pub fn modify_clock_inc(&mut self) {
        self.modify_clock += 1;
    }

    pub fn header_field(&self, field: usize) -> u16 {
        self.read_u16(PAGE_HEADER + field)
    }

    pub fn set_header_field(&mut self, field: usize, value: u16) {
        self.write_u16(PAGE_HEADER + field, value);
    }

    pub fn n_dir_slots(&self) -> usize {
        self.header_field(PAGE_N_DIR_SLOTS) as usize
    }

    pub fn heap_top(&self) -> usize {
        self.header_field(PAGE_HEAP_TOP) as usize
    }

    pub fn set_heap_top(&mut self, top: usize) {
        self.set_header_field(PAGE_HEAP_TOP, top as u16);
    }

    /// Next heap number to hand out.
    pub fn n_heap(&self) -> u16 {
        self.header_field(PAGE_N_HEAP)
    }

    pub fn set_n_heap(&mut self, n: u16) {
        self.set_header_field(PAGE_N_HEAP, n);
    }

    /// Head of the free record list.
    pub fn free_head(&self) -> Option<usize> {
        match self.header_field(PAGE_FREE) {
            0 => None,
            off => Some(off as usize),
        }
    }

    pub fn set_free_head(&mut self, rec: Option<usize>) {
        self.set_header_field(PAGE_FREE, rec.unwrap_or(0) as u16);
    }

    /// Bytes held by deleted records that the heap cannot reuse in place.
    pub fn garbage(&self) -> usize {
        self.header_field(PAGE_GARBAGE) as usize
    }

    pub fn set_garbage(&mut self, bytes: usize) {
        self.set_header_field(PAGE_GARBAGE, bytes as u16);
    }

    pub fn last_insert(&self) -> Option<usize> {
        match self.header_field(PAGE_LAST_INSERT) {
            0 => None,
            off => Some(off as usize),
        }
    }

    pub fn set_last_insert(&mut self, rec: Option<usize>) {
        self.set_header_field(PAGE_LAST_INSERT, rec.unwrap_or(0) as u16);
    }

    pub fn direction(&self) -> Direction {
        Direction::from_u16(self.header_field(PAGE_DIRECTION))
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.set_header_field(PAGE_DIRECTION, direction.to_u16());
    }

    pub fn n_direction(&self) -> usize {
        self.header_field(PAGE_N_DIRECTION) as usize
    }

    pub fn set_n_direction(&mut self, n: usize) {
        self.set_header_field(PAGE_N_DIRECTION, n as u16);
    }

    /// Number of user records in the list.
    pub fn n_recs(&self) -> usize {
        self.header_field(PAGE_N_RECS) as usize
    }

    pub fn set_n_recs(&mut self, n: usize) {
        self.set_header_field(PAGE_N_RECS, n as u16);
    }

    /// B-tree level, 0 for leaves.
    pub fn level(&self) -> u16 {
        self.header_field(PAGE_LEVEL)
    }

    pub fn set_level(&mut self, level: u16) {
        self.set_header_field(PAGE_LEVEL, level);
    }

    pub fn is_leaf(&self) -> bool {
        self.level() == 0
    }

    pub fn index_id(&self) -> u64 {
        self.read_u64(PAGE_HEADER + PAGE_INDEX_ID)
    }

    pub fn set_index_id(&mut self, id: u64) {
        self.write_u64(PAGE_HEADER + PAGE_INDEX_ID, id);
    }

    pub fn infimum(&self) -> usize {
        PAGE_INFIMUM
    }

    pub fn supremum(&self) -> usize {
        PAGE_SUPREMUM
    }

    pub fn is_infimum(&self, rec: usize) -> bool {
        rec == PAGE_INFIMUM
    }

    pub fn is_supremum(&self, rec: usize) -> bool {
        rec == PAGE_SUPREMUM
    }

    pub fn is_user_rec(&self, rec: usize) -> bool {
        rec != PAGE_INFIMUM && rec != PAGE_SUPREMUM
    }

    /// Borrow a record for reading fields.
    pub fn rec_ref(&self, rec: usize) -> RecordRef<'_> {
        RecordRef::new(&self.data, rec)
    }

    pub fn rec_next(&self, rec: usize) -> usize {
        rec::next_offs(&self.data, rec)
    }

    pub fn set_rec_next(&mut self, rec: usize, next: usize) {
        rec::set_next_offs(&mut self.data, rec, next);
    }

    pub fn rec_n_owned(&self, rec: usize) -> usize {
        rec::n_owned(&self.data, rec)
    }

    pub fn set_rec_n_owned(&mut self, rec: usize, n: usize) {
        rec::set_n_owned(&mut self.data, rec, n);
    }

    pub fn rec_heap_no(&self, rec: usize) -> u16 {
        rec::heap_no(&self.data, rec)
    }

    pub fn set_rec_heap_no(&mut self, rec: usize, heap_no: u16) {
        rec::set_heap_no(&mut self.data, rec, heap_no);
    }

    pub fn rec_status(&self, rec: usize) -> u8 {
        rec::status(&self.data, rec)
    }

    pub fn set_rec_status(&mut self, rec: usize, status: u8) {
        rec::set_status(&mut self.data, rec, status);
    }

    pub fn rec_info_and_status_bits(&self, rec: usize) -> u8 {
        rec::info_and_status_bits(&self.data, rec)
    }

    /// Copy a physical record into the heap at `start`; returns the new origin.
    pub fn copy_rec_in(
        &mut self,
        start: usize,
        src: &[u8],
        origin: usize,
        offsets: &RecOffsets,
    ) -> usize {
        rec::copy_rec(&mut self.data, start, src, origin, offsets)
    }

    /// Offsets of the user records in list order.
    pub fn user_recs(&self) -> UserRecs<'_> {
        UserRecs {
            page: self,
            rec: self.rec_next(PAGE_INFIMUM),
        }
    }

    fn read_u16(&self, pos: usize) -> u16 {
        u16::from_be_bytes([self.data[pos], self.data[pos + 1]])
    }

    fn write_u16(&mut self, pos: usize, value: u16) {
        self.data[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn read_u32(&self, pos: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[pos..pos + 4]);
        u32::from_be_bytes(raw)
    }

    fn write_u32(&mut self, pos: usize, value: u32) {
        self.data[pos..pos + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn read_u64(&self, pos: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[pos..pos + 8]);
        u64::from_be_bytes(raw)
    }

    fn write_u64(&mut self, pos: usize, value: u64) {
        self.data[pos..pos + 8].copy_from_slice(&value.to_be_bytes());
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("space", &self.space().0)
            .field("id", &self.id().0)
            .field("size", &self.size())
            .field("n_recs", &self.n_recs())
            .field("n_slots", &self.n_dir_slots())
            .field("heap_top", &self.heap_top())
            .field("modify_clock", &self.modify_clock)
            .finish()
    }
}

/// Iterator over user record offsets, infimum and supremum excluded.
pub struct UserRecs<'a> {
    page: &'a Page,
    rec: usize,
}

impl Iterator for UserRecs<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.rec == 0 || self.page.is_supremum(self.rec) {
            return None;
        }
        let current = self.rec;
        self.rec = self.page.rec_next(current);
        Some(current)
    }
}
