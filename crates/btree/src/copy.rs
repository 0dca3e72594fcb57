//! Bulk copy of a record list tail onto a freshly created page.
//!
//! The copy fills the new page directly, rebuilding its directory every
//! `(MAX + 1) / 2` records, and logs each record as a short insert so that
//! replay through ordinary inserts reproduces the same page image.

use common::{DbError, DbResult};
use log::debug;
use storage::{
    Direction, FIL_PAGE_DATA_END, PAGE_DIR_SLOT_MAX_N_OWNED, PAGE_DIR_SLOT_SIZE,
    PAGE_HEAP_NO_USER_LOW, PAGE_N_DIR_SLOTS, PAGE_SUPREMUM_END, Page, RecOffsets, RecordView,
};
use wal::mach::read_u32;
use wal::{LogMode, LogSink, LogType, RecoveryContext};

use crate::redo::{ReplayTarget, parse_insert, write_insert_log};

const RECS_PER_SLOT: usize = (PAGE_DIR_SLOT_MAX_N_OWNED + 1) / 2;

/// Copy the records from `rec` (inclusive, infimum meaning "from the first
/// record") to the end of `src` onto the empty page `new_page`.
///
/// # Errors
/// `DbError::Storage` when the records cannot fit; `new_page` is untouched
/// in that case.
///
/// # Panics
/// If `new_page` is not empty.
pub fn copy_rec_list_end_to_created_page<V, L>(
    new_page: &mut Page,
    src: &Page,
    rec: usize,
    view: &V,
    log: &mut L,
) -> DbResult<()>
where
    V: RecordView + ?Sized,
    L: LogSink + ?Sized,
{
    assert!(
        new_page.n_recs() == 0 && new_page.heap_top() == PAGE_SUPREMUM_END,
        "bulk copy needs a freshly created page"
    );
    let first = if src.is_infimum(rec) {
        src.rec_next(rec)
    } else {
        rec
    };
    if src.is_supremum(first) {
        return Ok(());
    }

    let mut offsets = RecOffsets::default();
    let mut total = 0usize;
    let mut n = 0usize;
    let mut r = first;
    while !src.is_supremum(r) {
        view.offsets_into(src.as_bytes(), r, &mut offsets);
        total += offsets.total_size();
        n += 1;
        r = src.rec_next(r);
    }
    // Room for every record, the directory at its largest, and the slot
    // reserve that ordinary inserts keep during replay.
    let max_slots = 2 + n / RECS_PER_SLOT;
    let limit = new_page.size() - FIL_PAGE_DATA_END;
    if PAGE_SUPREMUM_END + total + PAGE_DIR_SLOT_SIZE * (max_slots + 1) > limit {
        return Err(DbError::Storage(format!(
            "{n} records of {total} bytes do not fit on page {}",
            new_page.id().0
        )));
    }

    let mut len_pos = None;
    if let Some(mut region) = log.open(16) {
        region.write_initial(
            LogType::ListEndCopyCreated,
            new_page.space(),
            new_page.id(),
        );
        let pos = log.len() + region.len();
        region.write_u32(0);
        log.close(region);
        len_pos = Some(pos);
    }
    let log_start = log.len();
    let old_mode = len_pos.map(|_| log.set_mode(LogMode::ShortInserts));

    let mut prev_rec = new_page.infimum();
    let mut heap_top = PAGE_SUPREMUM_END;
    let mut count = 0usize;
    let mut slot_index = 0usize;
    let mut n_recs = 0usize;
    let mut rec = first;
    loop {
        view.offsets_into(src.as_bytes(), rec, &mut offsets);
        let insert = new_page.copy_rec_in(heap_top, src.as_bytes(), rec, &offsets);
        new_page.set_rec_next(prev_rec, insert);
        new_page.set_rec_n_owned(insert, 0);
        new_page.set_rec_heap_no(insert, PAGE_HEAP_NO_USER_LOW + n_recs as u16);
        count += 1;
        n_recs += 1;

        if count == RECS_PER_SLOT {
            slot_index += 1;
            new_page.set_slot_rec(slot_index, insert);
            new_page.set_rec_n_owned(insert, count);
            count = 0;
        }

        heap_top = insert + offsets.data_size();
        write_insert_log(new_page, insert, offsets.total_size(), prev_rec, view, log);
        prev_rec = insert;

        rec = src.rec_next(rec);
        if src.is_supremum(rec) {
            break;
        }
    }

    // Merge the last two slots when ordinary inserts would not have split
    // them apart yet.
    if slot_index > 0 && count + 1 + RECS_PER_SLOT <= PAGE_DIR_SLOT_MAX_N_OWNED {
        let last = new_page.slot_rec(slot_index);
        new_page.set_rec_n_owned(last, 0);
        count += RECS_PER_SLOT;
        slot_index -= 1;
    }

    if let Some(pos) = len_pos {
        let len = (log.len() - log_start) as u32;
        log.patch(pos, &len.to_be_bytes());
    }

    let supremum = new_page.supremum();
    new_page.set_rec_next(prev_rec, supremum);
    new_page.set_slot_rec(slot_index + 1, supremum);
    new_page.set_rec_n_owned(supremum, count + 1);
    new_page.set_header_field(PAGE_N_DIR_SLOTS, (slot_index + 2) as u16);
    new_page.set_heap_top(heap_top);
    new_page.set_n_heap(PAGE_HEAP_NO_USER_LOW + n_recs as u16);
    new_page.set_n_recs(n_recs);
    new_page.set_last_insert(None);
    new_page.set_direction(Direction::NoDirection);
    new_page.set_n_direction(0);
    new_page.modify_clock_inc();

    if let Some(mode) = old_mode {
        log.set_mode(mode);
    }
    debug!(
        "page {}: bulk copied {n_recs} records into {} slots",
        new_page.id().0,
        slot_index + 2
    );
    Ok(())
}

/// Parse a bulk copy body; with a target, replay its short inserts.
pub fn parse_copy_rec_list_to_created_page(
    buf: &[u8],
    page_size: usize,
    target: ReplayTarget<'_>,
    ctx: &mut RecoveryContext,
) -> Option<usize> {
    let log_data_len = read_u32(buf)? as usize;
    let rec_end = 4 + log_data_len;
    if buf.len() < rec_end {
        return None;
    }
    let Some((page, view)) = target else {
        return Some(rec_end);
    };

    let mut pos = 4;
    while pos < rec_end {
        let Some(n) = parse_insert(true, &buf[pos..rec_end], page_size, Some((&mut *page, view)), ctx)
        else {
            if !ctx.found_corrupt_log {
                ctx.mark_corrupt("short insert overruns its bulk copy record");
            }
            return None;
        };
        pos += n;
    }

    page.set_last_insert(None);
    page.set_direction(Direction::NoDirection);
    page.set_n_direction(0);
    page.modify_clock_inc();
    Some(rec_end)
}
