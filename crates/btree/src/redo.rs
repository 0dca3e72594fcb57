//! Redo records for single-record inserts and deletes, and page creation.
//!
//! An insert is logged as the byte suffix in which the new record differs
//! from the record the cursor rested on; replay rebuilds the record from the
//! prefix of its predecessor on the page being recovered.

use storage::rec::{
    REC_N_NEW_EXTRA_BYTES, REC_STATUS_INFIMUM, info_and_status_bits, set_info_and_status_bits,
};
use storage::{PAGE_SUPREMUM_END, Page, RecOffsets, RecordView};
use wal::mach::{compressed_size, read_u16};
use wal::{LogMode, LogSink, LogType, NoLog, RecoveryContext};

use crate::cursor::PageCursor;

/// Replay target: the page being recovered and the format of its records.
pub type ReplayTarget<'a> = Option<(&'a mut Page, &'a dyn RecordView)>;

/// Log the insert of `insert` (`rec_size` bytes) after `cursor_rec`.
pub(crate) fn write_insert_log<V, L>(
    page: &Page,
    insert: usize,
    rec_size: usize,
    cursor_rec: usize,
    view: &V,
    log: &mut L,
) where
    V: RecordView + ?Sized,
    L: LogSink + ?Sized,
{
    let short = log.mode() == LogMode::ShortInserts;
    let Some(mut region) = log.open(rec_size + 32) else {
        return;
    };

    let buf = page.as_bytes();
    let ins_offsets = view.offsets(buf, insert);
    let cur_offsets = view.offsets(buf, cursor_rec);
    let extra_size = ins_offsets.extra_size();
    let cur_extra_size = cur_offsets.extra_size();
    let cur_rec_size = cur_offsets.total_size();
    debug_assert_eq!(ins_offsets.total_size(), rec_size);

    // First byte where the new record differs from the cursor record. The
    // fixed header always differs, so a mismatch there resumes at the origin.
    let mut i = 0;
    if cur_extra_size == extra_size {
        let min_rec_size = cur_rec_size.min(rec_size);
        let ins = &buf[insert - extra_size..];
        let cur = &buf[cursor_rec - cur_extra_size..];
        while i < min_rec_size {
            if ins[i] == cur[i] {
                i += 1;
            } else if i < extra_size && i >= extra_size - REC_N_NEW_EXTRA_BYTES {
                i = extra_size;
            } else {
                break;
            }
        }
    }

    if !short {
        region.write_initial(LogType::RecInsert, page.space(), page.id());
        region.write_u16(cursor_rec as u16);
    }

    let ins_info = info_and_status_bits(buf, insert);
    let suffix_len = (rec_size - i) as u32;
    if ins_info != info_and_status_bits(buf, cursor_rec)
        || extra_size != cur_extra_size
        || rec_size != cur_rec_size
    {
        region.write_compressed(2 * suffix_len + 1);
        region.write_u8(ins_info);
        region.write_compressed(extra_size as u32);
        region.write_compressed(i as u32);
    } else {
        region.write_compressed(2 * suffix_len);
    }
    let start = insert - extra_size;
    region.write_bytes(&buf[start + i..start + rec_size]);
    log.close(region);
}

/// Parse an insert record body; with a target, apply it.
///
/// Returns the number of bytes consumed, or `None` when the input ends
/// early or is corrupt (in which case `ctx.found_corrupt_log` is raised).
pub fn parse_insert(
    short: bool,
    buf: &[u8],
    page_size: usize,
    target: ReplayTarget<'_>,
    ctx: &mut RecoveryContext,
) -> Option<usize> {
    let mut pos = 0;
    let mut cursor_offset = 0;
    if !short {
        cursor_offset = read_u16(buf)? as usize;
        pos += 2;
        if cursor_offset >= page_size {
            ctx.mark_corrupt(format_args!("insert cursor offset {cursor_offset}"));
            return None;
        }
    }

    let (end_seg_len, n) = ctx.compressed(&buf[pos..])?;
    pos += n;
    let end_seg_len = end_seg_len as usize;
    if end_seg_len >= 2 * page_size {
        ctx.mark_corrupt(format_args!("insert segment length {end_seg_len}"));
        return None;
    }

    let mut header = None;
    if end_seg_len & 1 != 0 {
        let info = *buf.get(pos)?;
        pos += 1;
        let (origin, n) = ctx.compressed(&buf[pos..])?;
        pos += n;
        let (mismatch, n) = ctx.compressed(&buf[pos..])?;
        pos += n;
        let (origin, mismatch) = (origin as usize, mismatch as usize);
        if origin >= page_size || mismatch >= page_size {
            ctx.mark_corrupt(format_args!(
                "insert origin {origin} or mismatch index {mismatch}"
            ));
            return None;
        }
        header = Some((info, origin, mismatch));
    }

    let seg_len = end_seg_len >> 1;
    let rec_end = pos + seg_len;
    if buf.len() < rec_end {
        return None;
    }
    let Some((page, view)) = target else {
        return Some(rec_end);
    };

    let cursor_rec = if short {
        page.rec_prev(page.supremum())
    } else {
        let in_heap = cursor_offset >= PAGE_SUPREMUM_END && cursor_offset < page.heap_top();
        if !page.is_infimum(cursor_offset) && !in_heap {
            ctx.mark_corrupt(format_args!("insert cursor {cursor_offset} is not a record"));
            return None;
        }
        cursor_offset
    };

    let mut cur_offsets = RecOffsets::default();
    if view
        .try_offsets_into(page.as_bytes(), cursor_rec, &mut cur_offsets)
        .is_none()
    {
        ctx.mark_corrupt(format_args!("insert cursor {cursor_rec} does not parse"));
        return None;
    }
    let (info, origin_offset, mismatch_index) = match header {
        Some(header) => header,
        None => {
            let Some(mismatch) = cur_offsets.total_size().checked_sub(seg_len) else {
                ctx.mark_corrupt(format_args!("insert suffix of {seg_len} bytes"));
                return None;
            };
            (
                info_and_status_bits(page.as_bytes(), cursor_rec),
                cur_offsets.extra_size(),
                mismatch,
            )
        }
    };

    let cur_start = cursor_rec - cur_offsets.extra_size();
    if cur_start + mismatch_index > page.size() {
        ctx.mark_corrupt(format_args!("insert prefix of {mismatch_index} bytes"));
        return None;
    }
    let mut rec_buf = Vec::with_capacity(mismatch_index + seg_len);
    rec_buf.extend_from_slice(&page.as_bytes()[cur_start..cur_start + mismatch_index]);
    rec_buf.extend_from_slice(&buf[pos..rec_end]);

    if origin_offset < REC_N_NEW_EXTRA_BYTES
        || origin_offset > rec_buf.len()
        || info & 0x07 >= REC_STATUS_INFIMUM
    {
        ctx.mark_corrupt(format_args!("insert origin {origin_offset} or status {info:#x}"));
        return None;
    }
    set_info_and_status_bits(&mut rec_buf, origin_offset, info);

    let mut offsets = RecOffsets::default();
    let fits = view
        .try_offsets_into(&rec_buf, origin_offset, &mut offsets)
        .is_some()
        && offsets.extra_size() == origin_offset
        && offsets.total_size() == rec_buf.len();
    if !fits {
        ctx.mark_corrupt("rebuilt insert record does not match its own header");
        return None;
    }

    let mut cursor = PageCursor::at(page, cursor_rec);
    if cursor
        .insert_rec(&rec_buf, origin_offset, &offsets, view, &mut NoLog)
        .is_none()
    {
        ctx.mark_corrupt("insert does not fit on the page");
        return None;
    }
    Some(rec_end)
}

/// Log the delete of the record at `rec`.
pub(crate) fn write_delete_log<L>(page: &Page, rec: usize, log: &mut L)
where
    L: LogSink + ?Sized,
{
    let Some(mut region) = log.open(16) else {
        return;
    };
    region.write_initial(LogType::RecDelete, page.space(), page.id());
    region.write_u16(rec as u16);
    log.close(region);
}

/// Parse a delete record body; with a target, apply it.
pub fn parse_delete(
    buf: &[u8],
    page_size: usize,
    target: ReplayTarget<'_>,
    ctx: &mut RecoveryContext,
) -> Option<usize> {
    let offset = read_u16(buf)? as usize;
    if offset >= page_size {
        ctx.mark_corrupt(format_args!("delete offset {offset}"));
        return None;
    }
    if let Some((page, view)) = target {
        if offset < PAGE_SUPREMUM_END || offset >= page.heap_top() {
            ctx.mark_corrupt(format_args!("delete offset {offset} is not a user record"));
            return None;
        }
        PageCursor::at(page, offset).delete(view, &mut NoLog);
    }
    Some(2)
}

/// Format `page` as an empty index page and log it.
pub fn create_page<L>(page: &mut Page, log: &mut L)
where
    L: LogSink + ?Sized,
{
    page.create();
    if let Some(mut region) = log.open(1 + 2 * compressed_size(u32::MAX)) {
        region.write_initial(LogType::PageCreate, page.space(), page.id());
        log.close(region);
    }
}

/// Page creation carries no body.
pub fn parse_page_create(target: ReplayTarget<'_>) -> Option<usize> {
    if let Some((page, _)) = target {
        page.create();
    }
    Some(0)
}
