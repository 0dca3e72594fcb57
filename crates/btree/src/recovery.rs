//! Applying logged batches to page images.

use common::pretty::format_bytes;
use common::{DbError, DbResult, Lsn};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use storage::{Page, RecordView};
use wal::mach::read_u16;
use wal::{LogBatch, LogType, RecoveryContext, parse_record_header};

use crate::copy::parse_copy_rec_list_to_created_page;
use crate::redo::{ReplayTarget, parse_delete, parse_insert, parse_page_create};

fn parse_body_record(
    ty: LogType,
    buf: &[u8],
    page_size: usize,
    target: ReplayTarget<'_>,
    ctx: &mut RecoveryContext,
) -> Option<usize> {
    match ty {
        LogType::RecInsert => parse_insert(false, buf, page_size, target, ctx),
        LogType::RecDelete => parse_delete(buf, page_size, target, ctx),
        LogType::ListEndCopyCreated => {
            parse_copy_rec_list_to_created_page(buf, page_size, target, ctx)
        }
        LogType::PageCreate => parse_page_create(target),
    }
}

fn corrupt_at(ctx: &RecoveryContext, pos: usize, what: &str) -> DbError {
    if ctx.found_corrupt_log {
        DbError::CorruptLog(format!("{what} at body offset {pos}"))
    } else {
        DbError::CorruptLog(format!("{what} truncated at body offset {pos}"))
    }
}

/// Walk every record of a batch body. Records addressed to the target page
/// are applied; the rest are only parsed. Returns how many were applied.
///
/// # Errors
/// `DbError::CorruptLog` on the first record that is corrupt or truncated.
pub fn parse_or_apply_body(
    body: &[u8],
    page_size: usize,
    mut target: ReplayTarget<'_>,
    ctx: &mut RecoveryContext,
) -> DbResult<usize> {
    let mut pos = 0;
    let mut applied = 0;
    while pos < body.len() {
        let start = pos;
        let Some(header) = parse_record_header(&body[pos..], ctx) else {
            return Err(corrupt_at(ctx, start, "record header"));
        };
        pos += header.len;

        let mine = target
            .as_ref()
            .is_some_and(|(page, _)| page.space() == header.space && page.id() == header.page_no);
        let this: ReplayTarget<'_> = if mine {
            target.as_mut().map(|(page, view)| (&mut **page, *view))
        } else {
            None
        };

        let Some(n) = parse_body_record(header.ty, &body[pos..], page_size, this, ctx) else {
            return Err(corrupt_at(ctx, start, &header.ty.to_string()));
        };
        if ctx.found_corrupt_log {
            return Err(corrupt_at(ctx, start, &header.ty.to_string()));
        }
        pos += n;
        if mine {
            applied += 1;
        }
    }
    Ok(applied)
}

/// Apply one batch to `page` unless the page already reflects it. The page
/// LSN advances to the batch LSN when any record touched the page.
pub fn apply_batch(page: &mut Page, view: &dyn RecordView, batch: &LogBatch) -> DbResult<usize> {
    if batch.lsn <= page.lsn() {
        return Ok(0);
    }
    let mut ctx = RecoveryContext::new();
    let page_size = page.size();
    let applied = parse_or_apply_body(&batch.body, page_size, Some((&mut *page, view)), &mut ctx)?;
    if applied > 0 {
        page.set_lsn(batch.lsn);
    }
    Ok(applied)
}

/// Outcome of replaying a log against one page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub batches_applied: usize,
    pub batches_skipped: usize,
    pub records_applied: usize,
    pub end_lsn: Lsn,
}

/// Replay `batches` in order against `page`.
pub fn recover_page(
    page: &mut Page,
    view: &dyn RecordView,
    batches: &[LogBatch],
) -> DbResult<RecoveryStats> {
    let mut stats = RecoveryStats {
        end_lsn: page.lsn(),
        ..RecoveryStats::default()
    };
    for batch in batches {
        let records = apply_batch(page, view, batch)?;
        if records == 0 {
            stats.batches_skipped += 1;
            continue;
        }
        debug!(
            "page {}: applied {records} records up to lsn {}",
            page.id().0,
            batch.lsn
        );
        stats.batches_applied += 1;
        stats.records_applied += records;
        stats.end_lsn = batch.lsn;
    }
    info!(
        "page {} recovered: {} batches applied, {} skipped, lsn {}",
        page.id().0,
        stats.batches_applied,
        stats.batches_skipped,
        stats.end_lsn
    );
    Ok(stats)
}

/// One redo record as shown by inspection tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecordSummary {
    pub lsn: Lsn,
    pub offset: usize,
    pub ty: String,
    pub space: u32,
    pub page_no: u32,
    pub len: usize,
    pub detail: String,
}

/// Describe every record of a batch without applying it.
///
/// # Errors
/// `DbError::CorruptLog` on the first record that does not parse.
pub fn summarize_batch(batch: &LogBatch, page_size: usize) -> DbResult<Vec<LogRecordSummary>> {
    let body = &batch.body;
    let mut ctx = RecoveryContext::new();
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        let start = pos;
        let Some(header) = parse_record_header(&body[pos..], &mut ctx) else {
            return Err(corrupt_at(&ctx, start, "record header"));
        };
        pos += header.len;
        let rest = &body[pos..];
        let Some(n) = parse_body_record(header.ty, rest, page_size, None, &mut ctx) else {
            return Err(corrupt_at(&ctx, start, &header.ty.to_string()));
        };

        let detail = match header.ty {
            LogType::RecInsert => format!(
                "after rec {}: {}",
                read_u16(rest).unwrap_or_default(),
                format_bytes(&rest[2..n], 16)
            ),
            LogType::RecDelete => format!("rec {}", read_u16(rest).unwrap_or_default()),
            LogType::ListEndCopyCreated => {
                format!("{} short inserts", count_short_inserts(&rest[4..n], page_size))
            }
            LogType::PageCreate => String::new(),
        };
        pos += n;
        out.push(LogRecordSummary {
            lsn: batch.lsn,
            offset: start,
            ty: header.ty.to_string(),
            space: header.space.0,
            page_no: header.page_no.0,
            len: pos - start,
            detail,
        });
    }
    Ok(out)
}

fn count_short_inserts(mut buf: &[u8], page_size: usize) -> usize {
    let mut ctx = RecoveryContext::new();
    let mut n = 0;
    while !buf.is_empty() {
        match parse_insert(true, buf, page_size, None, &mut ctx) {
            Some(len) => {
                buf = &buf[len..];
                n += 1;
            }
            None => break,
        }
    }
    n
}
