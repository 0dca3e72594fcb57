//! Shared state and helpers for parsing redo during recovery.

use std::fmt;

use common::{PageId, SpaceId};
use log::warn;

use crate::mach::parse_compressed;
use crate::mtr::LogType;

/// State threaded through every parse call of one recovery run.
///
/// Parsers report corruption by raising `found_corrupt_log` and returning
/// `None`; returning `None` with the flag clear means the input ended early.
#[derive(Debug, Default)]
pub struct RecoveryContext {
    pub found_corrupt_log: bool,
}

impl RecoveryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_corrupt(&mut self, what: impl fmt::Display) {
        warn!("corrupt redo record: {what}");
        self.found_corrupt_log = true;
    }

    /// [`parse_compressed`] with an invalid prefix raised as corruption.
    pub fn compressed(&mut self, buf: &[u8]) -> Option<(u32, usize)> {
        parse_compressed(buf).unwrap_or_else(|err| {
            self.mark_corrupt(err);
            None
        })
    }
}

/// The initial bytes of a redo record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub ty: LogType,
    pub space: SpaceId,
    pub page_no: PageId,
    /// Bytes consumed by the header.
    pub len: usize,
}

/// Parse a type byte, compressed space id and compressed page number.
pub fn parse_record_header(buf: &[u8], ctx: &mut RecoveryContext) -> Option<RecordHeader> {
    let type_byte = *buf.first()?;
    let Some(ty) = LogType::from_u8(type_byte) else {
        ctx.mark_corrupt(format_args!("unknown record type {type_byte}"));
        return None;
    };
    let mut pos = 1;
    let (space, n) = ctx.compressed(&buf[pos..])?;
    pos += n;
    let (page_no, n) = ctx.compressed(&buf[pos..])?;
    pos += n;
    Some(RecordHeader {
        ty,
        space: SpaceId(space),
        page_no: PageId(page_no),
        len: pos,
    })
}
