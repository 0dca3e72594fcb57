//! Mini-transactions: the in-memory buffer page operations write redo into.
//!
//! Page code never sees the log file. It asks a [`LogSink`] for a
//! [`LogRegion`], fills it, and hands it back. A sink that is not logging
//! returns no region, which page code treats as a successful no-op.

use std::fmt;

use common::{DbResult, Lsn, PageId, SpaceId};
use serde::{Deserialize, Serialize};

use crate::Wal;
use crate::mach::write_compressed;

/// Redo record types understood by the page replay code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogType {
    RecInsert,
    RecDelete,
    ListEndCopyCreated,
    PageCreate,
}

impl LogType {
    pub fn as_u8(self) -> u8 {
        match self {
            LogType::RecInsert => 9,
            LogType::RecDelete => 14,
            LogType::ListEndCopyCreated => 17,
            LogType::PageCreate => 19,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            9 => Some(LogType::RecInsert),
            14 => Some(LogType::RecDelete),
            17 => Some(LogType::ListEndCopyCreated),
            19 => Some(LogType::PageCreate),
            _ => None,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogType::RecInsert => "REC_INSERT",
            LogType::RecDelete => "REC_DELETE",
            LogType::ListEndCopyCreated => "LIST_END_COPY_CREATED",
            LogType::PageCreate => "PAGE_CREATE",
        };
        f.write_str(name)
    }
}

/// What a sink records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogMode {
    /// Every record carries its initial header.
    #[default]
    All,
    /// Inserts are written without the initial header and cursor offset;
    /// used inside a bulk copy record.
    ShortInserts,
    /// Nothing is written.
    None,
}

/// Bytes of one redo record being assembled.
#[derive(Debug, Default)]
pub struct LogRegion {
    bytes: Vec<u8>,
}

impl LogRegion {
    pub fn with_capacity(reserve: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(reserve),
        }
    }

    /// Type byte, compressed space id and compressed page number.
    pub fn write_initial(&mut self, ty: LogType, space: SpaceId, page: PageId) {
        self.bytes.push(ty.as_u8());
        write_compressed(&mut self.bytes, space.0);
        write_compressed(&mut self.bytes, page.0);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_compressed(&mut self, v: u32) {
        write_compressed(&mut self.bytes, v);
    }

    pub fn write_bytes(&mut self, src: &[u8]) {
        self.bytes.extend_from_slice(src);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Destination for redo records produced by page operations.
pub trait LogSink {
    fn mode(&self) -> LogMode;

    /// Switch modes, returning the previous one.
    fn set_mode(&mut self, mode: LogMode) -> LogMode;

    /// Start a record of roughly `reserve` bytes; `None` when not logging.
    fn open(&mut self, reserve: usize) -> Option<LogRegion>;

    /// Append a finished record to the sink.
    fn close(&mut self, region: LogRegion);

    /// Bytes of redo accumulated so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite bytes already closed into the sink, starting at `pos`.
    fn patch(&mut self, pos: usize, bytes: &[u8]);
}

/// A mini-transaction buffering the redo of one atomic page change.
#[derive(Debug, Default)]
pub struct Mtr {
    body: Vec<u8>,
    mode: LogMode,
    n_records: usize,
}

impl Mtr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Number of regions closed into this mini-transaction.
    pub fn n_records(&self) -> usize {
        self.n_records
    }

    /// Append the accumulated redo to `wal` as one batch and return its end
    /// LSN. Empty mini-transactions write nothing.
    pub fn commit(self, wal: &mut Wal) -> DbResult<Lsn> {
        if self.body.is_empty() {
            return Ok(wal.end_lsn());
        }
        wal.append(&self.body)
    }
}

impl LogSink for Mtr {
    fn mode(&self) -> LogMode {
        self.mode
    }

    fn set_mode(&mut self, mode: LogMode) -> LogMode {
        std::mem::replace(&mut self.mode, mode)
    }

    fn open(&mut self, reserve: usize) -> Option<LogRegion> {
        match self.mode {
            LogMode::None => None,
            LogMode::All | LogMode::ShortInserts => Some(LogRegion::with_capacity(reserve)),
        }
    }

    fn close(&mut self, region: LogRegion) {
        self.body.extend_from_slice(&region.bytes);
        self.n_records += 1;
    }

    fn len(&self) -> usize {
        self.body.len()
    }

    fn patch(&mut self, pos: usize, bytes: &[u8]) {
        self.body[pos..pos + bytes.len()].copy_from_slice(bytes);
    }
}

/// A sink that never logs; replay applies changes through it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLog;

impl LogSink for NoLog {
    fn mode(&self) -> LogMode {
        LogMode::None
    }

    fn set_mode(&mut self, _mode: LogMode) -> LogMode {
        LogMode::None
    }

    fn open(&mut self, _reserve: usize) -> Option<LogRegion> {
        None
    }

    fn close(&mut self, _region: LogRegion) {}

    fn len(&self) -> usize {
        0
    }

    fn patch(&mut self, _pos: usize, _bytes: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mode_opens_nothing() {
        let mut mtr = Mtr::new();
        assert_eq!(mtr.set_mode(LogMode::None), LogMode::All);
        assert!(mtr.open(16).is_none());
        mtr.set_mode(LogMode::All);
        let mut region = mtr.open(16).unwrap();
        region.write_initial(LogType::RecDelete, SpaceId(0), PageId(300));
        region.write_u16(120);
        mtr.close(region);
        assert_eq!(mtr.body(), &[14, 0, 0x81, 0x2C, 0, 120]);
        assert_eq!(mtr.n_records(), 1);
    }

    #[test]
    fn patch_rewrites_closed_bytes() {
        let mut mtr = Mtr::new();
        let mut region = mtr.open(8).unwrap();
        region.write_u32(0);
        mtr.close(region);
        mtr.patch(0, &7u32.to_be_bytes());
        assert_eq!(mtr.body(), &[0, 0, 0, 7]);
    }

    #[test]
    fn log_types_round_trip_their_codes() {
        for ty in [
            LogType::RecInsert,
            LogType::RecDelete,
            LogType::ListEndCopyCreated,
            LogType::PageCreate,
        ] {
            assert_eq!(LogType::from_u8(ty.as_u8()), Some(ty));
        }
        assert_eq!(LogType::from_u8(0), None);
        assert_eq!(LogType::RecInsert.to_string(), "REC_INSERT");
    }
}
