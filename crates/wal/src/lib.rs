//! Redo logging for index pages.
//!
//! Page operations write physiological redo records into a mini-transaction
//! ([`Mtr`]); committing the mini-transaction appends its bytes to the
//! write-ahead log file as one [`LogBatch`]. On restart the batches are
//! replayed in order against page images.
//!
//! # Architecture
//!
//! - **Physiological records**: addressed to one page, interpreted by the page code
//! - **Batch per mini-transaction**: a batch is applied entirely or not at all
//! - **Checksummed framing**: `u32` length, `u32` CRC32, bincode payload
//! - **Torn tails tolerated**: replay stops at the first incomplete or damaged frame
//!
//! # Example
//!
//! ```no_run
//! use wal::{LogSink, LogType, Mtr, Wal};
//! use common::{PageId, SpaceId};
//!
//! let mut wal = Wal::open("data/redo.wal").unwrap();
//!
//! let mut mtr = Mtr::new();
//! if let Some(mut region) = mtr.open(16) {
//!     region.write_initial(LogType::PageCreate, SpaceId(0), PageId(3));
//!     mtr.close(region);
//! }
//! let lsn = mtr.commit(&mut wal).unwrap();
//! wal.sync().unwrap();
//!
//! for batch in Wal::replay("data/redo.wal").unwrap() {
//!     assert!(batch.lsn <= lsn);
//! }
//! ```


pub mod mach;
pub mod mtr;
pub mod recv;

pub use mtr::{LogMode, LogRegion, LogSink, LogType, Mtr, NoLog};
pub use recv::{RecordHeader, RecoveryContext, parse_record_header};

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::{DbError, DbResult, Lsn};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

/// LSN of an empty log; the first batch ends past it.
pub const LOG_START_LSN: Lsn = 1;

const FRAME_HEADER_SIZE: usize = 8;
const MAX_FRAME_LEN: u32 = 1 << 26;

/// The redo of one committed mini-transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBatch {
    /// LSN just past the end of this batch.
    pub lsn: Lsn,
    /// Concatenated redo records.
    pub body: Vec<u8>,
}

/// Write-ahead log file of redo batches.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    file: File,
    end_lsn: Lsn,
}

impl Wal {
    /// Open or create a log file, positioning the LSN after the last intact
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Wal` if the file cannot be opened or scanned.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (batches, valid_len) = Self::scan(&path)?;
        let end_lsn = batches.last().map_or(LOG_START_LSN, |batch| batch.lsn);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DbError::Wal(format!("Failed to open WAL file: {}", e)))?;

        let file_len = file
            .metadata()
            .map_err(|e| DbError::Wal(format!("Failed to stat WAL file: {}", e)))?
            .len();
        if file_len > valid_len {
            warn!(
                "dropping {} bytes of damaged WAL tail",
                file_len - valid_len
            );
            file.set_len(valid_len)
                .map_err(|e| DbError::Wal(format!("Failed to cut WAL tail: {}", e)))?;
        }

        Ok(Self {
            path,
            file,
            end_lsn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// LSN just past the last appended batch.
    pub fn end_lsn(&self) -> Lsn {
        self.end_lsn
    }

    /// Append one batch of redo and return its end LSN.
    ///
    /// The frame is flushed but not fsynced; use `sync()` for durability.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Wal` if serialization or writing fails.
    pub fn append(&mut self, body: &[u8]) -> DbResult<Lsn> {
        let batch = LogBatch {
            lsn: self.end_lsn + body.len() as Lsn,
            body: body.to_vec(),
        };
        self.write_frame(&batch)?;
        debug!("appended {} redo bytes, end lsn {}", body.len(), batch.lsn);
        self.end_lsn = batch.lsn;
        Ok(batch.lsn)
    }

    fn write_frame(&mut self, batch: &LogBatch) -> DbResult<()> {
        let payload = encode_to_vec(batch, bincode_config())
            .map_err(|e| DbError::Wal(format!("Failed to serialize batch: {}", e)))?;
        let checksum = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&payload);

        self.file
            .write_all(&frame)
            .map_err(|e| DbError::Wal(format!("Failed to write batch: {}", e)))?;
        self.file
            .flush()
            .map_err(|e| DbError::Wal(format!("Failed to flush WAL: {}", e)))
    }

    /// Fsync the WAL to ensure durability.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Wal` if fsync fails.
    pub fn sync(&mut self) -> DbResult<()> {
        self.file
            .sync_all()
            .map_err(|e| DbError::Wal(format!("Failed to sync WAL: {}", e)))
    }

    /// Read every intact batch from the file, oldest first.
    ///
    /// A missing file replays as empty. Reading stops at the first frame
    /// that is truncated or fails its checksum.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Wal` if the file cannot be read.
    pub fn replay(path: impl AsRef<Path>) -> DbResult<Vec<LogBatch>> {
        Self::scan(path.as_ref()).map(|(batches, _)| batches)
    }

    /// Intact batches plus the byte length they occupy.
    fn scan(path: &Path) -> DbResult<(Vec<LogBatch>, u64)> {
        let mut file = match OpenOptions::new().read(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no WAL at {}, nothing to replay", path.display());
                return Ok((Vec::new(), 0));
            }
            Err(e) => return Err(DbError::Wal(format!("Failed to open WAL for replay: {}", e))),
        };

        let mut batches = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut header = [0u8; FRAME_HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(DbError::Wal(format!("Failed to read frame header: {}", e)));
                }
            }
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let checksum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if len > MAX_FRAME_LEN {
                warn!("WAL frame at byte {offset} claims {len} bytes, ignoring the tail");
                break;
            }

            let mut payload = vec![0u8; len as usize];
            if file.read_exact(&mut payload).is_err() {
                warn!("torn WAL frame at byte {offset}, ignoring the tail");
                break;
            }
            if crc32fast::hash(&payload) != checksum {
                warn!("WAL frame at byte {offset} fails its checksum, ignoring the tail");
                break;
            }
            let Ok((batch, _)) = decode_from_slice::<LogBatch, _>(&payload, bincode_config())
            else {
                warn!("WAL frame at byte {offset} does not decode, ignoring the tail");
                break;
            };
            batches.push(batch);
            offset += (FRAME_HEADER_SIZE + payload.len()) as u64;
        }

        Ok((batches, offset))
    }

    /// Truncate the WAL file, removing all batches.
    ///
    /// Used after checkpointing when all batches have reached the pages. An
    /// empty batch carrying the current end LSN is left behind so a reopened
    /// log keeps counting from there.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Wal` if the file cannot be truncated.
    pub fn truncate(&mut self) -> DbResult<()> {
        drop(std::mem::replace(
            &mut self.file,
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)
                .map_err(|e| DbError::Wal(format!("Failed to truncate WAL: {}", e)))?,
        ));

        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| DbError::Wal(format!("Failed to reopen WAL after truncate: {}", e)))?;

        self.write_frame(&LogBatch {
            lsn: self.end_lsn,
            body: Vec::new(),
        })
    }
}

/// Get the bincode configuration for WAL serialization.
///
/// Uses little-endian, fixed-width integers for cross-platform compatibility.
fn bincode_config() -> impl Config {
    config::legacy()
}
