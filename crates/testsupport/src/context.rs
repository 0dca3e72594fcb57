//! Redo log test context.
//!
//! Provides an isolated write-ahead log in a temporary directory. Each test
//! gets its own clean log that is removed on drop.

use btree::{RecoveryStats, recover_page};
use common::{DbResult, Lsn};
use std::path::{Path, PathBuf};
use storage::{Page, RecordView};
use tempfile::TempDir;
use wal::{LogBatch, Mtr, Wal};

/// A write-ahead log living in its own temporary directory.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
/// use wal::Mtr;
///
/// let mut ctx = TestContext::new().unwrap();
/// let mut fixture = PageFixture::new();
/// let mut mtr = Mtr::new();
/// fixture.insert(1, &mut mtr).unwrap();
/// ctx.commit(mtr).unwrap();
///
/// let mut page = fixture.fresh_page();
/// ctx.recover(&mut page, &fixture.format).unwrap();
/// assert_eq!(int_keys_of(&page), vec![1]);
/// ```
pub struct TestContext {
    _temp_dir: TempDir,
    wal_path: PathBuf,
    wal: Wal,
}

impl TestContext {
    pub fn new() -> DbResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let wal_path = temp_dir.path().join("redo.wal");
        let wal = Wal::open(&wal_path)?;
        Ok(Self {
            _temp_dir: temp_dir,
            wal_path,
            wal,
        })
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn wal(&mut self) -> &mut Wal {
        &mut self.wal
    }

    /// Commit a mini-transaction and make it durable.
    pub fn commit(&mut self, mtr: Mtr) -> DbResult<Lsn> {
        let lsn = mtr.commit(&mut self.wal)?;
        self.wal.sync()?;
        Ok(lsn)
    }

    /// Close and reopen the log, as a restart would.
    pub fn reopen(&mut self) -> DbResult<()> {
        self.wal = Wal::open(&self.wal_path)?;
        Ok(())
    }

    pub fn batches(&self) -> DbResult<Vec<LogBatch>> {
        Wal::replay(&self.wal_path)
    }

    /// Replay every durable batch against `page`.
    pub fn recover(&self, page: &mut Page, view: &dyn RecordView) -> DbResult<RecoveryStats> {
        recover_page(page, view, &self.batches()?)
    }
}
