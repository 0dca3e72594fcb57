#[cfg(test)]
mod tests;

pub mod pretty;

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Smallest supported page size in bytes.
pub const MIN_PAGE_SIZE: usize = 4096;
/// Largest supported page size; record offsets must fit in 16 bits.
pub const MAX_PAGE_SIZE: usize = 32768;
/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 16384;

/// Page number within a tablespace.
/// Examples:
/// - `let root = PageId(3);`
/// - `let leaf = PageId(1024);`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

/// Tablespace identifier stamped into every page and redo record header.
/// Examples:
/// - `let system = SpaceId(0);`
/// - `let users = SpaceId(7);`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(pub u32);

/// Log sequence number: byte position just past the end of a log batch.
pub type Lsn = u64;

/// Canonical error type shared across the page subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("storage: {0}")]
    Storage(String),
    #[error("wal: {0}")]
    Wal(String),
    #[error("corrupt redo log: {0}")]
    CorruptLog(String),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// How `SearchMode::LessOrExtends` is treated by page searches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionPolicy {
    /// `LessOrExtends` degrades to `LessOrEqual`.
    #[default]
    Strict,
    /// A record whose field extends the key's last partially matched field
    /// sorts on the low side of the key.
    LessOrExtends,
}

/// Runtime configuration for index pages.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder()
///     .page_size(8192)
///     .adaptive_search(false)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Fixed page size in bytes; a power of two between 4 KiB and 32 KiB.
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
    /// Enables the last-insert shortcut for ascending insert workloads.
    #[builder(default = true)]
    pub adaptive_search: bool,
    /// Treatment of prefix-extending records during searches.
    #[builder(default)]
    pub extension: ExtensionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            adaptive_search: true,
            extension: ExtensionPolicy::Strict,
        }
    }
}

impl Config {
    /// Reject page sizes the page layout cannot address.
    pub fn validate(&self) -> DbResult<()> {
        validate_page_size(self.page_size)
    }
}

/// Check that `size` is a power of two within the supported range.
pub fn validate_page_size(size: usize) -> DbResult<()> {
    if !size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) {
        return Err(DbError::Config(format!(
            "page size {size} must be a power of two in {MIN_PAGE_SIZE}..={MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{Config, DbError, DbResult, ExtensionPolicy, Lsn, PageId, SpaceId};
    pub use types::{SqlType, Value};
}
