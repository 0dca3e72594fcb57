//! Test support utilities for the index page workspace.
//!
//! This crate provides shared testing infrastructure including:
//! - Page fixtures that insert and delete integer keys through a cursor
//! - A redo log context backed by a temporary directory
//! - A linear-scan search oracle and a comparator that ignores prefix hints
//! - Property-based test generators for keys and page operations
//! - Custom assertion helpers for page structure
//!
//! # Example Usage
//!
//! ```
//! use testsupport::prelude::*;
//! use wal::NoLog;
//!
//! let mut fixture = PageFixture::new();
//! for v in [10, 5, 20, 15] {
//!     fixture.insert(v, &mut NoLog).unwrap();
//! }
//! assert_eq!(fixture.keys(), vec![5, 10, 15, 20]);
//! assert_page_valid(&fixture.page, &fixture.format);
//! ```

pub mod assertions;
pub mod context;
pub mod fixtures;
pub mod proptest_generators;
pub mod verify;

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::context::*;
    pub use crate::fixtures::*;
    pub use crate::init_logging;
    pub use crate::verify::*;
    pub use common::prelude::*;
}
