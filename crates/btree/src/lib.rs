//! Record-level operations on a single index page.
//!
//! A [`PageCursor`] rests on one record of a [`storage::Page`]. It can be
//! positioned by a directory search, insert a record after itself and delete
//! the record it rests on. Every mutation writes a physiological redo record
//! into a [`wal::LogSink`], and the `parse_*` functions replay those records
//! onto a page image during recovery.
//!
//! # Example
//!
//! ```
//! use btree::{PageCursor, SearchKey, SearchMode, TupleComparator};
//! use common::{Config, PageId, SpaceId};
//! use storage::{CompactFormat, Page};
//! use types::Value;
//! use wal::Mtr;
//!
//! let format = CompactFormat::new(1);
//! let mut page = Page::new_index(SpaceId(0), PageId(3), 16384).unwrap();
//! let mut mtr = Mtr::new();
//!
//! for v in [10, 5, 20] {
//!     let key = SearchKey::from_values(&[Value::Int(v)]);
//!     let (mut cursor, _) = PageCursor::search(
//!         &mut page,
//!         &format,
//!         &TupleComparator,
//!         &key,
//!         SearchMode::LessOrEqual,
//!         &Config::default(),
//!     );
//!     cursor.insert_tuple(&format, &[Value::Int(v)], &mut mtr).unwrap();
//! }
//! assert_eq!(page.n_recs(), 3);
//! assert_eq!(mtr.n_records(), 3);
//! ```


pub mod cmp;
pub mod copy;
pub mod cursor;
pub mod recovery;
pub mod redo;
pub mod search;

pub use cmp::{KeyComparator, Matched, SearchKey, TupleComparator};
pub use copy::{copy_rec_list_end_to_created_page, parse_copy_rec_list_to_created_page};
pub use cursor::{PageCursor, RandomCursor};
pub use recovery::{
    LogRecordSummary, RecoveryStats, apply_batch, parse_or_apply_body, recover_page,
    summarize_batch,
};
pub use redo::{ReplayTarget, create_page, parse_delete, parse_insert, parse_page_create};
pub use search::{SearchMatch, SearchMode, search_with_match, try_search_shortcut};
