//! Common page fixtures.
//!
//! Most page tests work on a single-column index of integers, inserted and
//! deleted through a searched cursor the way an index would do it.

use btree::{PageCursor, SearchKey, SearchMatch, SearchMode, TupleComparator};
use common::{Config, DEFAULT_PAGE_SIZE, PageId, SpaceId};
use storage::{CompactFormat, Page, RecordView};
use types::{SqlType, Value};
use wal::LogSink;

/// Tablespace of every fixture page.
pub const TEST_SPACE: SpaceId = SpaceId(0);
/// Page number of every fixture page.
pub const TEST_PAGE: PageId = PageId(3);

/// An empty index page with the fixture identity.
///
/// # Panics
/// If `page_size` is not a supported page size.
pub fn index_page(page_size: usize) -> Page {
    Page::new_index(TEST_SPACE, TEST_PAGE, page_size).expect("valid page size")
}

/// Search key for one integer.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let key = int_key(42);
/// assert_eq!(key.n_fields(), 1);
/// ```
pub fn int_key(v: i64) -> SearchKey {
    SearchKey::from_values(&[Value::Int(v)])
}

/// Decode every user record of a single-integer-column page.
pub fn int_keys_of(page: &Page) -> Vec<i64> {
    let format = CompactFormat::new(1);
    page.user_recs()
        .map(|rec| {
            let offsets = format.offsets(page.as_bytes(), rec);
            match format.decode(page.rec_ref(rec), &offsets, &[SqlType::Int]) {
                Ok(values) => match values[0] {
                    Value::Int(v) => v,
                    ref other => panic!("record {rec} holds {other:?}"),
                },
                Err(e) => panic!("record {rec} does not decode: {e}"),
            }
        })
        .collect()
}

/// A page of single-integer records with the format and config to use it.
#[derive(Clone, Debug)]
pub struct PageFixture {
    pub page: Page,
    pub format: CompactFormat,
    pub config: Config,
}

impl Default for PageFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFixture {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_config(Config::builder().page_size(page_size).build())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            page: index_page(config.page_size),
            format: CompactFormat::new(1),
            config,
        }
    }

    /// An empty page with the same identity and size.
    pub fn fresh_page(&self) -> Page {
        index_page(self.page.size())
    }

    /// Position a cursor with `mode` and return where it landed.
    pub fn search(&mut self, v: i64, mode: SearchMode) -> (usize, SearchMatch) {
        let (cursor, matched) = PageCursor::search(
            &mut self.page,
            &self.format,
            &TupleComparator,
            &int_key(v),
            mode,
            &self.config,
        );
        (cursor.rec(), matched)
    }

    /// Insert `v` after the last record not greater than it. Returns the new
    /// record, or `None` when the page is full.
    pub fn insert<L: LogSink + ?Sized>(&mut self, v: i64, log: &mut L) -> Option<usize> {
        let (mut cursor, _) = PageCursor::search(
            &mut self.page,
            &self.format,
            &TupleComparator,
            &int_key(v),
            SearchMode::LessOrEqual,
            &self.config,
        );
        cursor
            .insert_tuple(&self.format, &[Value::Int(v)], log)
            .expect("one integer field always converts")
    }

    /// Delete the first record equal to `v`; `false` when there is none.
    pub fn delete<L: LogSink + ?Sized>(&mut self, v: i64, log: &mut L) -> bool {
        let (mut cursor, _) = PageCursor::search(
            &mut self.page,
            &self.format,
            &TupleComparator,
            &int_key(v),
            SearchMode::GreaterOrEqual,
            &self.config,
        );
        if !cursor.is_on_user_rec() {
            return false;
        }
        let found = {
            let page = cursor.page();
            let offsets = self.format.offsets(page.as_bytes(), cursor.rec());
            page.rec_ref(cursor.rec()).field(&offsets, 0) == Value::Int(v).encode_field().as_deref()
        };
        if found {
            cursor.delete(&self.format, log);
        }
        found
    }

    pub fn keys(&self) -> Vec<i64> {
        int_keys_of(&self.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wal::NoLog;

    #[test]
    fn fixture_keeps_keys_sorted() {
        let mut fixture = PageFixture::new();
        for v in [3, 1, 2, 2] {
            fixture.insert(v, &mut NoLog).unwrap();
        }
        assert_eq!(fixture.keys(), vec![1, 2, 2, 3]);
        assert!(fixture.delete(2, &mut NoLog));
        assert!(!fixture.delete(7, &mut NoLog));
        assert_eq!(fixture.keys(), vec![1, 2, 3]);
    }
}
