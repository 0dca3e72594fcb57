//! Integration tests demonstrating testsupport usage.

use btree::SearchMode;
use storage::CompactFormat;
use testsupport::prelude::*;
use wal::{Mtr, NoLog};

#[test]
fn test_fixture_round_trip_through_the_log() {
    init_logging();
    let mut ctx = TestContext::new().unwrap();
    let mut fixture = PageFixture::new();

    for v in [10, 5, 20, 15] {
        let mut mtr = Mtr::new();
        fixture.insert(v, &mut mtr).unwrap();
        ctx.commit(mtr).unwrap();
    }
    ctx.reopen().unwrap();

    let mut page = fixture.fresh_page();
    let stats = ctx.recover(&mut page, &fixture.format).unwrap();
    assert_eq!(stats.batches_applied, 4);
    assert_eq!(int_keys_of(&page), vec![5, 10, 15, 20]);
    page.set_lsn(0);
    assert_same_image(&page, &fixture.page);
}

#[test]
fn test_linear_search_agrees_on_a_small_page() {
    let mut fixture = PageFixture::new();
    for v in 0..30 {
        fixture.insert(v * 2, &mut NoLog).unwrap();
    }
    for mode in [
        SearchMode::Less,
        SearchMode::LessOrEqual,
        SearchMode::Greater,
        SearchMode::GreaterOrEqual,
    ] {
        for key in [-1, 0, 7, 8, 58, 59] {
            let expected = linear_search(
                &fixture.page,
                &fixture.format,
                &ForgetfulComparator,
                &int_key(key),
                mode,
            );
            assert_eq!(fixture.search(key, mode).0, expected, "{mode:?} {key}");
        }
    }
}

#[test]
fn test_directory_assertions_accept_a_busy_page() {
    let mut fixture = PageFixture::new();
    for v in 0..100 {
        fixture.insert(v, &mut NoLog).unwrap();
    }
    for v in (0..100).step_by(3) {
        assert!(fixture.delete(v, &mut NoLog));
    }
    assert_directory_bounds(&fixture.page);
    assert_page_valid(&fixture.page, &CompactFormat::new(1));
}

#[test]
fn test_error_assertion_matches_corrupt_log() {
    let ctx = TestContext::new().unwrap();
    std::fs::write(ctx.wal_path(), [0u8; 3]).unwrap();
    let mut page = index_page(16384);
    // A torn frame is not an error; the log is simply empty.
    let stats = ctx.recover(&mut page, &CompactFormat::new(1)).unwrap();
    assert_eq!(stats.batches_applied, 0);

    let batch = wal::LogBatch {
        lsn: 5,
        body: vec![0xEE],
    };
    assert_error_contains(
        btree::recover_page(&mut page, &CompactFormat::new(1), &[batch]),
        "corrupt redo log",
    );
}
