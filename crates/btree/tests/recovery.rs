//! Crash recovery through the write-ahead log.

use std::fs::OpenOptions;
use std::io::Write;

use btree::{copy_rec_list_end_to_created_page, create_page, recover_page, summarize_batch};
use common::DEFAULT_PAGE_SIZE;
use storage::CompactFormat;
use testsupport::prelude::*;
use wal::{LogBatch, LogType, Mtr, NoLog};

#[test]
fn committed_work_survives_a_restart() {
    init_logging();
    let mut ctx = TestContext::new().unwrap();
    let mut fixture = PageFixture::new();

    for chunk in [[10, 5, 20], [15, 1, 30]] {
        let mut mtr = Mtr::new();
        for v in chunk {
            fixture.insert(v, &mut mtr).unwrap();
        }
        let lsn = ctx.commit(mtr).unwrap();
        fixture.page.set_lsn(lsn);
    }
    let mut mtr = Mtr::new();
    assert!(fixture.delete(20, &mut mtr));
    let lsn = ctx.commit(mtr).unwrap();
    fixture.page.set_lsn(lsn);
    ctx.reopen().unwrap();

    let mut page = fixture.fresh_page();
    let stats = ctx.recover(&mut page, &fixture.format).unwrap();
    assert_eq!(stats.batches_applied, 3);
    assert_eq!(stats.end_lsn, lsn);
    assert_eq!(int_keys_of(&page), vec![1, 5, 10, 15, 30]);
    assert_same_image(&page, &fixture.page);
}

#[test]
fn uncommitted_work_is_lost() {
    let mut ctx = TestContext::new().unwrap();
    let mut fixture = PageFixture::new();

    let mut mtr = Mtr::new();
    fixture.insert(1, &mut mtr).unwrap();
    ctx.commit(mtr).unwrap();

    let mut lost = Mtr::new();
    fixture.insert(2, &mut lost).unwrap();
    drop(lost);

    let mut page = fixture.fresh_page();
    ctx.recover(&mut page, &fixture.format).unwrap();
    assert_eq!(int_keys_of(&page), vec![1]);
}

#[test]
fn torn_tail_is_ignored() {
    let mut ctx = TestContext::new().unwrap();
    let mut fixture = PageFixture::new();
    let mut mtr = Mtr::new();
    fixture.insert(7, &mut mtr).unwrap();
    ctx.commit(mtr).unwrap();

    let mut file = OpenOptions::new().append(true).open(ctx.wal_path()).unwrap();
    file.write_all(&[0x40, 0, 0, 0, 0xDE, 0xAD]).unwrap();
    drop(file);
    ctx.reopen().unwrap();

    let mut page = fixture.fresh_page();
    let stats = ctx.recover(&mut page, &fixture.format).unwrap();
    assert_eq!(stats.batches_applied, 1);
    assert_eq!(int_keys_of(&page), vec![7]);
}

#[test]
fn recovery_is_idempotent() {
    let mut ctx = TestContext::new().unwrap();
    let mut fixture = PageFixture::new();
    for v in 0..20 {
        let mut mtr = Mtr::new();
        fixture.insert(v, &mut mtr).unwrap();
        ctx.commit(mtr).unwrap();
    }

    let mut page = fixture.fresh_page();
    ctx.recover(&mut page, &fixture.format).unwrap();
    let once = page.clone();
    let stats = ctx.recover(&mut page, &fixture.format).unwrap();
    assert_eq!(stats.batches_applied, 0);
    assert_eq!(stats.batches_skipped, 20);
    assert_same_image(&page, &once);
}

#[test]
fn page_reorganisation_is_recovered() {
    let mut ctx = TestContext::new().unwrap();
    let mut fixture = PageFixture::new();
    for v in 0..40 {
        fixture.insert(v, &mut NoLog).unwrap();
    }
    for v in (0..40).step_by(2) {
        fixture.delete(v, &mut NoLog);
    }
    let image = fixture.page.clone();

    // Rebuild the page without its garbage: copy aside, re-create, copy back.
    let mut scratch = index_page(DEFAULT_PAGE_SIZE);
    copy_rec_list_end_to_created_page(
        &mut scratch,
        &fixture.page,
        fixture.page.infimum(),
        &fixture.format,
        &mut NoLog,
    )
    .unwrap();
    let mut mtr = Mtr::new();
    create_page(&mut fixture.page, &mut mtr);
    copy_rec_list_end_to_created_page(
        &mut fixture.page,
        &scratch,
        scratch.infimum(),
        &fixture.format,
        &mut mtr,
    )
    .unwrap();
    let lsn = ctx.commit(mtr).unwrap();
    fixture.page.set_lsn(lsn);
    assert_eq!(fixture.page.garbage(), 0);

    let batches = ctx.batches().unwrap();
    let summary = summarize_batch(&batches[0], DEFAULT_PAGE_SIZE).unwrap();
    let types: Vec<&str> = summary.iter().map(|s| s.ty.as_str()).collect();
    assert_eq!(types, vec!["PAGE_CREATE", "LIST_END_COPY_CREATED"]);
    assert_eq!(summary[1].detail, "20 short inserts");

    let mut page = image;
    ctx.recover(&mut page, &fixture.format).unwrap();
    assert_same_image(&page, &fixture.page);
    assert_page_valid(&page, &fixture.format);
}

#[test]
fn offset_past_the_page_is_reported_as_corruption() {
    let mut page = index_page(DEFAULT_PAGE_SIZE);
    let mut body = vec![LogType::RecDelete.as_u8(), 0, 3];
    body.extend_from_slice(&((DEFAULT_PAGE_SIZE + 1) as u16).to_be_bytes());
    let batch = LogBatch { lsn: 9, body };

    assert_error_contains(
        recover_page(&mut page, &CompactFormat::new(1), &[batch]),
        "corrupt redo log",
    );
    assert_eq!(page.n_recs(), 0);
}
