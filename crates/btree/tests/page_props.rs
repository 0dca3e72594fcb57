//! Property tests for cursor operations on a single page.

use btree::{
    PageCursor, SearchKey, SearchMode, TupleComparator, copy_rec_list_end_to_created_page,
    parse_or_apply_body,
};
use proptest::prelude::*;
use proptest::sample::Index;
use storage::{CompactFormat, Page, RecordView};
use testsupport::prelude::*;
use testsupport::proptest_generators::{PageOp, arb_int_key, arb_page_ops, arb_page_size, arb_text_key};
use wal::{Mtr, NoLog, RecoveryContext};

const ALL_MODES: [SearchMode; 4] = [
    SearchMode::Less,
    SearchMode::LessOrEqual,
    SearchMode::Greater,
    SearchMode::GreaterOrEqual,
];

fn slot_ownership(page: &Page) -> Vec<usize> {
    (0..page.n_slots()).map(|slot| page.slot_n_owned(slot)).collect()
}

fn replay_onto(page: &mut Page, body: &[u8], view: &dyn RecordView) {
    let mut ctx = RecoveryContext::new();
    let page_size = page.size();
    parse_or_apply_body(body, page_size, Some((page, view)), &mut ctx).unwrap();
}

/// Apply `ops` to the fixture and a sorted model side by side.
fn run_ops(fixture: &mut PageFixture, ops: &[PageOp], mtr: &mut Mtr) -> Vec<i64> {
    let mut model: Vec<i64> = Vec::new();
    for op in ops {
        match *op {
            PageOp::Insert(v) => {
                fixture.insert(v, mtr).expect("page has room");
                let pos = model.partition_point(|&k| k <= v);
                model.insert(pos, v);
            }
            PageOp::Delete(i) if !model.is_empty() => {
                let v = model.remove(i % model.len());
                assert!(fixture.delete(v, mtr));
            }
            PageOp::Delete(_) => {}
        }
    }
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_random_workload_keeps_the_page_consistent(ops in arb_page_ops(300)) {
        let mut fixture = PageFixture::new();
        let model = run_ops(&mut fixture, &ops, &mut Mtr::new());

        prop_assert_eq!(fixture.keys(), model.clone());
        prop_assert_eq!(fixture.page.n_recs(), model.len());
        assert_page_valid(&fixture.page, &fixture.format);
        assert_directory_bounds(&fixture.page);
    }

    #[test]
    fn prop_search_agrees_with_a_linear_scan(
        keys in prop::collection::vec(arb_int_key(), 0..150),
        needle in arb_int_key(),
    ) {
        let mut fixture = PageFixture::new();
        for &v in &keys {
            fixture.insert(v, &mut NoLog).unwrap();
        }
        for mode in ALL_MODES {
            let expected = linear_search(
                &fixture.page,
                &fixture.format,
                &TupleComparator,
                &int_key(needle),
                mode,
            );
            prop_assert_eq!(fixture.search(needle, mode).0, expected, "{:?}", mode);
        }
    }

    #[test]
    fn prop_matched_prefix_hints_do_not_change_results(
        keys in prop::collection::vec(arb_int_key(), 0..150),
        needle in arb_int_key(),
    ) {
        let mut fixture = PageFixture::new();
        for &v in &keys {
            fixture.insert(v, &mut NoLog).unwrap();
        }
        let config = Config::default();
        let key = int_key(needle);
        for mode in ALL_MODES {
            let (with_hints, _) = PageCursor::search(
                &mut fixture.page, &fixture.format, &TupleComparator, &key, mode, &config,
            );
            let with_hints = with_hints.rec();
            let (without, _) = PageCursor::search(
                &mut fixture.page, &fixture.format, &ForgetfulComparator, &key, mode, &config,
            );
            prop_assert_eq!(with_hints, without.rec());
        }
    }

    #[test]
    fn prop_extension_search_agrees_with_a_linear_scan(
        keys in prop::collection::vec(arb_text_key(), 0..60),
        needle in arb_text_key(),
    ) {
        let format = CompactFormat::new(1);
        let config = Config::builder().extension(ExtensionPolicy::LessOrExtends).build();
        let mut page = index_page(16384);
        for k in &keys {
            let key = SearchKey::from_values(&[Value::Text(k.clone())]);
            let (mut cursor, _) = PageCursor::search(
                &mut page, &format, &TupleComparator, &key, SearchMode::LessOrEqual, &config,
            );
            cursor.insert_tuple(&format, &[Value::Text(k.clone())], &mut NoLog).unwrap().unwrap();
        }

        let key = SearchKey::from_values(&[Value::Text(needle)]);
        let expected = linear_search(&page, &format, &TupleComparator, &key, SearchMode::LessOrExtends);
        let (cursor, _) = PageCursor::search(
            &mut page, &format, &TupleComparator, &key, SearchMode::LessOrExtends, &config,
        );
        prop_assert_eq!(cursor.rec(), expected);
    }

    #[test]
    fn prop_logged_workload_replays_to_the_same_image(ops in arb_page_ops(200)) {
        let mut fixture = PageFixture::new();
        let mut mtr = Mtr::new();
        run_ops(&mut fixture, &ops, &mut mtr);

        let mut replayed = fixture.fresh_page();
        replay_onto(&mut replayed, mtr.body(), &fixture.format);
        assert_same_image(&replayed, &fixture.page);
    }

    #[test]
    fn prop_delete_undoes_insert(
        keys in prop::collection::vec(arb_int_key(), 0..100),
        extra in arb_int_key(),
    ) {
        let mut fixture = PageFixture::new();
        for &v in &keys {
            fixture.insert(v, &mut NoLog).unwrap();
        }
        let before = fixture.keys();
        let owned = slot_ownership(&fixture.page);
        let n_recs = fixture.page.n_recs();
        let garbage = fixture.page.garbage();
        prop_assert_eq!(fixture.page.free_recs().count(), 0);

        let rec = fixture.insert(extra, &mut NoLog).unwrap();
        let split = fixture.page.n_slots() > owned.len();
        let size = fixture.format.offsets(fixture.page.as_bytes(), rec).total_size();
        PageCursor::at(&mut fixture.page, rec).delete(&fixture.format, &mut NoLog);

        prop_assert_eq!(fixture.keys(), before);
        prop_assert_eq!(fixture.page.n_recs(), n_recs);
        prop_assert_eq!(fixture.page.garbage(), garbage + size);
        prop_assert_eq!(fixture.page.free_recs().collect::<Vec<_>>(), vec![rec]);
        if !split {
            prop_assert_eq!(slot_ownership(&fixture.page), owned);
        }
        assert_page_valid(&fixture.page, &fixture.format);
        assert_directory_bounds(&fixture.page);
    }

    #[test]
    fn prop_bulk_copy_matches_its_replay(n in 0usize..120, start in any::<Index>()) {
        let mut src = PageFixture::new();
        for v in 0..n as i64 {
            src.insert(v, &mut NoLog).unwrap();
        }
        let recs: Vec<usize> = src.page.user_recs().collect();
        let from = if recs.is_empty() { src.page.infimum() } else { recs[start.index(recs.len())] };
        let skipped = recs.iter().position(|&r| r == from).unwrap_or(0);

        let mut dst = src.fresh_page();
        let mut mtr = Mtr::new();
        copy_rec_list_end_to_created_page(&mut dst, &src.page, from, &src.format, &mut mtr).unwrap();
        prop_assert_eq!(int_keys_of(&dst), (skipped as i64..n as i64).collect::<Vec<_>>());
        assert_page_valid(&dst, &src.format);
        assert_directory_bounds(&dst);

        let mut replayed = src.fresh_page();
        replay_onto(&mut replayed, mtr.body(), &src.format);
        assert_same_image(&replayed, &dst);
    }

    #[test]
    fn prop_filling_any_page_size_stays_valid(size in arb_page_size()) {
        let mut fixture = PageFixture::with_page_size(size);
        let mut n = 0;
        while fixture.insert(n, &mut NoLog).is_some() {
            n += 1;
        }
        prop_assert!(n > 0);
        prop_assert_eq!(fixture.page.n_recs(), n as usize);
        // A 14 byte record plus one directory slot no longer fits.
        prop_assert!(fixture.page.free_space() < 16);
        assert_page_valid(&fixture.page, &fixture.format);
        assert_directory_bounds(&fixture.page);
    }
}

#[test]
fn eighth_record_splits_the_supremum_slot() {
    let mut fixture = PageFixture::new();
    for v in 1..=7 {
        fixture.insert(v, &mut NoLog).unwrap();
    }
    assert_eq!(fixture.page.n_slots(), 2);
    assert_eq!(fixture.page.slot_n_owned(1), 8);

    fixture.insert(8, &mut NoLog).unwrap();
    assert_eq!(fixture.page.n_slots(), 3);
    assert_eq!(fixture.page.slot_n_owned(1), 4);
    assert_eq!(fixture.page.slot_n_owned(2), 5);
    assert_directory_bounds(&fixture.page);
}

#[test]
fn deleting_after_a_split_borrows_from_the_upper_slot() {
    let mut fixture = PageFixture::new();
    for v in (10..=70).step_by(10) {
        fixture.insert(v, &mut NoLog).unwrap();
    }
    assert_eq!(slot_ownership(&fixture.page), vec![1, 8]);

    fixture.insert(5, &mut NoLog).unwrap();
    assert_eq!(slot_ownership(&fixture.page), vec![1, 4, 5]);

    // The lower slot drops to three and takes one record from its neighbour
    // instead of the split being undone.
    assert!(fixture.delete(5, &mut NoLog));
    assert_eq!(slot_ownership(&fixture.page), vec![1, 4, 4]);
    assert_eq!(fixture.page.n_recs(), 7);
    assert_eq!(fixture.keys(), vec![10, 20, 30, 40, 50, 60, 70]);
    assert_directory_bounds(&fixture.page);
}

#[test]
fn scenario_from_unordered_inserts() {
    init_logging();
    let mut fixture = PageFixture::new();
    let mut mtr = Mtr::new();
    for v in [10, 5, 20, 15] {
        fixture.insert(v, &mut mtr).unwrap();
    }
    assert_eq!(fixture.keys(), vec![5, 10, 15, 20]);

    let (rec, _) = fixture.search(12, SearchMode::LessOrEqual);
    let heap_no = fixture.page.rec_heap_no(rec);
    assert_eq!(heap_no, 2, "record 10 was inserted first");

    let (rec, _) = fixture.search(12, SearchMode::GreaterOrEqual);
    assert_eq!(fixture.page.rec_heap_no(rec), 5, "record 15 was inserted last");
    let (rec, _) = fixture.search(5, SearchMode::Less);
    assert_eq!(rec, fixture.page.infimum());
    let (rec, _) = fixture.search(20, SearchMode::Greater);
    assert_eq!(rec, fixture.page.supremum());

    let mut replayed = fixture.fresh_page();
    replay_onto(&mut replayed, mtr.body(), &fixture.format);
    assert_same_image(&replayed, &fixture.page);
}
