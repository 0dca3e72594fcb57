use super::*;

#[test]
fn config_defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.page_size, 16384);
    assert!(cfg.adaptive_search);
    assert_eq!(cfg.extension, ExtensionPolicy::Strict);
    assert!(cfg.validate().is_ok());
}

#[test]
fn builder_matches_default() {
    let built = Config::builder().build();
    assert_eq!(built.page_size, Config::default().page_size);
    assert_eq!(built.adaptive_search, Config::default().adaptive_search);
}

#[test]
fn rejects_odd_page_sizes() {
    for size in [0, 1000, 2048, 12288, 65536] {
        let cfg = Config::builder().page_size(size).build();
        assert!(matches!(cfg.validate(), Err(DbError::Config(_))), "{size}");
    }
    for size in [4096, 8192, 16384, 32768] {
        assert!(validate_page_size(size).is_ok());
    }
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::CorruptLog("offset 16385".into());
    assert!(format!("{err}").contains("corrupt redo log"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}
