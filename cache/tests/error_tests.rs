use callsheet_cache::error::CacheError;

#[test]
fn test_error_codes() {
    assert_eq!(CacheError::Database("test".into()).code(), "CACHE001");
    assert_eq!(CacheError::Serialization("test".into()).code(), "CACHE002");
    assert_eq!(CacheError::Io("test".into()).code(), "CACHE003");
    assert_eq!(CacheError::InvalidInput("test".into()).code(), "CACHE004");
    assert_eq!(
        CacheError::Version {
            found: 2,
            expected: 1
        }
        .code(),
        "CACHE005"
    );
    assert_eq!(CacheError::Unavailable("test".into()).code(), "CACHE006");
}

#[test]
fn test_error_display() {
    let err = CacheError::Database("connection failed".into());
    assert!(err.to_string().contains("connection failed"));
    assert!(err.to_string().contains("Database"));

    let err = CacheError::Version {
        found: 3,
        expected: 1,
    };
    assert_eq!(err.to_string(), "Unsupported cache version 3 (expected 1)");
}

#[test]
fn test_error_from_rusqlite() {
    let cache_err = CacheError::from(rusqlite::Error::InvalidQuery);
    assert!(matches!(cache_err, CacheError::Database(_)));
    assert_eq!(cache_err.code(), "CACHE001");
}

#[test]
fn test_error_from_serde_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
    let cache_err = CacheError::from(json_err);
    assert!(matches!(cache_err, CacheError::Serialization(_)));
}

#[test]
fn test_error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let cache_err = CacheError::from(io_err);
    assert!(matches!(cache_err, CacheError::Io(_)));
    assert!(cache_err.to_string().contains("gone"));
}
