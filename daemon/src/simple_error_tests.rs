#[cfg(test)]
mod tests {
    use crate::{DaemonError, Result};
    use callsheet_cache::CacheError;
    use callsheet_core::CoreError;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_daemon_error_display() {
        let err = DaemonError::ServerError("bind failed".to_string());
        assert_eq!(err.to_string(), "Server error: bind failed");

        let err = DaemonError::ConnectionError("frame too large".to_string());
        assert_eq!(err.to_string(), "Connection error: frame too large");

        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        let err = DaemonError::IoError(io_err);
        assert!(err.to_string().contains("address in use"));

        let serde_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err = DaemonError::SerializationError(serde_err);
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_wrapped_errors_keep_their_message() {
        let err: DaemonError = CoreError::ValidationError("push.bind: bad".to_string()).into();
        assert_eq!(err.to_string(), "Validation error: push.bind: bad");
        assert_eq!(err.code(), "DAEMON006");

        let err: DaemonError = CacheError::InvalidInput("no home".to_string()).into();
        assert_eq!(err.code(), "DAEMON007");
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            DaemonError::ServerError(String::new()).code(),
            DaemonError::ConnectionError(String::new()).code(),
            DaemonError::IoError(io::Error::other("x")).code(),
            DaemonError::Notification(String::new()).code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<u32> {
            Ok(42)
        }

        fn returns_err() -> Result<u32> {
            Err(DaemonError::Notification("no session bus".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_io_error_is_exposed_as_source() {
        let err: DaemonError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(err.source().is_some());
        assert!(DaemonError::ServerError("x".into()).source().is_none());
    }
}
