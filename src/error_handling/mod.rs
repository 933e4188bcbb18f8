//! Error handling and retry classification.
//!
//! This module provides:
//! - Error type definitions for every stage of an update run
//! - Permanent vs transient classification used by the retry loop
//! - Retry strategy configuration
//!
//! Errors are categorized into:
//! - **Transient**: network failures, 5xx, corrupt or truncated payloads (retried)
//! - **Permanent**: 4xx, local I/O, configuration, lock contention (not retried)
//! - **Cancellation**: a sibling job failed and the run is unwinding

mod categorization;
mod types;

// Re-export public API
pub use categorization::{get_retry_strategy, RetryBudget};
pub use types::{
    ConfigError, ErrorCategory, HttpError, InitializationError, LockError, UpdateError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use strum::IntoEnumIterator;

    #[test]
    fn test_http_error_classification() {
        for status in [400, 401, 403, 404, 429, 499] {
            let err = UpdateError::from(HttpError::new(status, b""));
            assert!(err.is_permanent(), "{} should be permanent", status);
            assert_eq!(err.category(), ErrorCategory::TransportPermanent);
        }
        for status in [301, 500, 502, 503, 504] {
            let err = UpdateError::from(HttpError::new(status, b""));
            assert!(!err.is_permanent(), "{} should be retried", status);
        }
    }

    #[test]
    fn test_http_error_body_is_bounded() {
        let body = vec![b'x'; 1024];
        let err = HttpError::new(500, &body);
        assert_eq!(err.body.len(), 256);
    }

    #[test]
    fn test_http_error_message_mentions_status() {
        let err = UpdateError::from(HttpError::new(401, br#"{"error":"auth"}"#));
        let msg = err.to_string();
        assert!(msg.contains("401"), "got: {}", msg);
        assert!(msg.contains(r#"{"error":"auth"}"#), "got: {}", msg);
    }

    #[test]
    fn test_payload_errors_are_transient() {
        let transient = [
            UpdateError::HashMismatch {
                expected: "a".into(),
                actual: "b".into(),
            },
            UpdateError::NoDatabaseInArchive,
            UpdateError::Archive(io::Error::from(io::ErrorKind::UnexpectedEof)),
            UpdateError::LastModified("missing".into()),
        ];
        for err in transient {
            assert!(!err.is_permanent(), "{} should be retried", err);
        }
    }

    #[test]
    fn test_local_and_lock_errors_are_permanent() {
        let io_err = UpdateError::local_io("renaming", io::Error::other("disk full"));
        assert_eq!(io_err.category(), ErrorCategory::LocalIo);
        assert!(io_err.is_permanent());

        let busy = UpdateError::from(LockError::Busy(PathBuf::from("/tmp/x.lock")));
        assert_eq!(busy.category(), ErrorCategory::Contention);
        assert!(busy.is_permanent());

        assert!(UpdateError::Cancelled.is_permanent());
    }

    #[test]
    fn test_edition_tag_preserves_classification() {
        let err = UpdateError::from(HttpError::new(404, b"not found")).for_edition("GeoIP2-City");
        assert!(err.is_permanent());
        assert_eq!(err.http_error().map(|e| e.status), Some(404));
        assert!(err.to_string().starts_with("GeoIP2-City: "));

        let retagged = err.for_edition("other");
        assert!(retagged.to_string().starts_with("GeoIP2-City: "));
    }

    #[test]
    fn test_cancellation_is_never_tagged() {
        let err = UpdateError::Cancelled.for_edition("GeoIP2-City");
        assert!(matches!(err, UpdateError::Cancelled));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_every_category_has_a_name() {
        for category in ErrorCategory::iter() {
            let name: &'static str = category.into();
            assert!(!name.is_empty());
            assert_eq!(category.to_string(), name);
        }
        assert_eq!(ErrorCategory::LocalIo.to_string(), "local-io");
    }
}
