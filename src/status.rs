//! Status-code classes the response finalizer cares about.
//!
//! ```rust
//! use http::StatusCode;
//! use strata::status;
//!
//! assert!(status::is_empty(StatusCode::NO_CONTENT));
//! assert!(status::is_empty(StatusCode::CONTINUE));
//! assert!(!status::is_empty(StatusCode::OK));
//! ```

use http::StatusCode;

/// Statuses that must never carry body bytes: 1xx, 204, 205 and 304.
pub fn is_empty(code: StatusCode) -> bool {
    code.is_informational()
        || matches!(
            code,
            StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED
        )
}

/// The canonical reason phrase, `None` for unregistered codes.
pub fn message(code: StatusCode) -> Option<&'static str> {
    code.canonical_reason()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_class_covers_informational_and_bodyless_codes() {
        for code in 100..200 {
            let code = StatusCode::from_u16(code).unwrap();
            assert!(is_empty(code), "{code} should be bodyless");
        }
        assert!(is_empty(StatusCode::NO_CONTENT));
        assert!(is_empty(StatusCode::RESET_CONTENT));
        assert!(is_empty(StatusCode::NOT_MODIFIED));
    }

    #[test]
    fn regular_codes_carry_bodies() {
        for code in [200, 201, 206, 301, 400, 404, 500, 599] {
            assert!(!is_empty(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[test]
    fn unknown_codes_have_no_message() {
        assert_eq!(message(StatusCode::NOT_FOUND), Some("Not Found"));
        assert_eq!(message(StatusCode::from_u16(599).unwrap()), None);
    }
}
