//! Security response headers.
//!
//! Stamped on every response that passes the guard. Rejections skip this
//! step like every other late mutation.

use axum::http::header::{
    REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// The fixed header set.
pub fn security_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
        (REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
    ]
}

/// Overwrite the security headers, whatever the upstream sent.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in security_headers() {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_overwrite_upstream_values() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        apply_security_headers(&mut headers);

        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(headers[REFERRER_POLICY], "no-referrer");
        assert_eq!(headers.get_all(X_FRAME_OPTIONS).iter().count(), 1);
    }
}
