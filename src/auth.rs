//! Constant-time secret comparison (distilled spec §6: "All token
//! comparisons must be constant-time over the UTF-8 byte encoding").
//! Sourced from the wider example pack's `subtle` usage rather than the
//! teacher crate, which trusts `diesel`/HS tokens transitively through
//! TLS termination and has no such primitive — see DESIGN.md.

use subtle::ConstantTimeEq;

/// True iff `presented` matches `expected`, compared in constant time
/// over their UTF-8 bytes. `ct_eq` itself reports a constant-time `0`
/// when the two slices differ in length, so no separate length check
/// is needed up front.
pub fn constant_time_eq(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Extracts the bearer token from an `Authorization` header value and
/// compares it against `expected` in constant time.
pub fn check_bearer(header: Option<&str>, expected: &str) -> bool {
    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => constant_time_eq(token, expected),
        None => false,
    }
}

/// Compares an `X-Bridge-Secret` header value against `expected`.
pub fn check_bridge_secret(header: Option<&str>, expected: &str) -> bool {
    match header {
        Some(secret) => constant_time_eq(secret, expected),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_bearer() {
        assert!(check_bearer(Some("Bearer abc123"), "abc123"));
    }

    #[test]
    fn rejects_mismatched_bearer() {
        assert!(!check_bearer(Some("Bearer abc124"), "abc123"));
    }

    #[test]
    fn rejects_missing_bearer_prefix() {
        assert!(!check_bearer(Some("abc123"), "abc123"));
    }

    #[test]
    fn rejects_absent_header() {
        assert!(!check_bearer(None, "abc123"));
        assert!(!check_bridge_secret(None, "shh"));
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(!constant_time_eq("short", "much longer string"));
    }
}
