//! Session identity.

use uuid::Uuid;

/// Generate a fresh session identifier.
///
/// Hyphen-less UUIDv4 so it is safe inside file names and log prefixes.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// First eight characters of a session id, for operational log prefixes.
#[must_use]
pub fn short_id(session_id: &str) -> &str {
    &session_id[..session_id.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_filename_safe() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn short_id_truncates() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
