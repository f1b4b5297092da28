//! Id generation for sessions, shares, suggestions and activities
//!
//! Ids use the format `{kind}-{12 hex chars}`, e.g. `sess-3f9a1c07b2de`.

use rand::distr::{Alphanumeric, SampleString};

/// Generate an opaque record id with a readable kind prefix
pub fn generate_id(kind: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // v7 puts the timestamp first; the tail is random
    format!("{}-{}", kind, &uuid[uuid.len() - 12..])
}

/// Generate an unguessable URL-safe token of the given length
pub fn generate_token(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("sess");
        assert!(id.starts_with("sess-"));
        assert_eq!(id.len(), "sess-".len() + 12);
    }

    #[test]
    fn test_generate_id_unique() {
        let ids: HashSet<String> = (0..500).map(|_| generate_id("sugg")).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token(22);
        assert_eq!(token.len(), 22);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token(22));
    }
}
