//! Opaque bearer tokens: 64 bytes of OS entropy, base64-encoded, with a
//! fixed 30-day absolute expiry (SPEC_FULL.md §"Open Questions").

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

pub const TOKEN_LIFETIME_DAYS: i64 = 30;

pub fn generate_token() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn expiry_from_now() -> DateTime<Utc> {
    Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
