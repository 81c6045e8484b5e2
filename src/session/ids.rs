//! Identifier, token and channel derivation
//!
//! These formats are shared with existing clients and must not drift:
//! session ids `INT-{unix_millis}-{8 hex}`, 64-char hex tokens, channel names
//! restricted to `[A-Za-z0-9_-]{1,64}`, and a 31-multiplier numeric uid.

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};

const CHANNEL_MAX_LEN: usize = 64;
const UID_MODULUS: i64 = 2_147_483_647;

pub fn session_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("INT-{}-{:08X}", now.timestamp_millis(), suffix)
}

/// 32 random bytes, hex encoded
pub fn access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fresh per-start capture credential
pub fn capture_credential() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn join_link(base_url: &str, session_id: &str, token: &str, candidate_id: &str) -> String {
    format!(
        "{}/interview/{}?token={}&candidate={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(session_id),
        urlencoding::encode(token),
        urlencoding::encode(candidate_id)
    )
}

/// Channel identity derived from the session id
pub fn channel_name(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(CHANNEL_MAX_LEN)
        .collect()
}

/// Stable numeric participant uid for the capture provider.
///
/// `h = h * 31 + unit` over UTF-16 code units with 32-bit wraparound, then
/// `|h| % 2147483647`, with 0 mapped to 1 (0 means "auto-assign" upstream).
pub fn numeric_uid(participant_id: &str) -> u32 {
    let hash = participant_id
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));

    match i64::from(hash).abs() % UID_MODULUS {
        0 => 1,
        uid => uid as u32,
    }
}

pub fn recorder_uid(now: DateTime<Utc>) -> String {
    format!("recorder_{}", now.timestamp_millis())
}

pub fn is_demo_id(session_id: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|p| !p.is_empty() && session_id.starts_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_id_format() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = session_id(now);
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INT");
        assert_eq!(parts[1], "1700000000123");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_tokens_are_64_hex_chars_and_unique() {
        let a = access_token();
        let b = access_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_channel_name_sanitizes_and_truncates() {
        assert_eq!(channel_name("INT-1-ABC"), "INT-1-ABC");
        assert_eq!(channel_name("a b/c.d"), "a_b_c_d");
        assert_eq!(channel_name(&"x".repeat(80)).len(), 64);
    }

    #[test]
    fn test_numeric_uid_matches_31_hash() {
        assert_eq!(numeric_uid("abc"), 96_354);
        assert_eq!(numeric_uid(""), 1);
        assert_eq!(numeric_uid("candidate-42"), numeric_uid("candidate-42"));
    }

    #[test]
    fn test_numeric_uid_wraps_long_input() {
        let uid = numeric_uid(&"interview-participant-".repeat(20));
        assert!(uid >= 1);
        assert!(i64::from(uid) < UID_MODULUS);
    }

    #[test]
    fn test_join_link_layout() {
        let link = join_link("https://app.example/", "INT-1-AB", "tok", "cand 1");
        assert_eq!(
            link,
            "https://app.example/interview/INT-1-AB?token=tok&candidate=cand%201"
        );
    }

    #[test]
    fn test_demo_prefix() {
        let prefixes = vec!["TEST-".to_string()];
        assert!(is_demo_id("TEST-123", &prefixes));
        assert!(!is_demo_id("INT-123", &prefixes));
        assert!(!is_demo_id("INT-123", &[String::new()]));
    }
}
