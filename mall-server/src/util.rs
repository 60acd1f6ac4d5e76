//! Shared utility functions for mall-server

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Six-digit, zero-padded verification code
pub fn generate_code() -> String {
    use rand::Rng;
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Mainland mobile number: `1`, then `3`-`9`, then nine digits
pub fn is_valid_mobile(mobile: &str) -> bool {
    let bytes = mobile.as_bytes();
    bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_digit)
}

/// 5-20 characters of `[A-Za-z0-9_-]`, not purely numeric
pub fn is_valid_username(username: &str) -> bool {
    (5..=20).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        && !username.bytes().all(|b| b.is_ascii_digit())
}

/// 8-20 characters
pub fn is_valid_password(password: &str) -> bool {
    (8..=20).contains(&password.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_mobile_validation() {
        assert!(is_valid_mobile("13800138000"));
        assert!(is_valid_mobile("19912345678"));
        assert!(!is_valid_mobile("12800138000"));
        assert!(!is_valid_mobile("1380013800"));
        assert!(!is_valid_mobile("138001380001"));
        assert!(!is_valid_mobile("1380013800a"));
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("alice_01"));
        assert!(is_valid_username("bob-the-builder"));
        assert!(!is_valid_username("abcd"));
        assert!(!is_valid_username("1234567"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("a".repeat(21).as_str()));
    }

    #[test]
    fn test_password_length() {
        assert!(is_valid_password("12345678"));
        assert!(is_valid_password(&"x".repeat(20)));
        assert!(!is_valid_password("1234567"));
        assert!(!is_valid_password(&"x".repeat(21)));
    }
}
