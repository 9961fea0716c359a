use ring::{
    pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use std::num::NonZeroU32;
use tracing::warn;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

const ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Hashes a password as `hex(salt):hex(derived_key)`.
///
/// A fresh random salt is drawn for every call, so hashing the same password
/// twice never yields the same string.
pub fn hash_password(password: &str) -> Result<String, ring::error::Unspecified> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new().fill(&mut salt)?;

    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(ALGORITHM, ITERATIONS, &salt, password.as_bytes(), &mut key);

    Ok(format!("{}:{}", hex::encode(salt), hex::encode(key)))
}

/// Checks `candidate` against a stored `salt:key` record.
///
/// Malformed records (no separator, bad hex, wrong key length) never match.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    let Some((salt_hex, key_hex)) = stored.split_once(':') else {
        warn!("Stored password hash has no salt separator");
        return false;
    };

    let (salt, key) = match (hex::decode(salt_hex), hex::decode(key_hex)) {
        (Ok(salt), Ok(key)) => (salt, key),
        _ => {
            warn!("Stored password hash is not valid hex");
            return false;
        }
    };

    if salt.is_empty() || key.len() != KEY_LEN {
        warn!(salt_len = salt.len(), key_len = key.len(), "Stored password hash has unexpected lengths");
        return false;
    }

    // constant-time comparison
    pbkdf2::verify(ALGORITHM, ITERATIONS, &salt, candidate.as_bytes(), &key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    #[test]
    fn hash_has_salt_and_key_segments() {
        let hashed = hash_password("admin").unwrap();
        let (salt, key) = hashed.split_once(':').unwrap();

        assert_eq!(salt.len(), 32);
        assert_eq!(key.len(), 64);
        assert!(is_lower_hex(salt));
        assert!(is_lower_hex(key));
    }

    #[test]
    fn verifies_matching_password_only() {
        let hashed = hash_password("admin").unwrap();

        assert!(verify_password(&hashed, "admin"));
        assert!(!verify_password(&hashed, "Admin"));
        assert!(!verify_password(&hashed, ""));
        assert!(!verify_password(&hashed, "admin "));
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("Murray11").unwrap();
        let second = hash_password("Murray11").unwrap();

        assert_ne!(first, second);
        assert!(verify_password(&first, "Murray11"));
        assert!(verify_password(&second, "Murray11"));
    }

    #[test]
    fn empty_password_round_trips() {
        let hashed = hash_password("").unwrap();
        assert!(verify_password(&hashed, ""));
        assert!(!verify_password(&hashed, " "));
    }

    #[test]
    fn malformed_records_fail_closed() {
        let valid = hash_password("secret").unwrap();
        let (salt, key) = valid.split_once(':').unwrap();

        let cases = [
            String::new(),
            "no-separator-here".to_string(),
            format!("{salt}{key}"),
            format!("zz{}:{key}", &salt[2..]),
            format!("{salt}:{}xyz", &key[..61]),
            format!(":{key}"),
            format!("{salt}:"),
            format!("{salt}:{}", &key[..32]),
        ];

        for stored in cases {
            assert!(!verify_password(&stored, "secret"), "accepted {stored:?}");
        }
    }

    #[test]
    fn splits_on_first_separator() {
        let valid = hash_password("secret").unwrap();
        let tampered = format!("{valid}:extra");
        assert!(!verify_password(&tampered, "secret"));
    }
}
