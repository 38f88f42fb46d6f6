//! Plaintext key generation and bcrypt hashing.
//!
//! Keys look like `ck_` followed by 64 lowercase hex characters (32 random bytes).
//! bcrypt only reads the first 72 bytes of its input, so candidates are checked
//! against the exact key shape before they ever reach `verify`.

use rand::rngs::OsRng;
use rand::RngCore;

pub const KEY_PREFIX: &str = "ck_";

const KEY_RANDOM_BYTES: usize = 32;

/// Characters of a candidate that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", KEY_PREFIX, hex)
}

pub fn is_well_formed(candidate: &str) -> bool {
    candidate
        .strip_prefix(KEY_PREFIX)
        .is_some_and(|rest| {
            rest.len() == KEY_RANDOM_BYTES * 2
                && rest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}

pub fn hash_key(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Index of the first hash that `candidate` verifies against. A malformed stored hash
/// counts as a mismatch.
pub fn find_match<'a, I>(candidate: &str, hashes: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    hashes
        .into_iter()
        .position(|hash| bcrypt::verify(candidate, hash).unwrap_or(false))
}

/// A log-safe rendering of a candidate key: at most the first few characters.
pub fn safe_prefix(candidate: &str) -> String {
    let prefix: String = candidate.chars().take(LOG_PREFIX_LEN).collect();
    format!("{}...", prefix)
}
