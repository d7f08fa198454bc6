/// Token and password primitives
pub mod password;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Size of session ids, CSRF, card and reset tokens in bytes
pub const TOKEN_BYTES: usize = 32;

/// Generate a random token from the OS CSPRNG, hex-encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a token, hex-encoded. Stored instead of the token itself.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check so malformed input never reaches the database
pub fn is_token_shaped(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Compare two strings without short-circuiting on the first difference
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
