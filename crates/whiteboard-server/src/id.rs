//! Identifier minting.
//!
//! Sessions, elements, and subscribers all use short lowercase-alphanumeric
//! tokens. Session tokens carry ~36 bits of entropy; sessions are
//! unauthenticated shared spaces and the tokens are links, not secrets.

use rand::Rng;

use crate::config::policy;

const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect()
}

/// Mint a session token.
#[must_use]
pub fn session_token() -> String {
    token(policy::SESSION_TOKEN_LEN)
}

/// Mint an element identifier.
#[must_use]
pub fn element_id() -> String {
    token(policy::ELEMENT_ID_LEN)
}

/// Mint a subscriber user identifier.
#[must_use]
pub fn user_id() -> String {
    token(policy::USER_ID_LEN)
}
