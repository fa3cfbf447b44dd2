//! Opaque token generation for sessions and password resets.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a fresh opaque bearer token.
///
/// 32 bytes from the OS CSPRNG, base64url-encoded without padding. The token
/// encodes nothing about the user it is issued to; the store is the only
/// link between token and identity.
pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_url_safe() {
        let token = new_token();
        // base64url characters only (A-Z a-z 0-9 - _), no padding.
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 32 bytes → 43 base64url chars.
        assert_eq!(token.len(), 43);
    }

    #[test]
    fn tokens_are_unique() {
        let t1 = new_token();
        let t2 = new_token();
        assert_ne!(t1, t2);
    }
}
