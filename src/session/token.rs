use rand::RngCore;

/// Number of random bytes in a session token; hex-encodes to 32 characters.
pub const TOKEN_BYTES: usize = 16;

/// Length of a token string in characters.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// Generate a cryptographically secure session token: 16 random bytes,
/// hex-encoded to a 32-character lowercase string.
///
/// Entropy exhaustion panics inside `thread_rng`; that is a process-fatal
/// condition, not a recoverable error for this subsystem.
pub fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether a string has the exact shape of a generated token.
///
/// Tokens double as file-path components, so anything that is not exactly
/// 32 lowercase hex characters must be rejected before it reaches the
/// filesystem.
pub fn is_token(value: &str) -> bool {
    value.len() == TOKEN_LEN && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_32_lowercase_hex_chars() {
        let token = new_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_tokens_pass_validation() {
        assert!(is_token(&new_token()));
    }

    #[test]
    fn malformed_tokens_fail_validation() {
        assert!(!is_token(""));
        assert!(!is_token("00112233445566778899aabbccddeef")); // 31 chars
        assert!(!is_token("00112233445566778899aabbccddeeff0")); // 33 chars
        assert!(!is_token("00112233445566778899AABBCCDDEEFF")); // uppercase
        assert!(!is_token("00112233445566778899aabbccddeefg")); // non-hex
        assert!(!is_token("001/../../../../etc/passwd/aabb0"));
        assert!(!is_token("../0112233445566778899aabbccddee"));
    }
}
