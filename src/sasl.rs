//! SASL initial responses.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Builds the XOAUTH2 initial response.
///
/// Wire format before encoding: `user=<user>\x01auth=Bearer <token>\x01\x01`.
#[must_use]
pub fn xoauth2_initial(user: &str, access_token: &str) -> String {
    let raw = format!("user={user}\x01auth=Bearer {access_token}\x01\x01");
    STANDARD.encode(raw.as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn xoauth2_wire_format() {
        let encoded = xoauth2_initial("user@example.com", "abc123");
        let decoded = STANDARD.decode(&encoded).unwrap();
        assert_eq!(
            decoded,
            b"user=user@example.com\x01auth=Bearer abc123\x01\x01"
        );
    }

    #[test]
    fn output_stays_on_one_line() {
        let encoded = xoauth2_initial("user@example.com", &"t".repeat(400));
        assert!(!encoded.contains('\r'));
        assert!(!encoded.contains('\n'));
    }
}
