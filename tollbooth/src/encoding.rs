//! Base64 helpers for header transport.
//!
//! Payment headers travel as standard (padded) base64 text. These helpers
//! pin the engine choice in one place so every layer agrees on the alphabet.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;

/// Encodes raw bytes as standard base64 text.
pub fn encode<T: AsRef<[u8]>>(input: T) -> String {
    b64.encode(input.as_ref())
}

/// Decodes standard base64 text back to raw bytes.
///
/// # Errors
///
/// Returns an error if the input is not valid base64.
pub fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    b64.decode(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let data = b"tollbooth".to_vec();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(decode("not!!base64").is_err());
    }
}
