//! Unpadded URL-safe base64, the only encoding a compact JWS uses.

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};

/// Encode arbitrary bytes without padding.
pub fn encode<T: AsRef<[u8]>>(input: T) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(input)
}

/// Decode an unpadded base64url string.
///
/// Stray characters, `=` padding and residue-1 lengths are rejected by the
/// engine; callers map the error into their own failure context.
pub fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(input)
}
