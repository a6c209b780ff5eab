//! Small helpers shared across the crate, mainly the base64 flavor every
//! scalar's textual form is built on.

use crate::error::{Error, Result};

#[cfg(test)]
pub(crate) mod test;

/// Convert bytes to URL-safe unpadded base64. This is the one and only
/// binary-to-text encoding used in the canonical notation.
pub fn base64_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    base64::encode_config(bytes.as_ref(), base64::URL_SAFE_NO_PAD)
}

/// The inverse of [`base64_encode`].
pub fn base64_decode<T: AsRef<[u8]>>(encoded: T) -> Result<Vec<u8>> {
    base64::decode_config(encoded.as_ref(), base64::URL_SAFE_NO_PAD)
        .map_err(|e| Error::unexpected("util", "base64Decode", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_encode_decode() {
        let bytes = vec![0u8, 1, 2, 3, 252, 253, 254, 255];
        let encoded = base64_encode(&bytes);
        // no padding, no url-unsafe characters
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn base64_decode_garbage() {
        let res = base64_decode("not!!!base64???");
        assert!(res.is_err());
    }
}
