// Base64 утилиты
//
// JWK и JWS используют base64url без паддинга (RFC 7515 §2).

use base64::{engine::general_purpose, Engine};

pub fn encode_url(data: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(data)
}

pub fn decode_url(data: &str) -> Result<Vec<u8>, String> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|e| format!("Base64url decode failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_alphabet_has_no_padding() {
        let encoded = encode_url(&[0xfb, 0xff]);
        assert_eq!(encoded, "-_8");
        assert_eq!(decode_url(&encoded).unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_padded_input_is_rejected() {
        assert!(decode_url("-_8=").is_err());
    }
}
