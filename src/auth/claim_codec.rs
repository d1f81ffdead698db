use crate::error::app_error::AppError;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Reversible keyed encoding of numeric identifiers carried in token claims.
///
/// Output is URL-safe base64 (no padding) of `nonce || ciphertext`, sealed with
/// AES-256-GCM under the SHA-256 digest of the configured secret. The key is
/// fixed when the codec is built.
#[derive(Clone)]
pub struct ClaimCodec {
    key: [u8; 32],
}

impl ClaimCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    pub fn encode(&self, id: i64) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new((&self.key).into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher.encrypt(&nonce, id.to_string().as_bytes()).map_err(|e| AppError::Encryption {
            message: format!("Failed to encrypt claim: {}", e),
        })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Plain integers are accepted as-is so tokens minted before claim
    /// encryption keep working. Sealed values are always longer than any
    /// `i64` rendering, so the two forms never collide.
    pub fn decode(&self, value: &str) -> Result<i64, AppError> {
        if value.is_empty() {
            return Err(AppError::InvalidClaim);
        }
        if let Ok(id) = value.parse::<i64>() {
            return Ok(id);
        }

        let sealed = URL_SAFE_NO_PAD.decode(value).map_err(|_| AppError::InvalidClaim)?;
        if sealed.len() <= NONCE_LEN {
            return Err(AppError::InvalidClaim);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new((&self.key).into());
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(|_| AppError::InvalidClaim)?;

        String::from_utf8(plaintext)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or(AppError::InvalidClaim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encoded_claims_are_url_safe_and_opaque() {
        let codec = ClaimCodec::new("secret");
        let encoded = codec.encode(42).unwrap();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_ne!(encoded, "42");
        assert_eq!(codec.decode(&encoded).unwrap(), 42);
    }

    #[test]
    fn same_id_encodes_differently_each_time() {
        let codec = ClaimCodec::new("secret");
        assert_ne!(codec.encode(7).unwrap(), codec.encode(7).unwrap());
    }

    #[test]
    fn plain_integers_decode_for_legacy_tokens() {
        let codec = ClaimCodec::new("secret");
        assert_eq!(codec.decode("1234").unwrap(), 1234);
    }

    #[test]
    fn empty_or_garbage_input_is_rejected() {
        let codec = ClaimCodec::new("secret");
        assert!(matches!(codec.decode(""), Err(AppError::InvalidClaim)));
        assert!(matches!(codec.decode("not base64!"), Err(AppError::InvalidClaim)));
        assert!(matches!(codec.decode("c2hvcnQ"), Err(AppError::InvalidClaim)));
    }

    #[test]
    fn values_sealed_under_another_key_are_rejected() {
        let encoded = ClaimCodec::new("one").encode(99).unwrap();
        assert!(matches!(ClaimCodec::new("two").decode(&encoded), Err(AppError::InvalidClaim)));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let codec = ClaimCodec::new("secret");
        let mut sealed = URL_SAFE_NO_PAD.decode(codec.encode(5).unwrap()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(codec.decode(&URL_SAFE_NO_PAD.encode(sealed)), Err(AppError::InvalidClaim)));
    }

    proptest! {
        #[test]
        fn positive_ids_round_trip(id in 1i64..=i64::MAX) {
            let codec = ClaimCodec::new("property-secret");
            let encoded = codec.encode(id).unwrap();
            prop_assert_eq!(codec.decode(&encoded).unwrap(), id);
        }
    }
}
