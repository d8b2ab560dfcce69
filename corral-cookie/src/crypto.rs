//! Token encryption: AES-CFB with a random IV, base64url on the wire.

use aes::{Aes128, Aes192, Aes256};
use base64::{Engine, engine::general_purpose::URL_SAFE};
use cfb_mode::{
    Decryptor, Encryptor,
    cipher::{AsyncStreamCipher, KeyIvInit},
};
use corral::{CacheError, CacheResult};
use rand::RngCore;

/// IV length equals the AES block size.
const IV_SIZE: usize = 16;

/// Symmetric key derived from an arbitrary secret by truncating to the
/// largest AES key length that fits: 32, 24, or 16 bytes.
#[derive(Clone)]
pub(crate) enum CipherKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl CipherKey {
    pub(crate) fn from_secret(secret: &[u8]) -> CacheResult<Self> {
        if secret.len() >= 32 {
            let mut key = [0u8; 32];
            key.copy_from_slice(&secret[..32]);
            Ok(CipherKey::Aes256(key))
        } else if secret.len() >= 24 {
            let mut key = [0u8; 24];
            key.copy_from_slice(&secret[..24]);
            Ok(CipherKey::Aes192(key))
        } else if secret.len() >= 16 {
            let mut key = [0u8; 16];
            key.copy_from_slice(&secret[..16]);
            Ok(CipherKey::Aes128(key))
        } else {
            Err(CacheError::internal(
                "secret too short: at least 16 bytes are required for an AES key",
            ))
        }
    }

    /// Produce `base64url( IV ‖ CFB-ciphertext(data) )` with a fresh
    /// random IV.
    pub(crate) fn encrypt(&self, data: &[u8]) -> String {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buf = data.to_vec();
        match self {
            CipherKey::Aes128(key) => {
                Encryptor::<Aes128>::new(key.into(), (&iv).into()).encrypt(&mut buf)
            }
            CipherKey::Aes192(key) => {
                Encryptor::<Aes192>::new(key.into(), (&iv).into()).encrypt(&mut buf)
            }
            CipherKey::Aes256(key) => {
                Encryptor::<Aes256>::new(key.into(), (&iv).into()).encrypt(&mut buf)
            }
        }

        let mut token = Vec::with_capacity(IV_SIZE + buf.len());
        token.extend_from_slice(&iv);
        token.extend_from_slice(&buf);
        URL_SAFE.encode(token)
    }

    /// Invert [`encrypt`]. Returns `None` on any decoding failure; the
    /// caller folds that into its miss path.
    ///
    /// [`encrypt`]: CipherKey::encrypt
    pub(crate) fn decrypt(&self, token: &str) -> Option<Vec<u8>> {
        let raw = URL_SAFE.decode(token).ok()?;
        if raw.len() < IV_SIZE {
            return None;
        }
        let (iv, data) = raw.split_at(IV_SIZE);
        let iv: &[u8; IV_SIZE] = iv.try_into().ok()?;

        let mut buf = data.to_vec();
        match self {
            CipherKey::Aes128(key) => {
                Decryptor::<Aes128>::new(key.into(), iv.into()).decrypt(&mut buf)
            }
            CipherKey::Aes192(key) => {
                Decryptor::<Aes192>::new(key.into(), iv.into()).decrypt(&mut buf)
            }
            CipherKey::Aes256(key) => {
                Decryptor::<Aes256>::new(key.into(), iv.into()).decrypt(&mut buf)
            }
        }
        Some(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_truncated_to_the_largest_fitting_key() {
        assert!(matches!(
            CipherKey::from_secret(&[0; 40]).unwrap(),
            CipherKey::Aes256(_)
        ));
        assert!(matches!(
            CipherKey::from_secret(&[0; 32]).unwrap(),
            CipherKey::Aes256(_)
        ));
        assert!(matches!(
            CipherKey::from_secret(&[0; 25]).unwrap(),
            CipherKey::Aes192(_)
        ));
        assert!(matches!(
            CipherKey::from_secret(&[0; 16]).unwrap(),
            CipherKey::Aes128(_)
        ));
        assert!(CipherKey::from_secret(&[0; 15]).is_err());
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = CipherKey::from_secret(b"super-secret-test-string").unwrap();
        let token = key.encrypt(b"payload");
        assert_eq!(key.decrypt(&token).unwrap(), b"payload");
    }

    #[test]
    fn each_token_gets_a_fresh_iv() {
        let key = CipherKey::from_secret(b"super-secret-test-string").unwrap();
        assert_ne!(key.encrypt(b"payload"), key.encrypt(b"payload"));
    }

    #[test]
    fn short_or_invalid_tokens_are_rejected() {
        let key = CipherKey::from_secret(b"super-secret-test-string").unwrap();
        assert!(key.decrypt("not base64!").is_none());
        assert!(key.decrypt(&URL_SAFE.encode(b"short")).is_none());
    }
}
