use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key length: must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("fail to decode base64 ciphertext: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("invalid ciphertext size")]
    InvalidCiphertextSize,
    #[error("fail to seal plaintext")]
    EncryptFailed,
    #[error("fail to decrypt ciphertext")]
    DecryptFailed,
    #[error("ciphertext is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Authenticated symmetric encryption of refresh tokens at rest.
///
/// Ciphertext format is base64 of `nonce || AES-GCM-sealed plaintext`.
pub struct RefreshTokenCipher {
    key: Key<Aes256Gcm>,
}

impl RefreshTokenCipher {
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 32 {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        Ok(Self {
            key: *Key::<Aes256Gcm>::from_slice(key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptFailed)?;

        let mut out = nonce.to_vec();
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let raw = STANDARD.decode(ciphertext)?;
        let nonce_size = 12;
        if raw.len() < nonce_size {
            return Err(CipherError::InvalidCiphertextSize);
        }
        let (nonce, sealed) = raw.split_at(nonce_size);
        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::DecryptFailed)?;
        Ok(String::from_utf8(plaintext)?)
    }
}
