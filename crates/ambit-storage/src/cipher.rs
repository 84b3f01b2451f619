//! AES-256-GCM record encryption.
//!
//! Sealed layout: `VERSION(1) ‖ NONCE(12) ‖ CIPHERTEXT ‖ TAG(16)`. The key is
//! derived from the operator secret with BLAKE3 in key-derivation mode, so any
//! non-empty secret string yields a full-strength key.

use ambit_core::{AmbitError, Result};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

const FORMAT_VERSION: u8 = 1;
const KEY_CONTEXT: &str = "ambit secure storage v1";

pub struct Cipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl Cipher {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(AmbitError::Config("encryption secret is empty".into()));
        }
        let key_bytes = blake3::derive_key(KEY_CONTEXT, secret.as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| AmbitError::Config("failed to build AES-256-GCM key".into()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AmbitError::Other(anyhow::anyhow!("random nonce generation failed")))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| AmbitError::Other(anyhow::anyhow!("encryption failed")))?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    /// Decrypt a sealed blob. Wrong key, truncation and tampering all surface
    /// as [`AmbitError::Decryption`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let min_len = 1 + NONCE_LEN + AES_256_GCM.tag_len();
        if sealed.len() < min_len {
            return Err(AmbitError::Decryption(format!(
                "record is {} bytes, shorter than the {} byte minimum",
                sealed.len(),
                min_len
            )));
        }
        if sealed[0] != FORMAT_VERSION {
            return Err(AmbitError::Decryption(format!(
                "unsupported record version {}",
                sealed[0]
            )));
        }

        let (nonce_bytes, body) = sealed[1..].split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AmbitError::Decryption("bad nonce".into()))?;
        let mut buf = body.to_vec();
        let plain_len = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| AmbitError::Decryption("wrong key or corrupted record".into()))?
            .len();
        buf.truncate(plain_len);
        Ok(buf)
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher(AES-256-GCM)")
    }
}
