//! Sign-then-encrypt session cookie codec.
//!
//! Cookie value layout (before base64url):
//!
//! ```text
//! nonce (12) || AES-256-GCM-SIV( version (1) || HMAC-SHA256 (32) || json )
//! ```
//!
//! The MAC covers the cookie name, the version byte and the JSON payload. The
//! cookie name is also bound as associated data, so a value minted for one
//! cookie cannot be replayed under another.

use super::Session;
use aes_gcm_siv::{
    Aes256GcmSiv, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_HASH_KEY_LEN: usize = 32;
pub const BLOCK_KEY_LEN: usize = 32;
pub const MAX_COOKIE_LEN: usize = 4096;

const PAYLOAD_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const MAC_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("hash key must be at least {MIN_HASH_KEY_LEN} bytes, got {0}")]
    HashKeyLength(usize),
    #[error("block key must be exactly {BLOCK_KEY_LEN} bytes, got {0}")]
    BlockKeyLength(usize),
    #[error("session key is not valid base64")]
    KeyEncoding,
    #[error("session cookie exceeds {MAX_COOKIE_LEN} bytes")]
    TooLarge,
    #[error("session cookie is not valid base64url")]
    Encoding,
    #[error("session cookie could not be sealed")]
    Encrypt,
    #[error("session cookie could not be decrypted")]
    Decrypt,
    #[error("session cookie signature mismatch")]
    Signature,
    #[error("unsupported session payload version {0}")]
    Version(u8),
    #[error("session payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// The two independent session keys: `hash` authenticates, `block` encrypts.
#[derive(Debug)]
pub struct SessionKeys {
    hash: SecretSlice<u8>,
    block: SecretSlice<u8>,
}

impl SessionKeys {
    /// # Errors
    /// Returns an error if the hash key is shorter than 32 bytes or the block key
    /// is not exactly 32 bytes.
    pub fn new(hash: Vec<u8>, block: Vec<u8>) -> Result<Self, SessionError> {
        if hash.len() < MIN_HASH_KEY_LEN {
            return Err(SessionError::HashKeyLength(hash.len()));
        }
        if block.len() != BLOCK_KEY_LEN {
            return Err(SessionError::BlockKeyLength(block.len()));
        }
        Ok(Self {
            hash: SecretSlice::from(hash),
            block: SecretSlice::from(block),
        })
    }

    /// Decode both keys from standard base64.
    ///
    /// # Errors
    /// Returns an error if either value is not base64 or has the wrong length.
    pub fn from_base64(hash: &str, block: &str) -> Result<Self, SessionError> {
        let hash = Base64::decode_vec(hash.trim()).map_err(|_| SessionError::KeyEncoding)?;
        let block = Base64::decode_vec(block.trim()).map_err(|_| SessionError::KeyEncoding)?;
        Self::new(hash, block)
    }

    /// Random keys for development. Sessions do not survive a restart.
    #[must_use]
    pub fn generate() -> Self {
        let mut hash = vec![0u8; 64];
        let mut block = vec![0u8; BLOCK_KEY_LEN];
        OsRng.fill_bytes(&mut hash);
        OsRng.fill_bytes(&mut block);
        Self {
            hash: SecretSlice::from(hash),
            block: SecretSlice::from(block),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionCodec {
    cookie_name: String,
    keys: Arc<SessionKeys>,
}

impl SessionCodec {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>, keys: SessionKeys) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            keys: Arc::new(keys),
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Serialize, sign and seal a session into a cookie value.
    ///
    /// # Errors
    /// Returns an error if serialization or encryption fails, or if the sealed
    /// value would not fit in a browser cookie.
    pub fn encode(&self, session: &Session) -> Result<String, SessionError> {
        let json = serde_json::to_vec(session)?;
        let tag = self.sign(PAYLOAD_VERSION, &json)?;

        let mut plain = Vec::with_capacity(1 + MAC_LEN + json.len());
        plain.push(PAYLOAD_VERSION);
        plain.extend_from_slice(&tag);
        plain.extend_from_slice(&json);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plain,
                    aad: self.cookie_name.as_bytes(),
                },
            )
            .map_err(|_| SessionError::Encrypt)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + sealed.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);

        let encoded = Base64UrlUnpadded::encode_string(&raw);
        if encoded.len() > MAX_COOKIE_LEN {
            return Err(SessionError::TooLarge);
        }
        Ok(encoded)
    }

    /// Open, verify and deserialize a cookie value.
    ///
    /// # Errors
    /// Returns an error for any malformed, tampered or foreign value.
    pub fn decode(&self, value: &str) -> Result<Session, SessionError> {
        if value.len() > MAX_COOKIE_LEN {
            return Err(SessionError::TooLarge);
        }
        let raw = Base64UrlUnpadded::decode_vec(value).map_err(|_| SessionError::Encoding)?;
        if raw.len() <= NONCE_LEN {
            return Err(SessionError::Encoding);
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);

        let plain = self
            .cipher()?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: self.cookie_name.as_bytes(),
                },
            )
            .map_err(|_| SessionError::Decrypt)?;

        let Some((&version, rest)) = plain.split_first() else {
            return Err(SessionError::Decrypt);
        };
        if version != PAYLOAD_VERSION {
            return Err(SessionError::Version(version));
        }
        if rest.len() < MAC_LEN {
            return Err(SessionError::Signature);
        }
        let (tag, json) = rest.split_at(MAC_LEN);

        self.mac(version, json)?
            .verify_slice(tag)
            .map_err(|_| SessionError::Signature)?;

        Ok(serde_json::from_slice(json)?)
    }

    fn sign(&self, version: u8, json: &[u8]) -> Result<Vec<u8>, SessionError> {
        Ok(self.mac(version, json)?.finalize().into_bytes().to_vec())
    }

    fn mac(&self, version: u8, json: &[u8]) -> Result<HmacSha256, SessionError> {
        let key = self.keys.hash.expose_secret();
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|_| SessionError::HashKeyLength(key.len()))?;
        mac.update(self.cookie_name.as_bytes());
        mac.update(&[version]);
        mac.update(json);
        Ok(mac)
    }

    fn cipher(&self) -> Result<Aes256GcmSiv, SessionError> {
        let key = self.keys.block.expose_secret();
        <Aes256GcmSiv as KeyInit>::new_from_slice(key)
            .map_err(|_| SessionError::BlockKeyLength(key.len()))
    }
}
