//! Media reference resolution
//!
//! Posts store their media path encrypted as `base64(nonce(12) || AES-256-GCM ciphertext)`.
//! Resolution decrypts it, keeps it inside the media root and checks the file
//! exists. Anything that fails maps to `None`; callers substitute
//! [`DEFAULT_MEDIA_URL`].

use std::path::{Component, Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD, Engine};
use rand::Rng;
use tracing::debug;

use crate::error::{AppError, Result};

pub const DEFAULT_MEDIA_URL: &str = "/feed/Posts/default-image.png";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Public URL for a stored media reference, if it decodes to an existing file.
    async fn resolve(&self, media_ref: &str) -> Option<String>;
}

/// Maps relative media paths under a root directory to public URLs.
#[derive(Debug, Clone)]
struct MediaRoot {
    root: PathBuf,
    public_prefix: String,
}

impl MediaRoot {
    fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    async fn public_url(&self, relative: &str) -> Option<String> {
        if !is_contained(relative) {
            debug!(path = %relative, "Media path escapes media root");
            return None;
        }

        let full = self.root.join(relative);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Some(format!("{}/{}", self.public_prefix, relative)),
            _ => {
                debug!(path = %full.display(), "Media file missing");
                None
            }
        }
    }
}

/// Relative, non-empty, and free of `..`, root or prefix components.
fn is_contained(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty()
        && !relative.contains('\\')
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Resolver for deployments that store encrypted media paths
pub struct EncryptedMediaResolver {
    cipher: Aes256Gcm,
    media_root: MediaRoot,
}

impl EncryptedMediaResolver {
    /// `key_base64` must decode to exactly 32 bytes.
    pub fn new(key_base64: &str, root: impl Into<PathBuf>, public_prefix: &str) -> Result<Self> {
        let key_bytes = STANDARD
            .decode(key_base64.trim())
            .map_err(|e| AppError::Crypto(format!("Failed to decode media key: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(AppError::Crypto(format!(
                "Media key must be 32 bytes, got {} bytes",
                key_bytes.len()
            )));
        }

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
            media_root: MediaRoot::new(root, public_prefix),
        })
    }

    /// Encrypt a relative media path into its stored form.
    pub fn encrypt_path(&self, path: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, Payload::from(path.as_bytes()))
            .map_err(|e| AppError::Crypto(format!("AES-GCM encryption failed: {}", e)))?;

        let mut stored = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        stored.extend_from_slice(&nonce_bytes);
        stored.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(stored))
    }

    fn decrypt_path(&self, media_ref: &str) -> Option<String> {
        let bytes = STANDARD.decode(media_ref.trim()).ok()?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return None;
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), Payload::from(ciphertext))
            .ok()?;
        String::from_utf8(plain).ok()
    }
}

#[async_trait]
impl MediaResolver for EncryptedMediaResolver {
    async fn resolve(&self, media_ref: &str) -> Option<String> {
        let Some(path) = self.decrypt_path(media_ref) else {
            debug!("Media reference failed to decrypt");
            return None;
        };
        self.media_root.public_url(&path).await
    }
}

/// Resolver for media references stored as plain relative paths
#[derive(Debug, Clone)]
pub struct PlainMediaResolver {
    media_root: MediaRoot,
}

impl PlainMediaResolver {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            media_root: MediaRoot::new(root, public_prefix),
        }
    }
}

#[async_trait]
impl MediaResolver for PlainMediaResolver {
    async fn resolve(&self, media_ref: &str) -> Option<String> {
        self.media_root.public_url(media_ref.trim()).await
    }
}
