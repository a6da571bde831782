//! Content-addressed on-disk store for expensive derived artifacts.
//!
//! Each record is a single file named `<artifact-kind>-<identity hash>.bin`
//! (spectrum records also carry their slice length, `spectrum-10ms-…`):
//! `[magic: 4][version: u16][reserved: 2][checksum: 32][payload]`, where the
//! payload is the bincode encoding of the artifact and the checksum is its
//! BLAKE3 digest. Files are replaced atomically, and access to one key is
//! serialized, so a reader never sees a partially written record.
//!
//! A missing, truncated, or mismatching record is reported as absent. This is
//! a durability cache: there is no eviction or expiry.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use atomic_write_file::AtomicWriteFile;
use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::constants::{CACHE_FILE_EXTENSION, CACHE_FORMAT_VERSION, CACHE_MAGIC};
use crate::error::{Result, ScrublineError};
use crate::types::{ArtifactKind, MediaIdentity};

const RECORD_HEADER_SIZE: usize = 40;

/// Deterministic name of one cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ArtifactKind,
    identity_hash: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(kind: ArtifactKind, identity: &MediaIdentity) -> Self {
        Self {
            kind,
            identity_hash: identity.hash().to_owned(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-{}", self.kind, self.identity_hash)
    }
}

#[derive(Debug)]
pub struct PersistentCache {
    root: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PersistentCache {
    /// Open (creating if needed) the cache directory at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs_err::create_dir_all(&root)?;
        Ok(Self {
            root,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}.{CACHE_FILE_EXTENSION}", key.name()))
    }

    /// Read a record. Every failure mode collapses to `None`.
    pub fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let name = key.name();
        let path = self.record_path(key);
        let lock = self.key_lock(&name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let bytes = match fs_err::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(cache.key = %name, "cache miss");
                return None;
            }
            Err(err) => {
                tracing::info!(cache.key = %name, error = %err, "cache record unreadable");
                return None;
            }
        };

        match decode_record(&name, &bytes) {
            Ok(value) => {
                tracing::debug!(cache.key = %name, cache.bytes = bytes.len(), "cache hit");
                Some(value)
            }
            Err(err) => {
                tracing::info!(cache.key = %name, error = %err, "discarding corrupt cache record");
                None
            }
        }
    }

    /// Atomically replace the record for `key` with `value`.
    pub fn save<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        let name = key.name();
        let payload = encode_to_vec(value, record_config())?;
        let record = encode_record(&payload);

        let lock = self.key_lock(&name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = AtomicWriteFile::open(self.record_path(key))?;
        file.write_all(&record)?;
        file.commit()?;

        tracing::debug!(
            cache.key = %name,
            cache.payload_len = payload.len(),
            "cache record saved"
        );
        Ok(())
    }

    /// Delete the record for `key`. Returns whether a record existed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let name = key.name();
        let lock = self.key_lock(&name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        match fs_err::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn key_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_owned()).or_default())
    }
}

fn record_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

fn encode_record(payload: &[u8]) -> Vec<u8> {
    let digest = blake3::hash(payload);
    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
    record.extend_from_slice(&CACHE_MAGIC);
    record.extend_from_slice(&CACHE_FORMAT_VERSION.to_le_bytes());
    record.extend_from_slice(&[0u8; 2]);
    record.extend_from_slice(digest.as_bytes());
    record.extend_from_slice(payload);
    record
}

fn decode_record<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T> {
    let corrupt = |reason| ScrublineError::CacheCorrupt {
        key: name.to_owned(),
        reason,
    };

    if bytes.len() < RECORD_HEADER_SIZE {
        return Err(corrupt("record shorter than header"));
    }
    let (header, payload) = bytes.split_at(RECORD_HEADER_SIZE);
    if header[..4] != CACHE_MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != CACHE_FORMAT_VERSION {
        return Err(corrupt("unsupported format version"));
    }
    if blake3::hash(payload).as_bytes() != &header[8..RECORD_HEADER_SIZE] {
        return Err(corrupt("checksum mismatch"));
    }

    let (value, consumed) = decode_from_slice::<T, _>(payload, record_config())?;
    if consumed != payload.len() {
        return Err(corrupt("trailing bytes after payload"));
    }
    Ok(value)
}
