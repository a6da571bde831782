//! Media identity and the artifacts derived from a source file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decoder::MediaDecoder;
use crate::error::Result;

const IDENTITY_HASH_LEN: usize = 32;

/// Identifies which derived data belongs to which source file.
///
/// Two identities are equal when their absolute source paths are equal; the
/// hash is a pure function of that path and doubles as the cache key suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaIdentity {
    path: PathBuf,
    hash: String,
}

impl MediaIdentity {
    /// Build an identity from a possibly relative path. The file need not exist.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let absolute = std::path::absolute(path.as_ref())?;
        let digest = blake3::hash(absolute.to_string_lossy().as_bytes());
        let mut hash = digest.to_hex().to_string();
        hash.truncate(IDENTITY_HASH_LEN);
        Ok(Self {
            path: absolute,
            hash,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for MediaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.hash)
    }
}

/// Kind tag of a cached artifact; forms the first half of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Timecodes,
    FrameBands,
    /// Spectrum columns keyed by slice index; only meaningful for the slice
    /// length they were computed with.
    Spectrum { slice_ms: u32 },
}

impl ArtifactKind {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Timecodes => "index",
            Self::FrameBands => "video-band",
            Self::Spectrum { .. } => "spectrum",
        }
    }
}

/// Record-name prefix, e.g. `video-band` or `spectrum-10ms`.
impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spectrum { slice_ms } => write!(f, "{}-{slice_ms}ms", self.tag()),
            _ => f.write_str(self.tag()),
        }
    }
}

/// Lifecycle state of the session's media, owned by [`crate::MediaSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

/// A source file together with the decoder that reads it.
///
/// Cloned into every queued task so a result can be matched against the
/// media that is current when it completes.
#[derive(Clone)]
pub struct LoadedMedia {
    pub identity: MediaIdentity,
    pub decoder: Arc<dyn MediaDecoder>,
}

impl LoadedMedia {
    pub fn new(identity: MediaIdentity, decoder: Arc<dyn MediaDecoder>) -> Self {
        Self { identity, decoder }
    }
}

impl fmt::Debug for LoadedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedMedia")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stable_and_path_derived() {
        let a = MediaIdentity::from_path("/videos/episode-01.mkv").unwrap();
        let b = MediaIdentity::from_path("/videos/episode-01.mkv").unwrap();
        let c = MediaIdentity::from_path("/videos/episode-02.mkv").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_eq!(a.hash().len(), IDENTITY_HASH_LEN);
        assert!(a.path().is_absolute());
    }

    #[test]
    fn spectrum_kind_carries_slice_length() {
        assert_eq!(ArtifactKind::FrameBands.to_string(), "video-band");
        assert_eq!(ArtifactKind::Spectrum { slice_ms: 10 }.to_string(), "spectrum-10ms");
        assert_ne!(
            ArtifactKind::Spectrum { slice_ms: 10 },
            ArtifactKind::Spectrum { slice_ms: 40 }
        );
    }

    #[test]
    fn relative_paths_are_made_absolute() {
        let identity = MediaIdentity::from_path("clip.mp4").unwrap();
        assert!(identity.path().is_absolute());
        assert!(identity.path().ends_with("clip.mp4"));
    }
}
