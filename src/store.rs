//! Local session storage interface
//!
//! The recording collaborator owns session persistence; this crate only
//! consumes it. [`SessionStore`] is the seam: the orchestrator reads session
//! metadata and asset bytes through it and never writes. Two implementations
//! ship with the crate: [`FsSessionStore`] for a simple on-disk layout and
//! [`MemorySessionStore`] as a test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::{AssetDescriptor, RecordingSession, SessionId};

/// Read-only access to locally recorded sessions and their binary assets
///
/// Implementations must be cheap to share (`Arc<dyn SessionStore>`); the
/// orchestrator reads asset bytes from several upload tasks concurrently.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by its local id
    async fn session(&self, id: &SessionId) -> Result<Option<RecordingSession>>;

    /// List the asset descriptors recorded for a session
    async fn assets_for_session(&self, id: &SessionId) -> Result<Vec<AssetDescriptor>>;

    /// Read the raw bytes of one locally stored asset
    async fn read_asset_bytes(&self, local_file_id: &str) -> Result<Vec<u8>>;
}

/// Per-session manifest as written by the recording collaborator
///
/// One `session.json` per session directory, next to the asset files it
/// names.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SessionManifest {
    session: RecordingSession,
    #[serde(default)]
    assets: Vec<ManifestAsset>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ManifestAsset {
    local_file_id: String,
    file_name: String,
    duration_seconds: u32,
    captured_at: DateTime<Utc>,
}

/// Filesystem-backed session store
///
/// Expects a directory per session under `root`, each containing a
/// `session.json` manifest and the asset files it references:
///
/// ```text
/// root/
///   <session-id>/
///     session.json
///     segment-001.wav
///     segment-002.wav
/// ```
///
/// Asset sizes are taken from file metadata and checksums (SHA-256, hex) are
/// computed from file contents at listing time. Lookups by `local_file_id`
/// scan the session manifests linearly; local session counts are small.
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    async fn read_manifest(&self, dir: &Path) -> Result<Option<SessionManifest>> {
        let path = dir.join("session.json");
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let manifest: SessionManifest = serde_json::from_slice(&bytes)?;
        Ok(Some(manifest))
    }

    /// Find the on-disk path for a local file id by scanning session manifests
    async fn locate_asset(&self, local_file_id: &str) -> Result<Option<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let dir = entry.path();
            let Some(manifest) = self.read_manifest(&dir).await? else {
                continue;
            };
            if let Some(asset) = manifest
                .assets
                .iter()
                .find(|a| a.local_file_id == local_file_id)
            {
                return Ok(Some(dir.join(&asset.file_name)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn session(&self, id: &SessionId) -> Result<Option<RecordingSession>> {
        let manifest = self.read_manifest(&self.session_dir(id)).await?;
        Ok(manifest.map(|m| m.session))
    }

    async fn assets_for_session(&self, id: &SessionId) -> Result<Vec<AssetDescriptor>> {
        let dir = self.session_dir(id);
        let Some(manifest) = self.read_manifest(&dir).await? else {
            return Err(Error::SessionNotFound(id.clone()));
        };

        let mut descriptors = Vec::with_capacity(manifest.assets.len());
        for asset in manifest.assets {
            let path = dir.join(&asset.file_name);
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to read asset '{}': {}", path.display(), e),
                ))
            })?;

            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let checksum = format!("{:x}", hasher.finalize());

            descriptors.push(AssetDescriptor {
                local_file_id: asset.local_file_id,
                file_name: asset.file_name,
                size_bytes: bytes.len() as u64,
                duration_seconds: asset.duration_seconds,
                captured_at: asset.captured_at,
                checksum: Some(checksum),
            });
        }
        Ok(descriptors)
    }

    async fn read_asset_bytes(&self, local_file_id: &str) -> Result<Vec<u8>> {
        match self.locate_asset(local_file_id).await? {
            Some(path) => Ok(tokio::fs::read(&path).await?),
            None => Err(Error::AssetNotFound(local_file_id.to_string())),
        }
    }
}

/// In-memory session store for tests and embedding without a filesystem
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, (RecordingSession, Vec<AssetDescriptor>)>>,
    bytes: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session with its assets and their byte contents
    pub async fn insert_session(
        &self,
        session: RecordingSession,
        assets: Vec<(AssetDescriptor, Vec<u8>)>,
    ) {
        let mut descriptors = Vec::with_capacity(assets.len());
        let mut bytes = self.bytes.write().await;
        for (descriptor, content) in assets {
            bytes.insert(descriptor.local_file_id.clone(), content);
            descriptors.push(descriptor);
        }
        drop(bytes);
        self.sessions
            .write()
            .await
            .insert(session.local_id.clone(), (session, descriptors));
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn session(&self, id: &SessionId) -> Result<Option<RecordingSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .map(|(session, _)| session.clone()))
    }

    async fn assets_for_session(&self, id: &SessionId) -> Result<Vec<AssetDescriptor>> {
        match self.sessions.read().await.get(id) {
            Some((_, assets)) => Ok(assets.clone()),
            None => Err(Error::SessionNotFound(id.clone())),
        }
    }

    async fn read_asset_bytes(&self, local_file_id: &str) -> Result<Vec<u8>> {
        match self.bytes.read().await.get(local_file_id) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(Error::AssetNotFound(local_file_id.to_string())),
        }
    }
}
