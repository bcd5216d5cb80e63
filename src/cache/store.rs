//! Artifact cache implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::format::TargetFormat;

use super::encoder::{Encoder, TranscodeError};

/// Prefix of in-progress temporary files inside a cache directory
const PARTIAL_PREFIX: &str = ".partial-";

/// A transcoded file ready to be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Final location in the cache directory
    pub path: PathBuf,
    /// Encoded format
    pub target: TargetFormat,
    /// Already on disk; no encode was run for this request
    pub cached: bool,
}

/// File system backed store of transcoded images
///
/// Concurrent requests for the same artifact are collapsed: the first one
/// encodes, the others wait on a per-path lock and then find the file on
/// disk. Correctness does not depend on the lock; every artifact is placed
/// with an atomic rename, so even duplicate encodes leave a complete file.
pub struct ArtifactCache {
    encoder: Arc<dyn Encoder>,
    cache_dir_name: String,
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ArtifactCache {
    /// Create a cache that stores artifacts in `<group>/<cache_dir_name>/`
    pub fn new(encoder: Arc<dyn Encoder>, cache_dir_name: impl Into<String>) -> Self {
        Self {
            encoder,
            cache_dir_name: cache_dir_name.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Backend used for cache misses
    pub fn encoder(&self) -> &dyn Encoder {
        self.encoder.as_ref()
    }

    /// Deterministic cache location for `source` encoded as `target`
    ///
    /// `cats/a.png` as WebP maps to `cats/<cache_dir_name>/a.png.webp`.
    pub fn artifact_path(&self, source: &Path, target: TargetFormat) -> Option<PathBuf> {
        let file_name = source.file_name()?;
        let dir = source.parent()?.join(&self.cache_dir_name);

        let mut name = file_name.to_os_string();
        name.push(".");
        name.push(target.extension());

        Some(dir.join(name))
    }

    /// Return the cached artifact for (`source`, `target`), encoding it first
    /// if it does not exist yet
    ///
    /// The encode runs in its own task: dropping the returned future (client
    /// went away) does not stop the artifact from being written.
    pub async fn obtain(
        self: &Arc<Self>,
        source: &Path,
        target: TargetFormat,
    ) -> Result<Artifact, TranscodeError> {
        let path = self.artifact_path(source, target).ok_or_else(|| {
            TranscodeError::Other(format!("{} has no file name", source.display()))
        })?;

        if exists(&path).await {
            tracing::debug!(artifact = %path.display(), "Cache hit");
            return Ok(Artifact {
                path,
                target,
                cached: true,
            });
        }

        let cache = Arc::clone(self);
        let source = source.to_path_buf();

        tokio::spawn(async move { cache.populate(source, target, path).await })
            .await
            .map_err(|e| TranscodeError::Task(e.to_string()))?
    }

    async fn populate(
        &self,
        source: PathBuf,
        target: TargetFormat,
        path: PathBuf,
    ) -> Result<Artifact, TranscodeError> {
        let key_lock = self.acquire_key(&path).await;

        let result = {
            let _guard = key_lock.lock().await;

            if exists(&path).await {
                tracing::debug!(artifact = %path.display(), "Cache filled by concurrent request");
                Ok(Artifact {
                    path: path.clone(),
                    target,
                    cached: true,
                })
            } else {
                self.encode(source, target, path.clone()).await
            }
        };

        self.release_key(&path, key_lock).await;
        result
    }

    async fn encode(
        &self,
        source: PathBuf,
        target: TargetFormat,
        path: PathBuf,
    ) -> Result<Artifact, TranscodeError> {
        let encoder = Arc::clone(&self.encoder);
        let started = Instant::now();

        let placed = path.clone();
        let source_name = source.clone();
        tokio::task::spawn_blocking(move || {
            encode_atomically(encoder.as_ref(), &source, target, &placed)
        })
        .await
        .map_err(|e| TranscodeError::Task(e.to_string()))??;

        tracing::info!(
            source = %source_name.display(),
            target = %target,
            encoder = self.encoder.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Converted"
        );

        Ok(Artifact {
            path,
            target,
            cached: false,
        })
    }

    /// Encode `source` as `target` without storing the result
    ///
    /// The output goes through a temporary file outside any group and is
    /// returned in memory.
    pub async fn encode_uncached(
        &self,
        source: &Path,
        target: TargetFormat,
    ) -> Result<Vec<u8>, TranscodeError> {
        let encoder = Arc::clone(&self.encoder);
        let source = source.to_path_buf();

        tokio::task::spawn_blocking(move || encode_to_memory(encoder.as_ref(), &source, target))
            .await
            .map_err(|e| TranscodeError::Task(e.to_string()))?
    }

    async fn acquire_key(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(path.to_path_buf()).or_default())
    }

    async fn release_key(&self, path: &Path, key_lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // One reference in the map plus ours means nobody else is waiting
        let last = Arc::strong_count(&key_lock) <= 2;
        drop(key_lock);
        if last {
            in_flight.remove(path);
        }
    }

    #[cfg(test)]
    async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Encode into a temporary file next to `path`, then rename it into place
///
/// The temporary file is removed on every failure path, so `path` either
/// does not exist or holds a complete artifact.
fn encode_atomically(
    encoder: &dyn Encoder,
    source: &Path,
    target: TargetFormat,
    path: &Path,
) -> Result<(), TranscodeError> {
    let dir = path.parent().ok_or_else(|| {
        TranscodeError::Other(format!("{} has no parent directory", path.display()))
    })?;

    let temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(&format!(".{}", target.extension()))
        .tempfile_in(dir)
        .map_err(|e| TranscodeError::io(dir, e))?
        .into_temp_path();

    encoder.encode(source, target, &temp)?;

    let written = std::fs::metadata(&temp)
        .map_err(|e| TranscodeError::io(&*temp, e))?
        .len();
    if written == 0 {
        return Err(TranscodeError::Empty(source.to_path_buf()));
    }

    temp.persist(path)
        .map_err(|e| TranscodeError::io(path, e.error))
}

fn encode_to_memory(
    encoder: &dyn Encoder,
    source: &Path,
    target: TargetFormat,
) -> Result<Vec<u8>, TranscodeError> {
    let temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(&format!(".{}", target.extension()))
        .tempfile()
        .map_err(|e| TranscodeError::io(std::env::temp_dir(), e))?
        .into_temp_path();

    encoder.encode(source, target, &temp)?;

    let bytes = std::fs::read(&temp).map_err(|e| TranscodeError::io(&*temp, e))?;
    if bytes.is_empty() {
        return Err(TranscodeError::Empty(source.to_path_buf()));
    }
    Ok(bytes)
}
