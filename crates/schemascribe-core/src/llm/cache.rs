//! On-disk response cache.
//!
//! Responses are keyed by the SHA-256 of a namespace (normally the model
//! name) plus the full prompt, so a re-run over the same table replays the
//! same text and yields the same DDL.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::client::TextGenerator;
use crate::error::Result;

/// Return the default cache directory: `~/.schemascribe/cache/`.
pub fn default_cache_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".schemascribe").join("cache"))
}

/// Cache key for a prompt under `namespace`.
pub fn cache_key(namespace: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"\n");
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Wraps a generator with a response cache. Without a directory it is a
/// plain pass-through.
pub struct CachingGenerator<G> {
    inner: G,
    namespace: String,
    dir: Option<PathBuf>,
}

impl<G: TextGenerator> CachingGenerator<G> {
    pub fn new(inner: G, namespace: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
            dir: Some(dir.into()),
        }
    }

    pub fn passthrough(inner: G) -> Self {
        Self {
            inner,
            namespace: String::new(),
            dir: None,
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn entry_path(&self, prompt: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.txt", cache_key(&self.namespace, prompt))))
    }
}

impl<G: TextGenerator> TextGenerator for CachingGenerator<G> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let Some(path) = self.entry_path(prompt) else {
            return self.inner.generate(prompt).await;
        };

        if let Ok(cached) = tokio::fs::read_to_string(&path).await {
            tracing::debug!(path = %path.display(), "LLM cache hit");
            return Ok(cached);
        }

        let response = self.inner.generate(prompt).await?;

        // A failed cache write costs a future API call, nothing more.
        if let Err(e) = save_atomically(&path, &response).await {
            tracing::warn!(path = %path.display(), "Failed to write LLM cache entry: {}", e);
        }

        Ok(response)
    }
}

/// Write to a temp file, `sync_all`, then rename over the final path.
async fn save_atomically(path: &Path, data: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("txt.tmp");

    let result = async {
        tokio::fs::write(&tmp_path, data).await?;
        let file = tokio::fs::File::open(&tmp_path).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}
