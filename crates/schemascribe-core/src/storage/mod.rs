//! # Blob Storage
//!
//! Schema files, enriched schemas, DDL output and the batch tracker all live
//! behind the `BlobStore` trait, addressed by URI-like location strings.
//! `LocalBlobStore` serves plain paths and `file://` URIs; remote object
//! stores plug in by implementing the same trait.

pub mod local;

pub use local::LocalBlobStore;

use crate::error::Result;

/// Durable read/write access to text objects.
pub trait BlobStore: Send + Sync {
    /// Read an object. `Ok(None)` when it does not exist.
    fn read(&self, location: &str) -> Result<Option<String>>;

    /// Create or replace an object. Readers never observe a partial write.
    fn write(&self, location: &str, data: &str) -> Result<()>;

    /// Delete an object. Deleting a missing object is not an error.
    fn delete(&self, location: &str) -> Result<()>;

    /// Names of the objects directly under `dir`, sorted. A missing
    /// directory lists as empty.
    fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Append one line (a trailing newline is added) to an object, creating
    /// it when missing.
    fn append_line(&self, location: &str, line: &str) -> Result<()> {
        let mut content = self.read(location)?.unwrap_or_default();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(line);
        content.push('\n');
        self.write(location, &content)
    }

    fn exists(&self, location: &str) -> Result<bool> {
        Ok(self.read(location)?.is_some())
    }
}

/// Join a directory location and an object name with a single `/`.
pub fn join_location(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", dir.trim_end_matches('/'), name)
}
