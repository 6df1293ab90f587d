use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use url::Url;

use super::BlobStore;
use crate::error::{Result, ScribeError};

/// Filesystem-backed blob store.
///
/// Relative locations resolve against `root`; `file://` URIs resolve to
/// their absolute path. Any other scheme is rejected.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the current working directory.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a location string to a filesystem path.
    pub fn resolve(&self, location: &str) -> Result<PathBuf> {
        if location.contains("://") {
            let unsupported = || ScribeError::UnsupportedLocation {
                location: location.to_string(),
            };
            let url = Url::parse(location).map_err(|_| unsupported())?;
            if url.scheme() != "file" {
                return Err(unsupported());
            }
            return url.to_file_path().map_err(|_| unsupported());
        }

        let path = Path::new(location);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.root.join(path))
        }
    }
}

impl BlobStore for LocalBlobStore {
    fn read(&self, location: &str) -> Result<Option<String>> {
        let path = self.resolve(location)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ScribeError::storage(
                format!("Failed to read {}", path.display()),
                e,
            )),
        }
    }

    /// Write atomically: temp file in the same directory, `sync_all`, then
    /// rename into place. A crash mid-write leaves the previous content.
    fn write(&self, location: &str, data: &str) -> Result<()> {
        let path = self.resolve(location)?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| {
            ScribeError::storage(format!("Failed to create directory {}", dir.display()), e)
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "blob".to_string());
        let tmp_path = dir.join(format!(".{}.tmp", file_name));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(data.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(ScribeError::storage(
                format!("Failed to write {}", path.display()),
                e,
            ));
        }

        Ok(())
    }

    fn delete(&self, location: &str) -> Result<()> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScribeError::storage(
                format!("Failed to delete {}", path.display()),
                e,
            )),
        }
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.resolve(dir)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ScribeError::storage(
                    format!("Failed to list {}", path.display()),
                    e,
                ))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ScribeError::storage(format!("Failed to list {}", path.display()), e)
            })?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.write("out/patient.sql", "CREATE ...;").unwrap();
        assert_eq!(
            store.read("out/patient.sql").unwrap().as_deref(),
            Some("CREATE ...;")
        );
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.read("nope.json").unwrap().is_none());
        assert!(!store.exists("nope.json").unwrap());
    }

    #[test]
    fn test_atomic_write_no_tmp_left_behind() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.write("a.json", "first").unwrap();
        store.write("a.json", "second").unwrap();

        assert_eq!(store.read("a.json").unwrap().as_deref(), Some("second"));
        assert!(!dir.path().join(".a.json.tmp").exists());
    }

    #[test]
    fn test_append_line_creates_and_appends() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.append_line("log.ndjson", "one").unwrap();
        store.append_line("log.ndjson", "two").unwrap();
        assert_eq!(
            store.read("log.ndjson").unwrap().as_deref(),
            Some("one\ntwo\n")
        );
    }

    #[test]
    fn test_append_line_repairs_missing_trailing_newline() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.write("log.ndjson", "one").unwrap();
        store.append_line("log.ndjson", "two").unwrap();
        assert_eq!(
            store.read("log.ndjson").unwrap().as_deref(),
            Some("one\ntwo\n")
        );
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.delete("ghost.ndjson").unwrap();

        store.write("real.ndjson", "x").unwrap();
        store.delete("real.ndjson").unwrap();
        assert!(store.read("real.ndjson").unwrap().is_none());
    }

    #[test]
    fn test_file_uri_resolves_to_absolute_path() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new("/somewhere/else");
        let abs = dir.path().join("x.json");
        let uri = Url::from_file_path(&abs).unwrap().to_string();

        store.write(&uri, "{}").unwrap();
        assert!(abs.exists());
    }

    #[test]
    fn test_remote_scheme_rejected() {
        let store = LocalBlobStore::current_dir();
        let err = store.read("gs://bucket/tracker.ndjson").unwrap_err();
        assert!(matches!(err, ScribeError::UnsupportedLocation { .. }));
    }

    #[test]
    fn test_list_sorted_files_only() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.write("schemas/b.json", "[]").unwrap();
        store.write("schemas/a.json", "[]").unwrap();
        store.write("schemas/nested/c.json", "[]").unwrap();

        assert_eq!(store.list("schemas").unwrap(), vec!["a.json", "b.json"]);
        assert!(store.list("missing").unwrap().is_empty());
    }
}
