use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Object store backed by a local directory.
///
/// Objects are addressed as `bucket/filename` and live at
/// `root/bucket/filename`. Only a single level below the bucket is allowed.
pub struct ObjectStorage {
    root: PathBuf,
    bucket: String,
}

impl ObjectStorage {
    pub fn new<P: AsRef<Path>>(root: P, bucket: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            bucket: bucket.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The storage path a file uploaded as `filename` gets.
    pub fn object_path(&self, filename: &str) -> String {
        format!("{}/{}", self.bucket, filename)
    }

    /// Writes a new object. Existing objects are never overwritten.
    pub fn put(&self, filename: &str, content: &[u8]) -> Result<String, StorageError> {
        let object_path = self.object_path(filename);
        let path = self.resolve(&object_path)?;
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::ObjectExists(object_path));
            }
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        };

        file.write_all(content)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        log::debug!("Stored {} ({} bytes)", object_path, content.len());
        Ok(object_path)
    }

    pub fn get(&self, object_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(object_path)?;
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Removes an object. A missing object is not an error.
    pub fn remove(&self, object_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(object_path)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Object {} already gone from storage", object_path);
                Ok(())
            }
            Err(e) => Err(StorageError::DeleteFile { path, source: e }),
        }
    }

    pub fn exists(&self, object_path: &str) -> bool {
        self.resolve(object_path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Maps `bucket/filename` to a path under the storage root.
    fn resolve(&self, object_path: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidObjectPath(object_path.to_string());

        let (bucket, filename) = object_path.split_once('/').ok_or_else(invalid)?;
        if bucket != self.bucket
            || filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            return Err(invalid());
        }

        Ok(self.root.join(bucket).join(filename))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}
