//! Object store rooted at a local directory.
//!
//! Object names map to relative paths under the root. Whole-object writes go
//! through a temp file in the target directory followed by a rename, so readers
//! never observe a half-written object. Conditional creates hard-link a fully
//! written temp file into place; the link fails with `AlreadyExists` when the
//! target is present, which gives the same exclusivity as `create_new`.

use super::{validate_object_name, ObjectStore, PutOutcome, StorageError, StorageResult};
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Clone)]
pub struct FileSystemObjectStore {
    root: PathBuf,
}

impl FileSystemObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        validate_object_name(name)?;
        Ok(self.root.join(name))
    }

    async fn write_temp(&self, target: &Path, name: &str, data: &[u8]) -> StorageResult<PathBuf> {
        let parent = target
            .parent()
            .ok_or_else(|| StorageError::backend(format!("object '{name}' has no parent")))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(name, e))?;

        let temp = parent.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| StorageError::io(name, e))?;
        file.write_all(data)
            .await
            .map_err(|e| StorageError::io(name, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io(name, e))?;
        Ok(temp)
    }

    fn map_read_error(name: &str, error: std::io::Error) -> StorageError {
        if error.kind() == ErrorKind::NotFound {
            StorageError::not_found(name)
        } else {
            StorageError::io(name, error)
        }
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let target = self.resolve(path)?;
        fs::try_exists(&target)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        let target = self.resolve(path)?;
        fs::read(&target)
            .await
            .map_err(|e| Self::map_read_error(path, e))
    }

    async fn get_range(&self, path: &str, start: u64, end: u64) -> StorageResult<Vec<u8>> {
        let target = self.resolve(path)?;
        let mut file = fs::File::open(&target)
            .await
            .map_err(|e| Self::map_read_error(path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| StorageError::io(path, e))?
            .len();
        let start = start.min(len);
        let end = end.clamp(start, len);

        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| StorageError::io(path, e))?;
        let mut buffer = Vec::with_capacity((end - start) as usize);
        file.take(end - start)
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok(buffer)
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        let target = self.resolve(path)?;
        fs::metadata(&target)
            .await
            .map(|m| m.len())
            .map_err(|e| Self::map_read_error(path, e))
    }

    async fn put(&self, path: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        let temp = self.write_temp(&target, path, &data).await?;
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::io(path, e));
        }
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, data: Vec<u8>) -> StorageResult<PutOutcome> {
        let target = self.resolve(path)?;
        let temp = self.write_temp(&target, path, &data).await?;
        let linked = fs::hard_link(&temp, &target).await;
        let _ = fs::remove_file(&temp).await;

        match linked {
            Ok(()) => Ok(PutOutcome::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(object = %path, "Conditional create lost: object already exists");
                Ok(PutOutcome::AlreadyExists)
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Only the directory part of the prefix needs walking
        let base = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let mut pending = vec![(self.root.join(base), base.to_string())];
        let mut names = Vec::new();

        while let Some((dir, relative)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(relative, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(relative.as_str(), e))?
            {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if file_name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                let name = if relative.is_empty() {
                    file_name
                } else {
                    format!("{relative}/{file_name}")
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::io(name.as_str(), e))?;

                if file_type.is_dir() {
                    pending.push((entry.path(), name));
                } else if name.starts_with(prefix) {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
