use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{ListedObject, RemoteStore, StorageError, StorageLister, StorageTransfer};

/// A directory tree standing in for a remote container. Ids are `/`-separated
/// paths relative to the root.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(id.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if id.trim().is_empty() || escapes {
            return Err(StorageError::InvalidLocation(format!("bad object id `{id}`")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl StorageLister for LocalDirStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StorageError> {
        let root = self.root.clone();
        let prefix = prefix.trim_start_matches('/').to_string();
        tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            walk(&root, &root, &mut found)?;
            found.retain(|obj| obj.id.starts_with(&prefix));
            found.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(found)
        })
        .await
        .map_err(|err| StorageError::Io(io::Error::other(err.to_string())))?
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<ListedObject>) -> Result<(), StorageError> {
    let entries = fs::read_dir(dir).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(dir.display().to_string()),
        _ => StorageError::Io(err),
    })?;
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let size_bytes = entry.metadata().ok().map(|m| m.len());
            out.push(ListedObject { id, size_bytes });
        }
    }
    Ok(())
}

fn map_io(id: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(id.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait::async_trait]
impl StorageTransfer for LocalDirStore {
    async fn download(&self, id: &str, local_path: &Path) -> Result<u64, StorageError> {
        let source = self.resolve(id)?;
        tokio::fs::copy(&source, local_path)
            .await
            .map_err(|err| map_io(id, err))
    }

    async fn upload(&self, local_path: &Path, dest_id: &str) -> Result<(), StorageError> {
        let target = self.resolve(dest_id)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|err| map_io(&local_path.display().to_string(), err))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let target = self.resolve(id)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|err| map_io(id, err))
    }
}

impl RemoteStore for LocalDirStore {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}
