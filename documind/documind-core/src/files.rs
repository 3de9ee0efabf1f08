//! Boundary to physical file storage. The engine only cares about success or
//! failure; bytes and transports are opaque.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct StoredFile {
    pub id: Uuid,
    pub url: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload(&self, name: &str, data: &[u8]) -> Result<StoredFile>;
    async fn delete_permanently(&self, name: &str) -> Result<()>;
}

/// Local-directory implementation used by the server and in tests.
pub struct LocalFileStorage {
    dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        // keep only the final path component so names cannot escape the dir
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| anyhow!("invalid file name: {name}"))?;
        Ok(self.dir.join(file_name))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(&self, name: &str, data: &[u8]) -> Result<StoredFile> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, data).await?;
        Ok(StoredFile {
            id: Uuid::new_v4(),
            url: format!("file://{}", path.display()),
        })
    }

    async fn delete_permanently(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}
