use std::sync::Arc;

use filedrop_shared::error::FileError;
use tracing::debug;

use crate::entity::file;
use crate::ingest::ArchiveContent;
use crate::storage::FileStore;

/// Read, delete and ingest operations over a shared [`FileStore`].
#[derive(Clone)]
pub struct FileService {
    store: Arc<FileStore>,
    pub(crate) archive_content: ArchiveContent,
}

impl FileService {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            store,
            archive_content: ArchiveContent::default(),
        }
    }

    pub fn with_archive_content(mut self, archive_content: ArchiveContent) -> Self {
        self.archive_content = archive_content;
        self
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Every stored file. The first call against a fresh location creates it
    /// and returns nothing.
    pub async fn list_all(&self) -> Result<Vec<file::Model>, FileError> {
        if !self.store.is_provisioned() {
            debug!("File store not provisioned yet, creating it");
            self.store.initialize().await?;
            return Ok(Vec::new());
        }
        self.store.list_all().await
    }

    pub async fn get_content(&self, name: &str) -> Result<Vec<u8>, FileError> {
        self.store
            .get_content_by_name(name)
            .await?
            .ok_or_else(|| FileError::NotFound(format!("File {} not found", name)))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<file::Model, FileError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| FileError::NotFound(format!("File {} not found", id)))
    }

    pub async fn delete_by_name(&self, name: &str) -> Result<(), FileError> {
        let deleted = self.store.delete_by_name(name).await?;
        debug!("Deleted {} files named {}", deleted, name);
        Ok(())
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<(), FileError> {
        let deleted = self.store.delete_by_id(id).await?;
        debug!("Deleted {} files with id {}", deleted, id);
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<u64, FileError> {
        let deleted = self.store.delete_all().await?;
        debug!("Deleted all {} files", deleted);
        Ok(deleted)
    }
}
