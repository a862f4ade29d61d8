//! Turning uploads into stored files.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use filedrop_shared::error::FileError;
use filedrop_shared::file::{is_zip_content_type, NewFile, OCTET_STREAM};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveEntry, ZipArchive};
use crate::entity::file;
use crate::service::FileService;

/// How the bytes of files extracted from an archive are stored
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveContent {
    /// Standard base64 text, the format older clients decode
    #[default]
    Base64,
    /// The decoded bytes, same as direct uploads
    Raw,
}

/// One uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn is_archive(&self) -> bool {
        self.content_type
            .as_deref()
            .map(is_zip_content_type)
            .unwrap_or(false)
    }
}

impl FileService {
    /// Store every upload in order, expanding zip archives into their files.
    ///
    /// Files stored before a failing upload stay stored.
    pub async fn ingest<I>(&self, uploads: I) -> Result<Vec<file::Model>, FileError>
    where
        I: IntoIterator<Item = Upload>,
    {
        let mut stored = Vec::new();
        for upload in uploads {
            let file_name = upload.file_name.clone();
            if let Err(err) = self.ingest_one(upload, &mut stored).await {
                warn!(
                    "Upload of {} failed after storing {} files: {}",
                    file_name,
                    stored.len(),
                    err
                );
                return Err(err);
            }
        }
        info!("Stored {} files", stored.len());
        Ok(stored)
    }

    async fn ingest_one(
        &self,
        upload: Upload,
        stored: &mut Vec<file::Model>,
    ) -> Result<(), FileError> {
        if upload.file_name.is_empty() {
            return Err(FileError::Format("Upload has no file name".to_string()));
        }

        if upload.is_archive() {
            let archive = ZipArchive::new(&upload.data)?;
            debug!(
                "Expanding archive {} with {} entries",
                upload.file_name,
                archive.len()
            );
            for entry in archive.entries() {
                let new_file = archive_record(entry?, self.archive_content);
                stored.push(self.store().insert(new_file).await?);
            }
        } else {
            debug!(
                "Storing {} ({} bytes)",
                upload.file_name,
                upload.data.len()
            );
            stored.push(self.store().insert(direct_record(upload)).await?);
        }
        Ok(())
    }
}

fn direct_record(upload: Upload) -> NewFile {
    NewFile::new(
        upload.file_name.clone(),
        upload.content_type,
        Some(upload.file_name),
        upload.data,
    )
}

fn archive_record(entry: ArchiveEntry, archive_content: ArchiveContent) -> NewFile {
    let size = entry.content.len() as i64;
    let file_name = entry.file_name().to_string();
    let content = match archive_content {
        ArchiveContent::Base64 => STANDARD.encode(&entry.content).into_bytes(),
        ArchiveContent::Raw => entry.content,
    };

    NewFile {
        file_name,
        last_modified: Utc::now(),
        size,
        mime_type: Some(OCTET_STREAM.to_string()),
        path: Some(entry.path),
        content,
    }
}
