use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type given to entries extracted from an archive
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A file record that has not been persisted yet, so it has no id and no upload time.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct NewFile {
    /// Base name, used for lookups by name
    pub file_name: String,

    /// When the file was last modified, as far as the uploader knows
    pub last_modified: DateTime<Utc>,

    /// Length of the original file in bytes
    pub size: i64,

    /// MIME type hint (e.g., "text/plain")
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,

    /// Relative path, for archive entries this is the path inside the archive
    pub path: Option<String>,

    /// Stored bytes
    pub content: Vec<u8>,
}

impl NewFile {
    /// Build a record whose size is the length of `content`.
    pub fn new(
        file_name: String,
        mime_type: Option<String>,
        path: Option<String>,
        content: Vec<u8>,
    ) -> Self {
        let size = content.len() as i64;
        Self {
            file_name,
            last_modified: Utc::now(),
            size,
            mime_type,
            path,
            content,
        }
    }
}

/// Does the declared content type name a zip archive?
///
/// Parameters after `;` are ignored, then the type is split on `/` and any
/// `zip` segment counts. The legacy Windows and `x-zip` spellings are also
/// accepted.
pub fn is_zip_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.split('/').any(|segment| segment == "zip")
        || matches!(
            essence.as_str(),
            "application/x-zip-compressed" | "application/x-zip"
        )
}

/// The final segment of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
