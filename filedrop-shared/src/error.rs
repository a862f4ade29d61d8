use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    /// No record matches the requested name or id.
    NotFound(String),
    /// An upload declared as an archive could not be parsed as one.
    Format(String),
    /// The backing store failed.
    Store(String),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound(msg) => write!(f, "not found: {}", msg),
            FileError::Format(msg) => write!(f, "invalid archive: {}", msg),
            FileError::Store(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl std::error::Error for FileError {}

impl From<std::io::Error> for FileError {
    fn from(err: std::io::Error) -> Self {
        FileError::Store(err.to_string())
    }
}

impl From<sea_orm::DbErr> for FileError {
    fn from(err: sea_orm::DbErr) -> Self {
        FileError::Store(err.to_string())
    }
}
