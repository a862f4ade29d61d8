//! Cli things
//!

use std::path::PathBuf;

use clap::Parser;

use crate::ingest::ArchiveContent;

pub fn db_path_default() -> String {
    shellexpand::tilde("~/.cache/filedrop/files.sqlite3").to_string()
}

#[derive(Parser, Debug)]
pub struct CliOpts {
    #[clap(long, help = "Path to the database file", env = "FILEDROP_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[clap(long, help = "Enable debug logging")]
    pub debug: bool,

    #[clap(
        long,
        help = "Origins allowed to call the API, `*` allows any",
        env = "FILEDROP_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173"
    )]
    pub cors_origin: Vec<String>,

    #[clap(
        long,
        value_enum,
        help = "How files extracted from zip archives are stored",
        env = "FILEDROP_ARCHIVE_CONTENT",
        default_value_t = ArchiveContent::Base64
    )]
    pub archive_content: ArchiveContent,
}
