use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use filedrop_shared::error::FileError;
use filedrop_shared::file::NewFile;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, SqlxSqliteConnector,
};
use sea_orm_migration::MigratorTrait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::entity::file;
use crate::migration::Migrator;

const SLOW_QUERY_MS: u64 = 500;

/// Open the database (in memory when `db_path` is `None`) and bring the schema up to date.
pub async fn start_db(db_path: Option<&PathBuf>) -> Result<DatabaseConnection, FileError> {
    let (options, pool_options) = match db_path {
        Some(path) => {
            debug!("Opening database: {}", path.display());
            (
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
                SqlitePoolOptions::new(),
            )
        }
        None => {
            debug!("Opening in-memory database");
            // the in-memory database is gone once the last connection closes
            (
                SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|err| FileError::Store(format!("connection failed: {err:?}")))?,
                SqlitePoolOptions::new()
                    .min_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>),
            )
        }
    };

    let options = options
        .log_statements(log::LevelFilter::Trace)
        .log_slow_statements(
            log::LevelFilter::Warn,
            Duration::from_millis(SLOW_QUERY_MS),
        );

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|err| FileError::Store(format!("connection failed: {err:?}")))?;

    let conn = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);
    Migrator::up(&conn, None).await?;

    Ok(conn)
}

/// Handle to the `File` table.
///
/// The connection is opened on first use and reused for the lifetime of the
/// store, so one `FileStore` should be built per process and shared.
pub struct FileStore {
    db_path: Option<PathBuf>,
    conn: OnceCell<DatabaseConnection>,
}

impl FileStore {
    pub fn new(db_path: Option<PathBuf>) -> Self {
        Self {
            db_path,
            conn: OnceCell::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Has the storage location been created yet?
    pub fn is_provisioned(&self) -> bool {
        match &self.db_path {
            Some(path) => path.exists(),
            None => self.conn.initialized(),
        }
    }

    /// Open the database and create the table if needed. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<&DatabaseConnection, FileError> {
        self.conn
            .get_or_try_init(|| async {
                if let Some(parent) = self.db_path().and_then(Path::parent) {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                let conn = start_db(self.db_path.as_ref()).await?;
                match &self.db_path {
                    Some(path) => info!("File store ready at {}", path.display()),
                    None => info!("File store ready in memory"),
                }
                Ok::<_, FileError>(conn)
            })
            .await
    }

    pub async fn list_all(&self) -> Result<Vec<file::Model>, FileError> {
        let conn = self.initialize().await?;
        Ok(file::Entity::find().all(conn).await?)
    }

    /// Content of one record named `name`. When names collide any one of them is returned.
    pub async fn get_content_by_name(&self, name: &str) -> Result<Option<Vec<u8>>, FileError> {
        let conn = self.initialize().await?;
        let content: Option<Option<Vec<u8>>> = file::Entity::find()
            .select_only()
            .column(file::Column::Content)
            .filter(file::Column::FileName.eq(name))
            .into_tuple()
            .one(conn)
            .await?;
        Ok(content.map(Option::unwrap_or_default))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<file::Model>, FileError> {
        let conn = self.initialize().await?;
        Ok(file::Entity::find_by_id(id).one(conn).await?)
    }

    /// Persist a new record and return it as stored, id and upload time included.
    pub async fn insert(&self, new_file: NewFile) -> Result<file::Model, FileError> {
        let conn = self.initialize().await?;

        let active = file::ActiveModel {
            id: NotSet,
            file_name: Set(new_file.file_name),
            last_modified: Set(new_file.last_modified),
            uploaded_at: Set(Utc::now()),
            size: Set(new_file.size),
            mime_type: Set(new_file.mime_type),
            path: Set(new_file.path),
            content: Set(Some(new_file.content)),
        };

        let res = file::Entity::insert(active).exec(conn).await?;
        let id = res.last_insert_id;
        debug!("Inserted file {}", id);

        self.get_by_id(id)
            .await?
            .ok_or_else(|| FileError::Store(format!("File {} missing after insert", id)))
    }

    pub async fn delete_all(&self) -> Result<u64, FileError> {
        let conn = self.initialize().await?;
        let res = file::Entity::delete_many().exec(conn).await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<u64, FileError> {
        let conn = self.initialize().await?;
        let res = file::Entity::delete_by_id(id).exec(conn).await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_by_name(&self, name: &str) -> Result<u64, FileError> {
        let conn = self.initialize().await?;
        let res = file::Entity::delete_many()
            .filter(file::Column::FileName.eq(name))
            .exec(conn)
            .await?;
        Ok(res.rows_affected)
    }
}
