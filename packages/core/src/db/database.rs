//! Database Connection Management
//!
//! This module provides the libsql connection, schema initialization and the
//! raw SQL operations behind [`TursoStore`](crate::db::TursoStore).
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any valid PathBuf
//! - **JSON columns**: `children_ids`, `properties`, `metadata` and `content` are JSON text
//! - **WAL mode**: Write-Ahead Logging for concurrent readers
//! - **No migrations**: CREATE TABLE/INDEX IF NOT EXISTS only
//!
//! # Database Connection Patterns
//!
//! **Always use `connect_with_timeout()` in async functions.** It applies the
//! configured busy timeout so concurrent writers wait for the lock instead of
//! failing immediately with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use blockstore_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/blocks.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::block_store::{BlockWrite, WriteBatch};
use crate::db::error::DatabaseError;
use crate::models::{Block, BlockRecord};
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Row, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Default busy timeout applied to every connection
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Columns selected for every block read, in row order
pub(crate) const BLOCK_COLUMNS: &str = "id, block_type, workspace_id, root_id, parent_id, children_ids, in_trash, version, properties, metadata, content, properties_version, created_time, last_edited_time, created_by, last_edited_by";

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use blockstore_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/blocks.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Create a new DatabaseService with the default busy timeout
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Enable WAL mode and foreign keys
    /// 4. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Create a new DatabaseService waiting up to `busy_timeout_ms` on locks
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        // Only new databases need the WAL checkpoint after schema creation
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::CreateDirectory(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: safe to call on an existing database.
    ///
    /// # Schema
    ///
    /// - `blocks` table: one row per block, JSON documents as text
    /// - Indexes: `(root_id, block_type)`, `parent_id`, `(workspace_id, root_id)`, `in_trash`
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                id TEXT PRIMARY KEY,
                block_type TEXT NOT NULL,
                workspace_id TEXT NOT NULL,
                root_id TEXT NOT NULL,
                parent_id TEXT,
                children_ids JSON NOT NULL DEFAULT '[]',
                in_trash INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                properties JSON NOT NULL DEFAULT '{}',
                metadata JSON NOT NULL DEFAULT '{}',
                content JSON,
                properties_version INTEGER,
                created_time TEXT NOT NULL,
                last_edited_time TEXT NOT NULL,
                created_by TEXT,
                last_edited_by TEXT
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create blocks table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes for the blocks table
    async fn create_core_indexes(&self, conn: &Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_blocks_root_type",
                "CREATE INDEX IF NOT EXISTS idx_blocks_root_type ON blocks(root_id, block_type)",
            ),
            (
                "idx_blocks_parent",
                "CREATE INDEX IF NOT EXISTS idx_blocks_parent ON blocks(parent_id)",
            ),
            (
                "idx_blocks_workspace_root",
                "CREATE INDEX IF NOT EXISTS idx_blocks_workspace_root ON blocks(workspace_id, root_id)",
            ),
            (
                "idx_blocks_trash",
                "CREATE INDEX IF NOT EXISTS idx_blocks_trash ON blocks(in_trash)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create index '{}': {}", name, e))
            })?;
        }

        Ok(())
    }

    /// Get a connection without the busy timeout
    ///
    /// Only for synchronous, single-threaded setup code. Use
    /// `connect_with_timeout()` everywhere else.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::Driver)
    }

    /// Get an async connection with the busy timeout configured
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;
        Ok(conn)
    }

    //
    // BLOCK OPERATIONS
    // Raw SQL behind the TursoStore implementation of BlockStore.
    //

    /// Run a SELECT over `blocks` and decode every row
    ///
    /// `sql` must select [`BLOCK_COLUMNS`] in order.
    pub async fn db_select_blocks(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Block>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn.prepare(sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare block query: {}", e))
        })?;

        let mut rows = stmt.query(Params::Positional(params)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute block query: {}", e))
        })?;

        let mut blocks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            blocks.push(row_to_block(&row)?);
        }
        Ok(blocks)
    }

    /// True if the query returns at least one row
    pub async fn db_exists(&self, sql: &str, params: Vec<Value>) -> Result<bool, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn.prepare(sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare probe query: {}", e))
        })?;

        let mut rows = stmt.query(Params::Positional(params)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute probe query: {}", e))
        })?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Apply a batch of compare-and-swap puts in one IMMEDIATE transaction
    ///
    /// # Errors
    ///
    /// - `WriteConflict` if an insert hits an existing id or an update finds
    ///   another version (the transaction is rolled back)
    /// - `Statement` for any other failure (rolled back)
    pub async fn db_apply_batch(&self, batch: WriteBatch) -> Result<(), DatabaseError> {
        if batch.is_empty() {
            return Ok(());
        }

        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let count = batch.len();
        for write in batch {
            if let Err(e) = Self::apply_write(&conn, &write).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(e);
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        tracing::debug!(count, "Applied block write batch");
        Ok(())
    }

    async fn apply_write(conn: &Connection, write: &BlockWrite) -> Result<(), DatabaseError> {
        let block = write.block();
        let mut params = block_params(block)?;

        let affected = match write.expected_version() {
            None => conn
                .execute(
                    &format!(
                        "INSERT INTO blocks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                         ON CONFLICT(id) DO NOTHING",
                        BLOCK_COLUMNS
                    ),
                    Params::Positional(params),
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to insert block {}: {}",
                        block.id, e
                    ))
                })?,
            Some(expected_version) => {
                // SET takes every column but id; id and the expected version go to WHERE
                let id = params.remove(0);
                params.push(id);
                params.push(Value::Integer(expected_version));
                conn.execute(
                    "UPDATE blocks SET block_type = ?, workspace_id = ?, root_id = ?, parent_id = ?,
                        children_ids = ?, in_trash = ?, version = ?, properties = ?, metadata = ?,
                        content = ?, properties_version = ?, created_time = ?, last_edited_time = ?,
                        created_by = ?, last_edited_by = ?
                     WHERE id = ? AND version = ?",
                    Params::Positional(params),
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to update block {}: {}",
                        block.id, e
                    ))
                })?
            }
        };

        if affected == 0 {
            let actual_version = Self::current_version(conn, &block.id).await?;
            return Err(DatabaseError::write_conflict(
                block.id.clone(),
                write.expected_version(),
                actual_version,
            ));
        }
        Ok(())
    }

    async fn current_version(conn: &Connection, id: &str) -> Result<Option<i64>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT version FROM blocks WHERE id = ?")
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let mut rows = stmt
            .query([id])
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(Some(row.get::<i64>(0)?)),
            None => Ok(None),
        }
    }
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

fn json_text(value: &serde_json::Value) -> Result<Value, DatabaseError> {
    serde_json::to_string(value)
        .map(Value::Text)
        .map_err(|e| DatabaseError::invalid_row(format!("Failed to serialize JSON column: {}", e)))
}

/// Positional parameters in [`BLOCK_COLUMNS`] order
fn block_params(block: &Block) -> Result<Vec<Value>, DatabaseError> {
    let record = BlockRecord::from(block);
    let children = serde_json::Value::from(record.children_ids.clone());
    Ok(vec![
        Value::Text(record.id),
        Value::Text(record.block_type),
        Value::Text(record.workspace_id),
        Value::Text(record.root_id),
        optional_text(record.parent_id.as_deref()),
        json_text(&children)?,
        Value::Integer(i64::from(record.in_trash)),
        Value::Integer(record.version),
        json_text(&record.properties)?,
        json_text(&record.metadata)?,
        match &record.content {
            Some(content) => json_text(content)?,
            None => Value::Null,
        },
        record.properties_version.map_or(Value::Null, Value::Integer),
        optional_text(record.created_time.as_deref()),
        optional_text(record.last_edited_time.as_deref()),
        optional_text(record.created_by.as_deref()),
        optional_text(record.last_edited_by.as_deref()),
    ])
}

fn parse_json_column(row: &Row, index: i32, name: &str) -> Result<serde_json::Value, DatabaseError> {
    let raw: Option<String> = row.get(index)?;
    match raw {
        None => Ok(serde_json::Value::Null),
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| DatabaseError::invalid_row(format!("Failed to parse {}: {}", name, e))),
    }
}

/// Convert a row selected with [`BLOCK_COLUMNS`] into a validated block
fn row_to_block(row: &Row) -> Result<Block, DatabaseError> {
    let children_ids: Vec<String> = match parse_json_column(row, 5, "children_ids")? {
        serde_json::Value::Null => Vec::new(),
        value => serde_json::from_value(value)
            .map_err(|e| DatabaseError::invalid_row(format!("Failed to parse children_ids: {}", e)))?,
    };
    let content = match parse_json_column(row, 10, "content")? {
        serde_json::Value::Null => None,
        value => Some(value),
    };

    let record = BlockRecord {
        id: row.get(0)?,
        block_type: row.get(1)?,
        workspace_id: row.get(2)?,
        root_id: row.get(3)?,
        parent_id: row.get(4)?,
        children_ids,
        in_trash: row.get::<i64>(6)? != 0,
        version: row.get(7)?,
        properties: parse_json_column(row, 8, "properties")?,
        metadata: parse_json_column(row, 9, "metadata")?,
        content,
        properties_version: row.get(11)?,
        created_time: row.get(12)?,
        last_edited_time: row.get(13)?,
        created_by: row.get(14)?,
        last_edited_by: row.get(15)?,
    };

    let id = record.id.clone();
    Block::try_from(record)
        .map_err(|e| DatabaseError::invalid_row(format!("Block {} failed validation: {}", id, e)))
}
