//! SurrealStore - BlockStore Implementation for SurrealDB Backend
//!
//! Blocks live in a single SCHEMALESS `blocks` table. The record id is
//! `blocks:<id>` and the plain id is duplicated in a `uuid` field so queries
//! and indexes never have to unpack record ids.
//!
//! # Design Principles
//!
//! 1. **Embedded engines**: RocksDB on disk, `kv-mem` for tests
//! 2. **SCHEMALESS mode**: `properties`, `metadata` and `content` are stored as
//!    nested documents and filtered with native field paths
//! 3. **Batches as transactions**: every precondition is checked inside one
//!    `BEGIN TRANSACTION ... COMMIT TRANSACTION` block and a failed check
//!    `THROW`s, cancelling the whole batch
//!
//! # Examples
//!
//! ```rust,no_run
//! use blockstore_core::db::{BlockStore, SurrealStore};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SurrealStore::new(PathBuf::from("./data/surreal.db")).await?;
//!     let block = store.get_block("block-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::block_store::{BlockStore, BlockWrite, WriteBatch};
use crate::db::surreal_filter::{numeric_contains_probes, select_query};
use crate::db::DatabaseError;
use crate::models::{Block, BlockQuery, BlockRecord};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

const NAMESPACE: &str = "blockstore";
const DATABASE: &str = "blocks";
const CONFLICT_MARKER: &str = "block_write_conflict:";

/// Row shape of the `blocks` table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SurrealBlock {
    uuid: String,
    block_type: String,
    workspace_id: String,
    root_id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    children_ids: Vec<String>,
    #[serde(default)]
    in_trash: bool,
    version: i64,
    #[serde(default)]
    properties: Value,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    properties_version: Option<i64>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    last_edited_time: Option<String>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    last_edited_by: Option<String>,
}

impl From<&Block> for SurrealBlock {
    fn from(block: &Block) -> Self {
        let record = BlockRecord::from(block);
        SurrealBlock {
            uuid: record.id,
            block_type: record.block_type,
            workspace_id: record.workspace_id,
            root_id: record.root_id,
            parent_id: record.parent_id,
            children_ids: record.children_ids,
            in_trash: record.in_trash,
            version: record.version,
            properties: record.properties,
            metadata: record.metadata,
            content: record.content,
            properties_version: record.properties_version,
            created_time: record.created_time,
            last_edited_time: record.last_edited_time,
            created_by: record.created_by,
            last_edited_by: record.last_edited_by,
        }
    }
}

impl From<SurrealBlock> for BlockRecord {
    fn from(sb: SurrealBlock) -> Self {
        BlockRecord {
            id: sb.uuid,
            block_type: sb.block_type,
            workspace_id: sb.workspace_id,
            root_id: sb.root_id,
            parent_id: sb.parent_id,
            children_ids: sb.children_ids,
            in_trash: sb.in_trash,
            version: sb.version,
            properties: sb.properties,
            metadata: sb.metadata,
            content: sb.content,
            properties_version: sb.properties_version,
            created_time: sb.created_time,
            last_edited_time: sb.last_edited_time,
            created_by: sb.created_by,
            last_edited_by: sb.last_edited_by,
        }
    }
}

fn into_block(row: SurrealBlock) -> Result<Block, DatabaseError> {
    let id = row.uuid.clone();
    Block::try_from(BlockRecord::from(row))
        .map_err(|e| DatabaseError::invalid_row(format!("block {}: {}", id, e)))
}

/// `CONTENT` document for a block
fn surreal_content(block: &Block) -> Value {
    let sb = SurrealBlock::from(block);
    serde_json::json!({
        "uuid": sb.uuid,
        "block_type": sb.block_type,
        "workspace_id": sb.workspace_id,
        "root_id": sb.root_id,
        "parent_id": sb.parent_id,
        "children_ids": sb.children_ids,
        "in_trash": sb.in_trash,
        "version": sb.version,
        "properties": sb.properties,
        "metadata": sb.metadata,
        "content": sb.content,
        "properties_version": sb.properties_version,
        "created_time": sb.created_time,
        "last_edited_time": sb.last_edited_time,
        "created_by": sb.created_by,
        "last_edited_by": sb.last_edited_by,
    })
}

fn into_blocks(rows: Vec<SurrealBlock>) -> Result<Vec<Block>, DatabaseError> {
    rows.into_iter().map(into_block).collect()
}

/// SurrealStore implements BlockStore for an embedded SurrealDB
pub struct SurrealStore {
    db: Arc<Surreal<Db>>,
}

impl SurrealStore {
    /// Open (or create) a RocksDB-backed store at `db_path`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - RocksDB initialization fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::open(db_path, NAMESPACE, DATABASE).await
    }

    /// In-memory store, discarded on drop
    pub async fn new_in_memory() -> Result<Self, DatabaseError> {
        Self::open_in_memory(NAMESPACE, DATABASE).await
    }

    /// RocksDB-backed store using the given namespace and database names
    pub async fn open(
        db_path: PathBuf,
        namespace: &str,
        database: &str,
    ) -> Result<Self, DatabaseError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .context("Failed to initialize SurrealDB with RocksDB backend")?;
        Self::from_connection(db, namespace, database).await
    }

    pub async fn open_in_memory(namespace: &str, database: &str) -> Result<Self, DatabaseError> {
        let db = Surreal::new::<Mem>(())
            .await
            .context("Failed to initialize in-memory SurrealDB")?;
        Self::from_connection(db, namespace, database).await
    }

    async fn from_connection(
        db: Surreal<Db>,
        namespace: &str,
        database: &str,
    ) -> Result<Self, DatabaseError> {
        db.use_ns(namespace)
            .use_db(database)
            .await
            .context("Failed to set namespace/database")?;

        let db = Arc::new(db);
        Self::initialize_schema(&db).await?;
        Ok(Self { db })
    }

    async fn initialize_schema(db: &Surreal<Db>) -> Result<(), DatabaseError> {
        db.query(
            "
            DEFINE TABLE IF NOT EXISTS blocks SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS idx_blocks_uuid ON TABLE blocks COLUMNS uuid UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_blocks_root ON TABLE blocks COLUMNS root_id;
            DEFINE INDEX IF NOT EXISTS idx_blocks_parent ON TABLE blocks COLUMNS parent_id;
            DEFINE INDEX IF NOT EXISTS idx_blocks_type ON TABLE blocks COLUMNS block_type;
            ",
        )
        .await
        .context("Failed to create blocks table")?
        .check()
        .context("Failed to define blocks schema")?;
        Ok(())
    }

    async fn select(
        &self,
        sql: &str,
        bindings: BTreeMap<String, Value>,
    ) -> Result<Vec<Block>, DatabaseError> {
        let mut response = self
            .db
            .query(sql.to_string())
            .bind(bindings)
            .await
            .with_context(|| format!("Failed to run query: {}", sql))?;
        let rows: Vec<SurrealBlock> = response
            .take(0)
            .context("Failed to extract query results")?;
        into_blocks(rows)
    }

    /// Render a batch as one transaction plus its bindings
    ///
    /// Statement `i` of the batch throws `block_write_conflict:<i>` when its
    /// precondition fails.
    fn batch_transaction(batch: &WriteBatch) -> (String, BTreeMap<String, Value>) {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        let mut bindings = BTreeMap::new();

        for (i, write) in batch.iter().enumerate() {
            let block = write.block();
            bindings.insert(format!("id{}", i), Value::String(block.id.clone()));
            bindings.insert(
                format!("b{}", i),
                surreal_content(block),
            );
            match write {
                BlockWrite::Insert(_) => {
                    sql.push_str(&format!(
                        "LET $e{i} = (SELECT VALUE uuid FROM type::thing(\"blocks\", $id{i}));\n\
                         IF array::len($e{i}) > 0 {{ THROW \"{marker}{i}\" }};\n\
                         CREATE type::thing(\"blocks\", $id{i}) CONTENT $b{i};\n",
                        i = i,
                        marker = CONFLICT_MARKER
                    ));
                }
                BlockWrite::Update {
                    expected_version, ..
                } => {
                    bindings.insert(format!("v{}", i), Value::from(*expected_version));
                    sql.push_str(&format!(
                        "LET $r{i} = (UPDATE type::thing(\"blocks\", $id{i}) CONTENT $b{i} WHERE version = $v{i} RETURN AFTER);\n\
                         IF array::len($r{i}) = 0 {{ THROW \"{marker}{i}\" }};\n",
                        i = i,
                        marker = CONFLICT_MARKER
                    ));
                }
            }
        }

        sql.push_str("COMMIT TRANSACTION;");
        (sql, bindings)
    }
}

/// Batch index carried by a thrown conflict marker
fn conflict_index(message: &str) -> Option<usize> {
    let start = message.find(CONFLICT_MARKER)? + CONFLICT_MARKER.len();
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[async_trait]
impl BlockStore for SurrealStore {
    async fn get_block(&self, id: &str) -> Result<Option<Block>, DatabaseError> {
        let mut response = self
            .db
            .query("SELECT * FROM blocks WHERE uuid = $uuid LIMIT 1;")
            .bind(("uuid", id.to_string()))
            .await
            .context("Failed to query block by uuid")?;
        let rows: Vec<SurrealBlock> = response
            .take(0)
            .context("Failed to extract query results")?;
        Ok(into_blocks(rows)?.pop())
    }

    async fn get_blocks(&self, ids: &[String]) -> Result<Vec<Block>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut bindings = BTreeMap::new();
        bindings.insert("ids".to_string(), Value::from(ids.to_vec()));
        self.select("SELECT * FROM blocks WHERE uuid INSIDE $ids;", bindings)
            .await
    }

    async fn get_root_blocks(&self, root_id: &str) -> Result<Vec<Block>, DatabaseError> {
        let mut bindings = BTreeMap::new();
        bindings.insert("root".to_string(), Value::String(root_id.to_string()));
        self.select("SELECT * FROM blocks WHERE root_id = $root;", bindings)
            .await
    }

    async fn get_children_of(&self, parent_ids: &[String]) -> Result<Vec<Block>, DatabaseError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut bindings = BTreeMap::new();
        bindings.insert("parents".to_string(), Value::from(parent_ids.to_vec()));
        self.select(
            "SELECT * FROM blocks WHERE parent_id INSIDE $parents;",
            bindings,
        )
        .await
    }

    async fn query_blocks(&self, query: &BlockQuery) -> Result<Vec<Block>, DatabaseError> {
        let built = select_query(query);
        tracing::debug!(sql = %built.sql, bindings = built.bindings.len(), "Running block query");
        self.select(&built.sql, built.bindings).await
    }

    async fn find_numeric_contains(
        &self,
        query: &BlockQuery,
    ) -> Result<Option<String>, DatabaseError> {
        for (path, probe) in numeric_contains_probes(query) {
            let mut response = self
                .db
                .query(probe.sql)
                .bind(probe.bindings)
                .await
                .context("Failed to run numeric contains probe")?;
            let hits: Vec<String> = response
                .take(0)
                .context("Failed to extract probe results")?;
            if !hits.is_empty() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), DatabaseError> {
        if batch.is_empty() {
            return Ok(());
        }

        let (sql, bindings) = Self::batch_transaction(&batch);
        let mut response = self
            .db
            .query(sql)
            .bind(bindings)
            .await
            .context("Failed to run block write transaction")?;

        let errors = response.take_errors();
        if errors.is_empty() {
            tracing::debug!(count = batch.len(), "Applied block write batch");
            return Ok(());
        }

        let messages: Vec<String> = errors.values().map(|e| e.to_string()).collect();
        let conflict = messages.iter().find_map(|m| conflict_index(m));
        let Some(index) = conflict else {
            return Err(DatabaseError::Embedded(anyhow!(
                "Block write transaction failed: {}",
                messages.join("; ")
            )));
        };

        let Some(write) = batch.iter().nth(index) else {
            return Err(DatabaseError::Embedded(anyhow!(
                "Conflict marker {} outside batch of {}",
                index,
                batch.len()
            )));
        };
        let block_id = write.block().id.clone();
        let actual_version = self.get_block(&block_id).await?.map(|b| b.version);
        tracing::debug!(
            block_id = %block_id,
            expected = ?write.expected_version(),
            actual = ?actual_version,
            "Block write conflict"
        );
        Err(DatabaseError::write_conflict(
            block_id,
            write.expected_version(),
            actual_version,
        ))
    }

    fn backend_name(&self) -> &'static str {
        "surrealdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockType;
    use serde_json::json;

    fn doc(id: &str) -> Block {
        Block::builder(BlockType::Document)
            .id(id)
            .workspace("ws")
            .build()
            .unwrap()
    }

    #[test]
    fn test_conflict_index_parses_marker() {
        assert_eq!(
            conflict_index("An error occurred: block_write_conflict:12"),
            Some(12)
        );
        assert_eq!(conflict_index("The query was not executed"), None);
    }

    #[test]
    fn test_batch_transaction_binds_every_write() {
        let mut batch = WriteBatch::new();
        batch.insert(doc("a"));
        batch.update(doc("b"), 3);
        let (sql, bindings) = SurrealStore::batch_transaction(&batch);

        assert!(sql.starts_with("BEGIN TRANSACTION;"));
        assert!(sql.ends_with("COMMIT TRANSACTION;"));
        assert!(sql.contains("CREATE type::thing(\"blocks\", $id0) CONTENT $b0"));
        assert!(sql.contains("WHERE version = $v1"));
        assert_eq!(bindings["id1"], json!("b"));
        assert_eq!(bindings["v1"], json!(3));
        assert_eq!(bindings["b0"]["uuid"], json!("a"));
        assert!(!bindings.contains_key("v0"));
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let store = SurrealStore::new_in_memory().await.unwrap();
        let mut batch = WriteBatch::new();
        batch.insert(doc("doc-1"));
        store.apply(batch).await.unwrap();

        let fetched = store.get_block("doc-1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "doc-1");
        assert_eq!(fetched.version, 1);
        assert_eq!(store.get_root_blocks("doc-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_update_is_a_conflict() {
        let store = SurrealStore::new_in_memory().await.unwrap();
        let mut batch = WriteBatch::new();
        batch.insert(doc("doc-1"));
        store.apply(batch).await.unwrap();

        let mut stale = WriteBatch::new();
        stale.update(doc("doc-1"), 7);
        let err = store.apply(stale).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::WriteConflict {
                actual_version: Some(1),
                ..
            }
        ));
    }
}
