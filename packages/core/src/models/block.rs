//! Block Data Structures
//!
//! This module defines the universal [`Block`] record and its construction-time
//! validation.
//!
//! # Architecture
//!
//! - **Universal Block**: one struct represents documents, headings, records, group anchors
//! - **Typed properties**: `properties` parsed per [`BlockType`], unknown keys preserved
//! - **Open metadata**: `metadata` is an unvalidated JSON object
//! - **Parent-owned ordering**: only `children_ids` orders siblings; children never store an index
//!
//! # Examples
//!
//! ```rust
//! use blockstore_core::models::{Block, BlockType};
//! use serde_json::json;
//!
//! let doc = Block::builder(BlockType::Document)
//!     .id("doc-1")
//!     .workspace("ws-1")
//!     .property("title", json!("Quarterly report"))
//!     .build()
//!     .unwrap();
//! assert!(doc.is_root());
//! assert_eq!(doc.root_id, "doc-1");
//!
//! let heading = Block::builder(BlockType::Heading)
//!     .id("h-1")
//!     .workspace("ws-1")
//!     .parent("doc-1")
//!     .root("doc-1")
//!     .property("level", json!(2))
//!     .plain_text("Summary")
//!     .build()
//!     .unwrap();
//! assert_eq!(heading.parent_id.as_deref(), Some("doc-1"));
//! ```

use crate::models::properties::{json_kind, BlockProperties, TypedProperties, GROUPS_KEY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Version assigned to newly constructed blocks
pub const INITIAL_VERSION: i64 = 1;

/// Keys a `content` payload may carry
pub const CONTENT_KEYS: [&str; 3] = ["plain_text", "object", "data"];

fn default_version() -> i64 {
    INITIAL_VERSION
}

/// Validation errors raised while constructing or re-checking a block
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid block type: {0}")]
    InvalidBlockType(String),

    #[error("Invalid block ID: {0}")]
    InvalidId(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid root reference: {0}")]
    InvalidRoot(String),

    #[error("Invalid children list: {0}")]
    InvalidChildren(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),

    #[error("Content validation failed: {0}")]
    InvalidContent(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(i64),

    #[error("Invalid timestamp for {field}: {value}")]
    InvalidTimestamp { field: String, value: String },
}

/// Discriminator selecting a block's property schema and content rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Workspace,
    Collection,
    Document,
    Dataset,
    DerivedContentContainer,
    Heading,
    Paragraph,
    BulletedListItem,
    NumberedListItem,
    Record,
    Quote,
    Code,
    Table,
    Html,
    Object,
    GroupIndex,
    PageGroup,
    ChunkGroup,
    Unsupported,
}

impl BlockType {
    pub const ALL: [BlockType; 19] = [
        Self::Workspace,
        Self::Collection,
        Self::Document,
        Self::Dataset,
        Self::DerivedContentContainer,
        Self::Heading,
        Self::Paragraph,
        Self::BulletedListItem,
        Self::NumberedListItem,
        Self::Record,
        Self::Quote,
        Self::Code,
        Self::Table,
        Self::Html,
        Self::Object,
        Self::GroupIndex,
        Self::PageGroup,
        Self::ChunkGroup,
        Self::Unsupported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Collection => "collection",
            Self::Document => "document",
            Self::Dataset => "dataset",
            Self::DerivedContentContainer => "derived_content_container",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::BulletedListItem => "bulleted_list_item",
            Self::NumberedListItem => "numbered_list_item",
            Self::Record => "record",
            Self::Quote => "quote",
            Self::Code => "code",
            Self::Table => "table",
            Self::Html => "html",
            Self::Object => "object",
            Self::GroupIndex => "group_index",
            Self::PageGroup => "page_group",
            Self::ChunkGroup => "chunk_group",
            Self::Unsupported => "unsupported",
        }
    }

    /// Page and chunk anchors exist to be referenced by tag
    pub fn is_group_anchor(&self) -> bool {
        matches!(self, Self::PageGroup | Self::ChunkGroup)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidBlockType(s.to_string()))
    }
}

/// Keyed content payload. No key is required to be present on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl Content {
    pub fn text(plain_text: impl Into<String>) -> Self {
        Self {
            plain_text: Some(plain_text.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plain_text.is_none() && self.object.is_none() && self.data.is_none()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse a persisted content document
    pub fn from_value(value: Value) -> Result<Option<Self>, ValidationError> {
        match value {
            Value::Null => Ok(None),
            Value::Object(_) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ValidationError::InvalidContent(e.to_string())),
            other => Err(ValidationError::InvalidContent(format!(
                "content must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Universal node of the canonical content tree.
///
/// # Fields
///
/// - `id`: unique identifier (UUID v4 unless supplied)
/// - `workspace_id`: tenant scope
/// - `root_id`: canonical root ancestor, the block itself for roots
/// - `parent_id`: single canonical parent, `None` only for roots
/// - `children_ids`: ordered child ids, owned by this block
/// - `in_trash`: soft-delete flag, flipped for whole subtrees at once
/// - `version`: optimistic concurrency counter
/// - `properties`: typed per [`BlockType`], see [`BlockProperties`]
/// - `metadata`: open annotations
/// - `content`: optional plain text / object / data payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord", into = "BlockRecord")]
pub struct Block {
    pub id: String,
    block_type: BlockType,
    pub workspace_id: String,
    pub root_id: String,
    pub parent_id: Option<String>,
    pub children_ids: Vec<String>,
    pub in_trash: bool,
    pub version: i64,
    properties: BlockProperties,
    pub metadata: Map<String, Value>,
    pub content: Option<Content>,
    pub properties_version: Option<i64>,
    pub created_time: DateTime<Utc>,
    pub last_edited_time: DateTime<Utc>,
    pub created_by: Option<String>,
    pub last_edited_by: Option<String>,
}

impl Block {
    /// Start building a block of the given type
    pub fn builder(block_type: BlockType) -> BlockBuilder {
        BlockBuilder::new(block_type)
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn properties(&self) -> &BlockProperties {
        &self.properties
    }

    pub fn typed_properties(&self) -> &TypedProperties {
        self.properties.typed()
    }

    /// Group tags this block is a member of
    pub fn groups(&self) -> &[String] {
        self.properties.groups()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn plain_text(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.plain_text.as_deref())
    }

    /// Replace the properties object, re-validated against the current type
    pub fn set_properties(&mut self, raw: Value) -> Result<(), ValidationError> {
        self.properties = BlockProperties::parse(self.block_type, raw)?;
        Ok(())
    }

    /// Set one property key, re-validated against the current type
    pub fn set_property(&mut self, key: &str, value: Value) -> Result<(), ValidationError> {
        self.properties = self.properties.with_field(key, value)?;
        Ok(())
    }

    /// Return a copy of this block converted to `block_type`
    ///
    /// The raw properties object is re-parsed under the new schema, so keys the
    /// old type ignored become available again.
    pub fn convert_type(&self, block_type: BlockType) -> Result<Block, ValidationError> {
        let mut converted = self.clone();
        converted.properties = self.properties.convert(block_type)?;
        converted.block_type = block_type;
        converted.validate()?;
        Ok(converted)
    }

    /// Advance the version and edit timestamp for a successful mutation
    pub fn touch(&mut self) {
        self.version += 1;
        self.last_edited_time = Utc::now();
    }

    /// Re-check every construction rule against the current field values
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.workspace_id.is_empty() {
            return Err(ValidationError::MissingField("workspace_id".to_string()));
        }

        if self.root_id.is_empty() {
            return Err(ValidationError::MissingField("root_id".to_string()));
        }

        if self.properties.block_type() != self.block_type {
            return Err(ValidationError::InvalidProperties(format!(
                "properties were parsed for {} but block is {}",
                self.properties.block_type(),
                self.block_type
            )));
        }

        match &self.parent_id {
            Some(parent_id) if parent_id.is_empty() => {
                return Err(ValidationError::InvalidParent(
                    "parent_id cannot be empty".to_string(),
                ));
            }
            Some(parent_id) if parent_id == &self.id => {
                return Err(ValidationError::InvalidParent(
                    "Block cannot be its own parent".to_string(),
                ));
            }
            Some(_) if self.root_id == self.id => {
                return Err(ValidationError::InvalidRoot(
                    "Block with a parent cannot be its own root".to_string(),
                ));
            }
            None if self.root_id != self.id => {
                return Err(ValidationError::InvalidRoot(format!(
                    "Root block {} must reference itself as root, found {}",
                    self.id, self.root_id
                )));
            }
            _ => {}
        }

        let mut seen = HashSet::with_capacity(self.children_ids.len());
        for child_id in &self.children_ids {
            if child_id.is_empty() {
                return Err(ValidationError::InvalidChildren(
                    "child id cannot be empty".to_string(),
                ));
            }
            if child_id == &self.id {
                return Err(ValidationError::InvalidChildren(
                    "Block cannot list itself as a child".to_string(),
                ));
            }
            if !seen.insert(child_id.as_str()) {
                return Err(ValidationError::InvalidChildren(format!(
                    "duplicate child id {}",
                    child_id
                )));
            }
        }

        if self.version < 0 {
            return Err(ValidationError::InvalidVersion(self.version));
        }

        if self.block_type == BlockType::Record
            && self.content.as_ref().and_then(|c| c.data.as_ref()).is_none()
        {
            return Err(ValidationError::MissingField("content.data".to_string()));
        }

        Ok(())
    }
}

/// Builder for [`Block`], validated on [`BlockBuilder::build`]
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    block_type: BlockType,
    id: Option<String>,
    workspace_id: Option<String>,
    root_id: Option<String>,
    parent_id: Option<String>,
    children_ids: Vec<String>,
    in_trash: bool,
    version: i64,
    properties: Map<String, Value>,
    metadata: Map<String, Value>,
    content: Option<Content>,
    properties_version: Option<i64>,
    created_by: Option<String>,
}

impl BlockBuilder {
    fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            id: None,
            workspace_id: None,
            root_id: None,
            parent_id: None,
            children_ids: Vec::new(),
            in_trash: false,
            version: INITIAL_VERSION,
            properties: Map::new(),
            metadata: Map::new(),
            content: None,
            properties_version: None,
            created_by: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children_ids = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_trash(mut self, in_trash: bool) -> Self {
        self.in_trash = in_trash;
        self
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Replace the whole properties object. Non-object values are ignored.
    pub fn properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.properties = map;
        }
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = groups
            .into_iter()
            .map(|g| Value::String(g.into()))
            .collect();
        self.properties
            .insert(GROUPS_KEY.to_string(), Value::Array(tags));
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    pub fn plain_text(mut self, text: impl Into<String>) -> Self {
        self.content.get_or_insert_with(Content::default).plain_text = Some(text.into());
        self
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.content.get_or_insert_with(Content::default).data = Some(data);
        self
    }

    pub fn object(mut self, object: Map<String, Value>) -> Self {
        self.content.get_or_insert_with(Content::default).object = Some(object);
        self
    }

    pub fn properties_version(mut self, version: i64) -> Self {
        self.properties_version = Some(version);
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    /// Validate and produce the block
    ///
    /// Defaults: a fresh UUID v4 id, `root_id = id` for parentless blocks, and
    /// `workspace_id = id` for workspace blocks.
    pub fn build(self) -> Result<Block, ValidationError> {
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let root_id = match (self.root_id, &self.parent_id) {
            (Some(root_id), _) => root_id,
            (None, None) => id.clone(),
            (None, Some(_)) => return Err(ValidationError::MissingField("root_id".to_string())),
        };

        let workspace_id = match self.workspace_id {
            Some(workspace_id) => workspace_id,
            None if self.block_type == BlockType::Workspace => id.clone(),
            None => return Err(ValidationError::MissingField("workspace_id".to_string())),
        };

        let properties = BlockProperties::parse(self.block_type, Value::Object(self.properties))?;
        let now = Utc::now();

        let block = Block {
            id,
            block_type: self.block_type,
            workspace_id,
            root_id,
            parent_id: self.parent_id,
            children_ids: self.children_ids,
            in_trash: self.in_trash,
            version: self.version,
            properties,
            metadata: self.metadata,
            content: self.content,
            properties_version: self.properties_version,
            created_time: now,
            last_edited_time: now,
            created_by: self.created_by.clone(),
            last_edited_by: self.created_by,
        };
        block.validate()?;
        Ok(block)
    }
}

/// Flat, serializable form of a [`Block`]
///
/// This is the persisted row shape and the JSON shape used by fixtures.
/// `properties`, `metadata` and `content` stay as schemaless JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub workspace_id: String,
    pub root_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub properties_version: Option<i64>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub last_edited_by: Option<String>,
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        BlockRecord {
            id: block.id,
            block_type: block.block_type.as_str().to_string(),
            workspace_id: block.workspace_id,
            root_id: block.root_id,
            parent_id: block.parent_id,
            children_ids: block.children_ids,
            in_trash: block.in_trash,
            version: block.version,
            properties: block.properties.to_value(),
            metadata: Value::Object(block.metadata),
            content: block.content.map(|c| c.to_value()),
            properties_version: block.properties_version,
            created_time: Some(block.created_time.to_rfc3339()),
            last_edited_time: Some(block.last_edited_time.to_rfc3339()),
            created_by: block.created_by,
            last_edited_by: block.last_edited_by,
        }
    }
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        BlockRecord::from(block.clone())
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = ValidationError;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        let block_type: BlockType = record.block_type.parse()?;
        let properties = BlockProperties::parse(block_type, record.properties)?;
        let metadata = match record.metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ValidationError::InvalidProperties(format!(
                    "metadata must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        let content = match record.content {
            Some(value) => Content::from_value(value)?,
            None => None,
        };
        let now = Utc::now();
        let created_time = parse_timestamp("created_time", record.created_time.as_deref(), now)?;
        let last_edited_time = parse_timestamp(
            "last_edited_time",
            record.last_edited_time.as_deref(),
            created_time,
        )?;

        let block = Block {
            id: record.id,
            block_type,
            workspace_id: record.workspace_id,
            root_id: record.root_id,
            parent_id: record.parent_id,
            children_ids: record.children_ids,
            in_trash: record.in_trash,
            version: record.version,
            properties,
            metadata,
            content,
            properties_version: record.properties_version,
            created_time,
            last_edited_time,
            created_by: record.created_by,
            last_edited_by: record.last_edited_by,
        };
        block.validate()?;
        Ok(block)
    }
}

fn parse_timestamp(
    field: &str,
    value: Option<&str>,
    fallback: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    match value {
        None => Ok(fallback),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ValidationError::InvalidTimestamp {
                field: field.to_string(),
                value: raw.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paragraph(id: &str) -> BlockBuilder {
        Block::builder(BlockType::Paragraph)
            .id(id)
            .workspace("ws")
            .parent("doc")
            .root("doc")
    }

    #[test]
    fn test_root_defaults() {
        let doc = Block::builder(BlockType::Document)
            .workspace("ws")
            .build()
            .unwrap();
        assert_eq!(doc.root_id, doc.id);
        assert!(doc.is_root());
        assert_eq!(doc.version, INITIAL_VERSION);
        assert!(Uuid::parse_str(&doc.id).is_ok());
    }

    #[test]
    fn test_workspace_scopes_itself() {
        let ws = Block::builder(BlockType::Workspace)
            .id("ws-1")
            .property("title", json!("Acme"))
            .build()
            .unwrap();
        assert_eq!(ws.workspace_id, "ws-1");
    }

    #[test]
    fn test_child_requires_root() {
        let err = Block::builder(BlockType::Paragraph)
            .workspace("ws")
            .parent("doc")
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("root_id".to_string()));
    }

    #[test]
    fn test_heading_without_level_fails() {
        let err = Block::builder(BlockType::Heading)
            .workspace("ws")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField(_)));
    }

    #[test]
    fn test_record_requires_data() {
        let err = Block::builder(BlockType::Record)
            .workspace("ws")
            .plain_text("row")
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("content.data".to_string()));

        let mut data = Map::new();
        data.insert("revenue".to_string(), json!(42));
        let record = Block::builder(BlockType::Record)
            .workspace("ws")
            .data(data)
            .build()
            .unwrap();
        assert!(record.content.unwrap().data.is_some());
    }

    #[test]
    fn test_structural_rules() {
        assert!(paragraph("p").parent("p").build().is_err());
        assert!(paragraph("p").root("p").build().is_err());
        assert!(paragraph("p").children(["c", "c"]).build().is_err());
        assert!(paragraph("p").children(["p"]).build().is_err());
        assert!(Block::builder(BlockType::Document)
            .id("d")
            .workspace("ws")
            .root("other")
            .build()
            .is_err());
    }

    #[test]
    fn test_block_type_round_trip_names() {
        for block_type in BlockType::ALL {
            assert_eq!(block_type.as_str().parse::<BlockType>().unwrap(), block_type);
        }
        assert!("slide".parse::<BlockType>().is_err());
        assert!(BlockType::PageGroup.is_group_anchor());
        assert!(!BlockType::GroupIndex.is_group_anchor());
    }

    #[test]
    fn test_json_shape() {
        let block = paragraph("p-1")
            .groups(["page-1"])
            .plain_text("hello")
            .metadata("source", json!("pdf"))
            .build()
            .unwrap();

        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], json!("paragraph"));
        assert_eq!(value["properties"]["groups"], json!(["page-1"]));
        assert_eq!(value["content"], json!({"plain_text": "hello"}));
        assert_eq!(value["metadata"]["source"], json!("pdf"));

        let back: Block = serde_json::from_value(value).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_invalid_record_rejected_on_deserialize() {
        let value = json!({
            "id": "h",
            "type": "heading",
            "workspace_id": "ws",
            "root_id": "h",
            "properties": {}
        });
        assert!(serde_json::from_value::<Block>(value).is_err());
    }

    #[test]
    fn test_convert_type() {
        let block = paragraph("p")
            .property("level", json!(3))
            .build()
            .unwrap();
        let heading = block.convert_type(BlockType::Heading).unwrap();
        assert_eq!(heading.block_type(), BlockType::Heading);
        assert_eq!(heading.typed_properties(), &TypedProperties::Heading { level: 3 });

        let back = heading.convert_type(BlockType::Paragraph).unwrap();
        assert_eq!(back.properties().get("level"), Some(&json!(3)));

        // Records need a data payload the paragraph does not have
        assert!(block.convert_type(BlockType::Record).is_err());
    }

    #[test]
    fn test_set_property_revalidates() {
        let mut heading = Block::builder(BlockType::Heading)
            .workspace("ws")
            .property("level", json!(1))
            .build()
            .unwrap();
        assert!(heading.set_property("level", json!(9)).is_err());
        assert_eq!(heading.typed_properties(), &TypedProperties::Heading { level: 1 });
        heading.set_property("level", json!(5)).unwrap();
        assert_eq!(heading.typed_properties(), &TypedProperties::Heading { level: 5 });
    }
}
