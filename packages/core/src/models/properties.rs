//! Typed Block Properties
//!
//! `properties` are persisted as a raw JSON object. [`BlockProperties`] keeps that
//! object verbatim and parses only the fields known to the block's type into a
//! [`TypedProperties`] variant. Keys the current schema does not know about are
//! carried along untouched, so converting a block to another type can recover
//! fields the previous schema ignored.
//!
//! # Examples
//!
//! ```rust
//! use blockstore_core::models::{BlockProperties, BlockType, TypedProperties};
//! use serde_json::json;
//!
//! let props = BlockProperties::parse(BlockType::Heading, json!({"level": 2, "anchor": "intro"}))
//!     .unwrap();
//! assert_eq!(props.typed(), &TypedProperties::Heading { level: 2 });
//!
//! // The unknown "anchor" key survives untouched
//! assert_eq!(props.get("anchor"), Some(&json!("intro")));
//! ```

use crate::models::{BlockType, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Property key holding the list of group tags a block belongs to.
pub const GROUPS_KEY: &str = "groups";

const MIN_HEADING_LEVEL: u64 = 1;
const MAX_HEADING_LEVEL: u64 = 6;

/// Kind of secondary view a `group_index` block orders anchors for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupIndexKind {
    /// Page anchors produced from paginated sources
    Page,
    /// Chunk anchors produced for retrieval
    Chunk,
}

impl GroupIndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Chunk => "chunk",
        }
    }
}

impl FromStr for GroupIndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(Self::Page),
            "chunk" => Ok(Self::Chunk),
            _ => Err(format!("Invalid group index type: {}", s)),
        }
    }
}

/// Schema-checked view of the properties known to a block type
///
/// One variant per [`BlockType`]. Variants without fields carry no typed
/// properties beyond the shared `groups` list.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedProperties {
    Workspace {
        title: String,
    },
    Collection {
        title: String,
    },
    Document {
        title: Option<String>,
        category: Option<String>,
    },
    Dataset {
        dataset_type: Option<String>,
    },
    DerivedContentContainer {
        category: String,
    },
    Heading {
        level: u8,
    },
    Paragraph,
    BulletedListItem,
    NumberedListItem,
    Record,
    Quote,
    Code {
        language: Option<String>,
    },
    Table,
    Html,
    Object {
        category: Option<String>,
    },
    GroupIndex {
        kind: GroupIndexKind,
    },
    PageGroup {
        page_number: u32,
        title: Option<String>,
    },
    ChunkGroup {
        title: Option<String>,
    },
    Unsupported,
}

impl TypedProperties {
    /// Block type this variant belongs to
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Workspace { .. } => BlockType::Workspace,
            Self::Collection { .. } => BlockType::Collection,
            Self::Document { .. } => BlockType::Document,
            Self::Dataset { .. } => BlockType::Dataset,
            Self::DerivedContentContainer { .. } => BlockType::DerivedContentContainer,
            Self::Heading { .. } => BlockType::Heading,
            Self::Paragraph => BlockType::Paragraph,
            Self::BulletedListItem => BlockType::BulletedListItem,
            Self::NumberedListItem => BlockType::NumberedListItem,
            Self::Record => BlockType::Record,
            Self::Quote => BlockType::Quote,
            Self::Code { .. } => BlockType::Code,
            Self::Table => BlockType::Table,
            Self::Html => BlockType::Html,
            Self::Object { .. } => BlockType::Object,
            Self::GroupIndex { .. } => BlockType::GroupIndex,
            Self::PageGroup { .. } => BlockType::PageGroup,
            Self::ChunkGroup { .. } => BlockType::ChunkGroup,
            Self::Unsupported => BlockType::Unsupported,
        }
    }

    /// Human readable title, for the types that carry one
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Workspace { title } | Self::Collection { title } => Some(title),
            Self::Document { title, .. }
            | Self::PageGroup { title, .. }
            | Self::ChunkGroup { title } => title.as_deref(),
            _ => None,
        }
    }

    fn parse(block_type: BlockType, raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        let typed = match block_type {
            BlockType::Workspace => Self::Workspace {
                title: required_string(raw, "title")?,
            },
            BlockType::Collection => Self::Collection {
                title: required_string(raw, "title")?,
            },
            BlockType::Document => Self::Document {
                title: optional_string(raw, "title")?,
                category: optional_string(raw, "category")?,
            },
            BlockType::Dataset => Self::Dataset {
                dataset_type: optional_string(raw, "dataset_type")?,
            },
            BlockType::DerivedContentContainer => Self::DerivedContentContainer {
                category: required_string(raw, "category")?,
            },
            BlockType::Heading => {
                let level = required_integer(raw, "level")?;
                if !(MIN_HEADING_LEVEL..=MAX_HEADING_LEVEL).contains(&level) {
                    return Err(ValidationError::InvalidProperties(format!(
                        "heading level must be between {} and {}, got {}",
                        MIN_HEADING_LEVEL, MAX_HEADING_LEVEL, level
                    )));
                }
                Self::Heading { level: level as u8 }
            }
            BlockType::Paragraph => Self::Paragraph,
            BlockType::BulletedListItem => Self::BulletedListItem,
            BlockType::NumberedListItem => Self::NumberedListItem,
            BlockType::Record => Self::Record,
            BlockType::Quote => Self::Quote,
            BlockType::Code => Self::Code {
                language: optional_string(raw, "language")?,
            },
            BlockType::Table => Self::Table,
            BlockType::Html => Self::Html,
            BlockType::Object => Self::Object {
                category: optional_string(raw, "category")?,
            },
            BlockType::GroupIndex => {
                let kind = required_string(raw, "group_index_type")?;
                Self::GroupIndex {
                    kind: kind.parse().map_err(ValidationError::InvalidProperties)?,
                }
            }
            BlockType::PageGroup => {
                let page_number = required_integer(raw, "page_number")?;
                if page_number < 1 || page_number > u64::from(u32::MAX) {
                    return Err(ValidationError::InvalidProperties(format!(
                        "page_number must be a positive integer, got {}",
                        page_number
                    )));
                }
                Self::PageGroup {
                    page_number: page_number as u32,
                    title: optional_string(raw, "title")?,
                }
            }
            BlockType::ChunkGroup => Self::ChunkGroup {
                title: optional_string(raw, "title")?,
            },
            BlockType::Unsupported => Self::Unsupported,
        };
        Ok(typed)
    }
}

/// Raw properties object plus its parsed, type-specific view
#[derive(Debug, Clone, PartialEq)]
pub struct BlockProperties {
    raw: Map<String, Value>,
    typed: TypedProperties,
    groups: Vec<String>,
}

impl BlockProperties {
    /// Parse `raw` against the schema of `block_type`
    ///
    /// `null` is treated as an empty object. Any other non-object value is rejected.
    pub fn parse(block_type: BlockType, raw: Value) -> Result<Self, ValidationError> {
        let raw = match raw {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ValidationError::InvalidProperties(format!(
                    "properties must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        Self::from_map(block_type, raw)
    }

    fn from_map(block_type: BlockType, raw: Map<String, Value>) -> Result<Self, ValidationError> {
        let typed = TypedProperties::parse(block_type, &raw)?;
        let groups = parse_groups(&raw)?;
        Ok(Self { raw, typed, groups })
    }

    pub fn typed(&self) -> &TypedProperties {
        &self.typed
    }

    pub fn block_type(&self) -> BlockType {
        self.typed.block_type()
    }

    /// Group tags (`properties.groups`), empty when absent
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    /// Re-parse the preserved raw object under another type's schema
    pub fn convert(&self, block_type: BlockType) -> Result<Self, ValidationError> {
        Self::from_map(block_type, self.raw.clone())
    }

    /// Copy with `key` set to `value`, re-validated against the current type
    pub fn with_field(&self, key: &str, value: Value) -> Result<Self, ValidationError> {
        let mut raw = self.raw.clone();
        raw.insert(key.to_string(), value);
        Self::from_map(self.block_type(), raw)
    }
}

fn parse_groups(raw: &Map<String, Value>) -> Result<Vec<String>, ValidationError> {
    match raw.get(GROUPS_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(tag) if !tag.is_empty() => Ok(tag.clone()),
                other => Err(ValidationError::InvalidProperties(format!(
                    "groups must contain non-empty strings, found {}",
                    json_kind(other)
                ))),
            })
            .collect(),
        Some(other) => Err(ValidationError::InvalidProperties(format!(
            "groups must be an array, got {}",
            json_kind(other)
        ))),
    }
}

fn optional_string(raw: &Map<String, Value>, key: &str) -> Result<Option<String>, ValidationError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ValidationError::InvalidProperties(format!(
            "{} must be a string, got {}",
            key,
            json_kind(other)
        ))),
    }
}

fn required_string(raw: &Map<String, Value>, key: &str) -> Result<String, ValidationError> {
    optional_string(raw, key)?
        .ok_or_else(|| ValidationError::MissingField(format!("properties.{}", key)))
}

fn required_integer(raw: &Map<String, Value>, key: &str) -> Result<u64, ValidationError> {
    match raw.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(format!(
            "properties.{}",
            key
        ))),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            ValidationError::InvalidProperties(format!(
                "{} must be a non-negative integer, got {}",
                key, n
            ))
        }),
        Some(other) => Err(ValidationError::InvalidProperties(format!(
            "{} must be an integer, got {}",
            key,
            json_kind(other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
