//! Catalog object models.
//!
//! These types describe what introspection returns: schemas, tables,
//! columns, indexes and the statistics attached to them. Every dialect
//! adapter maps its catalog rows into these shapes, so the fields carry the
//! union of what the four engines can report; anything a dialect cannot
//! provide stays `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A schema (namespace) on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_collation: Option<String>,
}

impl SchemaInfo {
    /// Create a schema entry with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            default_charset: None,
            default_collation: None,
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Kind of relation a table entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableType {
    #[serde(rename = "TABLE")]
    Table,
    #[serde(rename = "VIEW")]
    View,
    #[serde(rename = "SYSTEM TABLE")]
    SystemTable,
}

impl TableType {
    /// Parse a catalog type string. Unknown strings map to `Table`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "VIEW" | "V" => Self::View,
            "SYSTEM TABLE" | "SYSTEM VIEW" | "S" => Self::SystemTable,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::SystemTable => "SYSTEM TABLE",
        };
        write!(f, "{}", s)
    }
}

/// A table or view, with whatever statistics the catalog reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub schema: String,
    pub table_type: TableType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Bytes (excluding indexes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_size: Option<u64>,
    /// Bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_size: Option<u64>,
    /// Bytes (data + indexes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableInfo {
    /// Create a new table entry.
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            table_type: TableType::Table,
            row_count: None,
            data_size: None,
            index_size: None,
            total_size: None,
            created: None,
            modified: None,
            comment: None,
        }
    }

    /// Set the table type.
    pub fn with_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    /// Set the estimated row count.
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// One column of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Raw catalog type name (e.g. `varchar`, `NUMBER`, `nvarchar`)
    pub data_type: String,
    /// Declared length for sized character/binary types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    pub is_nullable: bool,
    /// Default expression as the catalog stores it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_identity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_increment: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// 1-based position within the table
    pub ordinal_position: u32,
}

impl ColumnInfo {
    /// Create a column with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: None,
            precision: None,
            scale: None,
            is_nullable: true,
            default_value: None,
            is_primary_key: false,
            is_unique: false,
            is_identity: false,
            identity_seed: None,
            identity_increment: None,
            comment: None,
            ordinal_position: 0,
        }
    }

    /// Set the maximum length.
    pub fn with_max_length(mut self, len: i64) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Set precision and scale.
    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    /// Mark this column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    /// Mark this column as identity / auto-increment.
    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the ordinal position.
    pub fn at_position(mut self, ordinal: u32) -> Self {
        self.ordinal_position = ordinal;
        self
    }
}

/// Kind of index. Catalog strings outside this set fall back to `Index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexType {
    Primary,
    Unique,
    Index,
    Fulltext,
    Spatial,
    Bitmap,
}

impl IndexType {
    /// Parse a catalog index-type string.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PRIMARY" => Self::Primary,
            "UNIQUE" => Self::Unique,
            "FULLTEXT" => Self::Fulltext,
            "SPATIAL" => Self::Spatial,
            "BITMAP" => Self::Bitmap,
            _ => Self::Index,
        }
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primary => "PRIMARY",
            Self::Unique => "UNIQUE",
            Self::Index => "INDEX",
            Self::Fulltext => "FULLTEXT",
            Self::Spatial => "SPATIAL",
            Self::Bitmap => "BITMAP",
        };
        write!(f, "{}", s)
    }
}

/// An index with its columns in key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub table_name: String,
    pub schema_name: String,
    pub index_type: IndexType,
    /// Column names ordered by their position in the key
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_clustered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<u64>,
    /// Index size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl IndexInfo {
    /// Create an index entry.
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        schema_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            schema_name: schema_name.into(),
            index_type: IndexType::Index,
            columns: Vec::new(),
            is_unique: false,
            is_primary: false,
            is_clustered: None,
            cardinality: None,
            size: None,
            comment: None,
        }
    }

    /// Set the index type, updating the derived flags.
    pub fn with_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        if index_type == IndexType::Primary {
            self.is_primary = true;
            self.is_unique = true;
        } else if index_type == IndexType::Unique {
            self.is_unique = true;
        }
        self
    }

    /// Set the column list.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }
}

/// Statistics for a single table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    pub table_name: String,
    pub schema_name: String,
    pub row_count: u64,
    pub data_size: u64,
    pub index_size: u64,
    pub total_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_row_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analyzed: Option<DateTime<Utc>>,
    /// Next auto-increment / identity value, where the engine exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<u64>,
}

/// Server-wide statistics in a dialect-independent shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerStats {
    /// Seconds since server start
    pub uptime_secs: u64,
    pub version: String,
    pub current_connections: u64,
    pub max_connections: u64,
    pub total_queries: u64,
    pub slow_queries: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads_running: Option<u64>,
    /// Raw name/value metrics the transform did not fold into a field
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional: Map<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_type_parse() {
        assert_eq!(TableType::parse("VIEW"), TableType::View);
        assert_eq!(TableType::parse("view"), TableType::View);
        assert_eq!(TableType::parse("BASE TABLE"), TableType::Table);
        assert_eq!(TableType::parse("SYSTEM TABLE"), TableType::SystemTable);
        assert_eq!(TableType::parse("whatever"), TableType::Table);
    }

    #[test]
    fn test_table_type_display() {
        assert_eq!(TableType::SystemTable.to_string(), "SYSTEM TABLE");
        assert_eq!(TableType::Table.to_string(), "TABLE");
    }

    #[test]
    fn test_index_type_parse_fallback() {
        assert_eq!(IndexType::parse("PRIMARY"), IndexType::Primary);
        assert_eq!(IndexType::parse("bitmap"), IndexType::Bitmap);
        assert_eq!(IndexType::parse("XML"), IndexType::Index);
        assert_eq!(IndexType::parse("COLUMNSTORE"), IndexType::Index);
    }

    #[test]
    fn test_index_with_type_sets_flags() {
        let idx = IndexInfo::new("pk_orders", "orders", "shop").with_type(IndexType::Primary);
        assert!(idx.is_primary);
        assert!(idx.is_unique);

        let idx = IndexInfo::new("uq_email", "users", "app").with_type(IndexType::Unique);
        assert!(!idx.is_primary);
        assert!(idx.is_unique);
    }

    #[test]
    fn test_column_builder() {
        let col = ColumnInfo::new("id", "int")
            .primary_key()
            .identity()
            .at_position(1);
        assert!(col.is_primary_key);
        assert!(col.is_identity);
        assert!(!col.is_nullable);
        assert_eq!(col.ordinal_position, 1);
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let table = TableInfo::new("orders", "shop");
        let json = serde_json::to_string(&table).unwrap();
        assert!(!json.contains("row_count"));
        assert!(!json.contains("comment"));
        assert!(json.contains("\"table_type\":\"TABLE\""));
    }
}
