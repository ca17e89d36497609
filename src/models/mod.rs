//! Data models shared across the crate.
//!
//! This module re-exports all model types used throughout the engine.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionInfo, ConnectionSummary, DatabaseType, DialectOptions,
    MySqlOptions, OracleOptions, PoolOptions, PostgresOptions, SqlServerOptions,
};
pub use query::{ColumnMetadata, QueryParam, QueryResult};
pub use schema::{
    ColumnInfo, IndexInfo, IndexType, SchemaInfo, ServerStats, TableInfo, TableStats, TableType,
};
