//! Database introspection and DDL generation engine.
//!
//! One async contract over four SQL dialects (MySQL, PostgreSQL,
//! SQL Server, Oracle): connect, run queries and transactions, walk the
//! catalog (schemas, tables, columns, indexes) and generate CREATE TABLE
//! scripts. Named connections live in a [`ConnectionRegistry`]; per-dialect
//! behavior sits behind the [`Adapter`] trait.

pub mod db;
pub mod error;
pub mod models;
pub mod validate;

pub use db::adapter::Adapter;
pub use db::adapters::AnyAdapter;
pub use db::builder::SqlBuilder;
pub use db::factory;
pub use db::registry::{ConnectionRegistry, Connector, DialectConnector};
pub use error::{DbError, DbResult};
pub use models::{ConnectionConfig, DatabaseType, DialectOptions, QueryParam, QueryResult};
