//! Database access layer.
//!
//! This module provides everything between a connection configuration and
//! rows coming back:
//! - Connection registry with default-connection resolution
//! - One adapter per dialect over the native driver stacks
//! - Per-dialect SQL builders for catalog introspection
//! - CREATE TABLE assembly from catalog metadata
//! - Driver row decoding into JSON values

pub mod adapter;
pub mod adapters;
pub mod builder;
pub(crate) mod ddl;
pub(crate) mod decode;
pub mod factory;
pub mod registry;

pub use adapter::Adapter;
pub use adapters::{AnyAdapter, MySqlAdapter, OracleAdapter, PostgresAdapter, SqlServerAdapter};
pub use builder::{MySqlBuilder, OracleBuilder, PostgresBuilder, SqlBuilder, SqlServerBuilder};
pub use registry::{ConnectionRegistry, Connector, DialectConnector};
