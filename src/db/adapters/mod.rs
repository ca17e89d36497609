//! Dialect adapter implementations.
//!
//! Each submodule owns the native driver stack for one dialect and implements
//! the [`Adapter`] contract on top of it. [`AnyAdapter`] is the closed sum of
//! all four, so callers hold a single concrete type no matter which engine a
//! connection points at.

pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;

pub use mssql::SqlServerAdapter;
pub use mysql::MySqlAdapter;
pub use oracle::OracleAdapter;
pub use postgres::PostgresAdapter;

use async_trait::async_trait;

use crate::db::adapter::Adapter;
use crate::db::builder::SqlBuilder;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, DatabaseType, IndexInfo, QueryParam, QueryResult, ServerStats};

/// Generates match arms over every [`AnyAdapter`] variant.
macro_rules! dispatch_adapter {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            AnyAdapter::MySql($a) => $body,
            AnyAdapter::Postgres($a) => $body,
            AnyAdapter::SqlServer($a) => $body,
            AnyAdapter::Oracle($a) => $body,
        }
    };
}

/// One adapter per supported dialect, behind a single concrete type.
#[derive(Debug, Clone)]
pub enum AnyAdapter {
    MySql(MySqlAdapter),
    Postgres(PostgresAdapter),
    SqlServer(SqlServerAdapter),
    Oracle(OracleAdapter),
}

#[async_trait]
impl Adapter for AnyAdapter {
    fn connection_id(&self) -> &str {
        dispatch_adapter!(self, a => a.connection_id())
    }

    fn database_type(&self) -> DatabaseType {
        dispatch_adapter!(self, a => a.database_type())
    }

    fn builder(&self) -> &dyn SqlBuilder {
        dispatch_adapter!(self, a => a.builder())
    }

    async fn disconnect(&self) -> DbResult<()> {
        dispatch_adapter!(self, a => a.disconnect().await)
    }

    fn is_connected(&self) -> bool {
        dispatch_adapter!(self, a => a.is_connected())
    }

    async fn ping(&self) -> bool {
        dispatch_adapter!(self, a => a.ping().await)
    }

    async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        dispatch_adapter!(self, a => a.execute_query(sql, params).await)
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<u64> {
        dispatch_adapter!(self, a => a.execute_transaction(statements).await)
    }

    async fn native_table_ddl(&self, schema: &str, table: &str) -> DbResult<Option<String>> {
        dispatch_adapter!(self, a => a.native_table_ddl(schema, table).await)
    }

    fn build_create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        indexes: &[IndexInfo],
    ) -> String {
        dispatch_adapter!(self, a => a.build_create_table(schema, table, columns, indexes))
    }

    fn transform_server_stats(&self, pairs: &[(String, String)]) -> ServerStats {
        dispatch_adapter!(self, a => a.transform_server_stats(pairs))
    }
}

/// Positional placeholder syntax of a native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaceholderStyle {
    /// PostgreSQL `$1`, `$2`, ...
    Dollar,
    /// SQL Server `@P1`, `@P2`, ...
    AtP,
    /// Oracle `:1`, `:2`, ...
    Colon,
}

/// Rewrites `?` placeholders into the driver's numbered syntax.
///
/// Question marks inside single-quoted literals (including `''` escapes) and
/// double-quoted identifiers are left untouched.
pub(crate) fn number_placeholders(sql: &str, style: PlaceholderStyle) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut ordinal = 0usize;
    let mut in_single = false;
    let mut in_double = false;
    for ch in sql.chars() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                out.push(ch);
            }
            '"' if !in_single => {
                in_double = !in_double;
                out.push(ch);
            }
            '?' if !in_single && !in_double => {
                ordinal += 1;
                match style {
                    PlaceholderStyle::Dollar => out.push_str(&format!("${}", ordinal)),
                    PlaceholderStyle::AtP => out.push_str(&format!("@P{}", ordinal)),
                    PlaceholderStyle::Colon => out.push_str(&format!(":{}", ordinal)),
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Builds the connection-failure error reported when a driver cannot reach or
/// authenticate against the server.
pub(crate) fn connect_error(
    dialect: DatabaseType,
    host: &str,
    port: u16,
    raw: impl std::fmt::Display,
) -> DbError {
    let raw = raw.to_string();
    let suggestion = crate::error::connection_suggestion(&raw);
    DbError::connection(
        format!(
            "Failed to connect to {} at {}:{}: {}",
            dialect.display_name(),
            host,
            port,
            raw
        ),
        suggestion,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_placeholders_postgres() {
        assert_eq!(
            number_placeholders(
                "SELECT * FROM t WHERE a = ? AND b = ?",
                PlaceholderStyle::Dollar
            ),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn test_number_placeholders_skips_quoted_literals() {
        assert_eq!(
            number_placeholders("SELECT 'a?b' FROM t WHERE c = ?", PlaceholderStyle::AtP),
            "SELECT 'a?b' FROM t WHERE c = @P1"
        );
        assert_eq!(
            number_placeholders(
                "SELECT 'it''s?' FROM t WHERE c = ?",
                PlaceholderStyle::Colon
            ),
            "SELECT 'it''s?' FROM t WHERE c = :1"
        );
    }

    #[test]
    fn test_number_placeholders_skips_quoted_identifiers() {
        assert_eq!(
            number_placeholders(
                "SELECT \"col?\" FROM t WHERE x = ?",
                PlaceholderStyle::Dollar
            ),
            "SELECT \"col?\" FROM t WHERE x = $1"
        );
    }

    #[test]
    fn test_connect_error_carries_suggestion() {
        let err = connect_error(
            DatabaseType::Postgres,
            "db.example.com",
            5432,
            "connection refused",
        );
        assert!(err.to_string().contains("db.example.com:5432"));
        assert!(err.suggestion().is_some());
    }
}
