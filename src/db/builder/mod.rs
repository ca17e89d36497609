//! Per-dialect SQL generation.
//!
//! Each dialect has one stateless builder that turns catalog requests into
//! SQL text. Builders never touch the network; the adapter layer runs what
//! they produce. Identifier escaping, system-schema exclusion lists and the
//! formatting rules for types and defaults live here.

pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;

pub use mssql::SqlServerBuilder;
pub use mysql::MySqlBuilder;
pub use oracle::OracleBuilder;
pub use postgres::PostgresBuilder;

use crate::models::ColumnInfo;

/// SQL text generation for one dialect.
///
/// Implementations are pure: the same inputs always produce the same SQL,
/// and nothing here performs I/O. Index queries return one row per index
/// column (ordered by index name, then key position); grouping into
/// multi-column indexes happens in the adapter layer.
pub trait SqlBuilder: Send + Sync {
    /// Quote an identifier for this dialect, doubling embedded quote
    /// characters.
    fn escape_identifier(&self, ident: &str) -> String;

    /// List user schemas, excluding the dialect's system namespaces.
    fn schema_list_query(&self) -> String;

    /// List tables in a schema.
    fn table_list_query(&self, schema: &str) -> String;

    /// List tables in a schema whose names match a glob pattern
    /// (`*` and `?` wildcards).
    fn table_list_by_pattern_query(&self, schema: &str, pattern: &str) -> String;

    /// Describe the columns of a table.
    fn column_info_query(&self, schema: &str, table: &str) -> String;

    /// Describe the indexes of a table, one row per index column.
    fn index_info_query(&self, schema: &str, table: &str) -> String;

    /// Fetch statistics for a table.
    fn table_stats_query(&self, schema: &str, table: &str) -> String;

    /// Native DDL lookup for a table, where the dialect has one.
    fn table_ddl_query(&self, schema: &str, table: &str) -> String;

    /// Server statistics as name/value rows.
    fn server_stats_query(&self) -> String;

    /// Server version string.
    fn version_query(&self) -> String;

    /// Render a column's data type for DDL output.
    fn format_data_type(&self, column: &ColumnInfo) -> String;

    /// Render a `DEFAULT ...` clause for DDL output, or an empty string
    /// when the raw default should not be emitted.
    fn format_default_value(&self, default: &str, data_type: &str) -> String;

    /// Fully qualified, escaped `schema.table` reference.
    fn qualified_name(&self, schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.escape_identifier(schema),
            self.escape_identifier(table)
        )
    }
}

/// Translate a glob pattern to a SQL LIKE pattern.
///
/// `*` becomes `%` and `?` becomes `_`. The translation is identical for
/// every dialect.
pub(crate) fn glob_to_like(pattern: &str) -> String {
    pattern.replace('*', "%").replace('?', "_")
}

/// Quote a string literal for interpolation into catalog SQL, doubling
/// embedded single quotes.
pub(crate) fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_like() {
        assert_eq!(glob_to_like("user_*"), "user_%");
        assert_eq!(glob_to_like("a?c"), "a_c");
        assert_eq!(glob_to_like("*tmp?*"), "%tmp_%");
        assert_eq!(glob_to_like("orders"), "orders");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("o'brien"), "o''brien");
        assert_eq!(quote_literal("plain"), "plain");
    }

    #[test]
    fn test_glob_translation_identical_across_dialects() {
        let builders: [&dyn SqlBuilder; 4] = [
            &MySqlBuilder,
            &PostgresBuilder,
            &SqlServerBuilder,
            &OracleBuilder,
        ];
        for builder in builders {
            let sql = builder.table_list_by_pattern_query("app", "user_*");
            assert!(
                sql.contains("user_%"),
                "pattern not translated in: {}",
                sql
            );
            let sql = builder.table_list_by_pattern_query("app", "a?c");
            assert!(sql.contains("a_c"), "pattern not translated in: {}", sql);
        }
    }

    #[test]
    fn test_qualified_name_uses_dialect_escaping() {
        assert_eq!(MySqlBuilder.qualified_name("shop", "orders"), "`shop`.`orders`");
        assert_eq!(
            PostgresBuilder.qualified_name("shop", "orders"),
            "\"shop\".\"orders\""
        );
        assert_eq!(
            SqlServerBuilder.qualified_name("shop", "orders"),
            "[shop].[orders]"
        );
    }
}
