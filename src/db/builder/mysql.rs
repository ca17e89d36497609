//! MySQL / MariaDB SQL generation.

use super::{SqlBuilder, glob_to_like, quote_literal};
use crate::models::ColumnInfo;

/// Schemas that ship with the server and never hold user data.
const SYSTEM_SCHEMAS: &str = "'information_schema', 'mysql', 'performance_schema', 'sys'";

/// Builder for the MySQL family. Identifiers are quoted with backticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlBuilder;

impl SqlBuilder for MySqlBuilder {
    fn escape_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn schema_list_query(&self) -> String {
        format!(
            "SELECT \
               SCHEMA_NAME AS name, \
               DEFAULT_CHARACTER_SET_NAME AS default_charset, \
               DEFAULT_COLLATION_NAME AS default_collation \
             FROM information_schema.SCHEMATA \
             WHERE SCHEMA_NAME NOT IN ({}) \
             ORDER BY SCHEMA_NAME",
            SYSTEM_SCHEMAS
        )
    }

    fn table_list_query(&self, schema: &str) -> String {
        format!(
            "SELECT \
               TABLE_NAME AS table_name, \
               TABLE_SCHEMA AS schema_name, \
               TABLE_TYPE AS table_type, \
               TABLE_ROWS AS row_count, \
               DATA_LENGTH AS data_size, \
               INDEX_LENGTH AS index_size, \
               DATA_LENGTH + INDEX_LENGTH AS total_size, \
               CREATE_TIME AS create_time, \
               UPDATE_TIME AS update_time, \
               TABLE_COMMENT AS comment \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = '{}' \
             ORDER BY TABLE_NAME",
            quote_literal(schema)
        )
    }

    fn table_list_by_pattern_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT \
               TABLE_NAME AS table_name, \
               TABLE_SCHEMA AS schema_name, \
               TABLE_TYPE AS table_type, \
               TABLE_ROWS AS row_count, \
               DATA_LENGTH AS data_size, \
               INDEX_LENGTH AS index_size, \
               DATA_LENGTH + INDEX_LENGTH AS total_size, \
               CREATE_TIME AS create_time, \
               UPDATE_TIME AS update_time, \
               TABLE_COMMENT AS comment \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME LIKE '{}' \
             ORDER BY TABLE_NAME",
            quote_literal(schema),
            quote_literal(&glob_to_like(pattern))
        )
    }

    fn column_info_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               COLUMN_NAME AS column_name, \
               DATA_TYPE AS data_type, \
               CHARACTER_MAXIMUM_LENGTH AS max_length, \
               NUMERIC_PRECISION AS `precision`, \
               NUMERIC_SCALE AS scale, \
               IS_NULLABLE = 'YES' AS is_nullable, \
               COLUMN_DEFAULT AS default_value, \
               COLUMN_KEY = 'PRI' AS is_primary_key, \
               COLUMN_KEY = 'UNI' AS is_unique, \
               EXTRA LIKE '%auto_increment%' AS is_identity, \
               COLUMN_COMMENT AS comment, \
               ORDINAL_POSITION AS ordinal_position \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
             ORDER BY ORDINAL_POSITION",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn index_info_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               INDEX_NAME AS index_name, \
               COLUMN_NAME AS column_name, \
               SEQ_IN_INDEX AS ordinal_position, \
               CASE \
                 WHEN INDEX_NAME = 'PRIMARY' THEN 'PRIMARY' \
                 WHEN NON_UNIQUE = 0 THEN 'UNIQUE' \
                 WHEN INDEX_TYPE = 'FULLTEXT' THEN 'FULLTEXT' \
                 WHEN INDEX_TYPE = 'SPATIAL' THEN 'SPATIAL' \
                 ELSE 'INDEX' \
               END AS index_type, \
               NON_UNIQUE = 0 AS is_unique, \
               INDEX_NAME = 'PRIMARY' AS is_primary, \
               INDEX_TYPE = 'BTREE' AS is_clustered, \
               CARDINALITY AS cardinality \
             FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
             ORDER BY INDEX_NAME, SEQ_IN_INDEX",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_stats_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               TABLE_NAME AS table_name, \
               TABLE_SCHEMA AS schema_name, \
               TABLE_ROWS AS row_count, \
               DATA_LENGTH AS data_size, \
               INDEX_LENGTH AS index_size, \
               DATA_LENGTH + INDEX_LENGTH AS total_size, \
               AVG_ROW_LENGTH AS avg_row_length, \
               UPDATE_TIME AS last_analyzed, \
               AUTO_INCREMENT AS auto_increment \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}'",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_ddl_query(&self, schema: &str, table: &str) -> String {
        format!("SHOW CREATE TABLE {}", self.qualified_name(schema, table))
    }

    fn server_stats_query(&self) -> String {
        // SHOW GLOBAL STATUS works on every supported MySQL and MariaDB
        // release; information_schema.SESSION_STATUS does not.
        "SHOW GLOBAL STATUS WHERE Variable_name IN (\
           'Uptime', 'Threads_connected', 'Max_used_connections', 'Questions', \
           'Slow_queries', 'Bytes_received', 'Bytes_sent', 'Threads_running')"
            .to_string()
    }

    fn version_query(&self) -> String {
        "SELECT VERSION() AS version".to_string()
    }

    fn format_data_type(&self, column: &ColumnInfo) -> String {
        let upper = column.data_type.to_uppercase();
        match upper.as_str() {
            "VARCHAR" | "CHAR" | "BINARY" | "VARBINARY" => match column.max_length {
                Some(len) => format!("{}({})", upper, len),
                None => upper,
            },
            "DECIMAL" | "NUMERIC" => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("{}({},{})", upper, p, s),
                (Some(p), None) => format!("{}({})", upper, p),
                _ => upper,
            },
            "TINYINT" => {
                if column.max_length == Some(1) {
                    "BOOLEAN".to_string()
                } else {
                    "TINYINT".to_string()
                }
            }
            "INT" => "INT(11)".to_string(),
            _ => upper,
        }
    }

    fn format_default_value(&self, default: &str, data_type: &str) -> String {
        let trimmed = default.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let upper = trimmed.to_uppercase();
        if upper == "CURRENT_TIMESTAMP" || upper.starts_with("CURRENT_TIMESTAMP(") {
            return "DEFAULT CURRENT_TIMESTAMP".to_string();
        }
        if upper == "NULL" {
            return "DEFAULT NULL".to_string();
        }
        let string_types = ["VARCHAR", "CHAR", "TEXT", "ENUM", "SET"];
        if string_types.contains(&data_type.to_uppercase().as_str()) {
            return format!("DEFAULT '{}'", trimmed.replace('\'', "''"));
        }
        format!("DEFAULT {}", trimmed)
    }
}
