//! SQL Server SQL generation.

use super::{SqlBuilder, glob_to_like, quote_literal};
use crate::models::ColumnInfo;

/// Built-in principals and roles that surface as schemas but never hold
/// user tables.
const SYSTEM_SCHEMAS: &str = "'sys', 'INFORMATION_SCHEMA', 'guest', 'db_owner', \
     'db_accessadmin', 'db_securityadmin', 'db_ddladmin', 'db_backupoperator', \
     'db_datareader', 'db_datawriter', 'db_denydatareader', 'db_denydatawriter'";

/// Builder for SQL Server and Azure SQL. Identifiers are quoted with
/// square brackets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerBuilder;

impl SqlBuilder for SqlServerBuilder {
    fn escape_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn schema_list_query(&self) -> String {
        format!(
            "SELECT s.name AS name, p.name AS owner \
             FROM sys.schemas s \
             LEFT JOIN sys.database_principals p ON p.principal_id = s.principal_id \
             WHERE s.name NOT IN ({}) \
             ORDER BY s.name",
            SYSTEM_SCHEMAS
        )
    }

    fn table_list_query(&self, schema: &str) -> String {
        format!(
            "SELECT \
               t.name AS table_name, \
               s.name AS schema_name, \
               'TABLE' AS table_type, \
               SUM(CASE WHEN i.index_id IN (0, 1) THEN p.rows ELSE 0 END) AS row_count, \
               SUM(CASE WHEN i.index_id IN (0, 1) THEN a.used_pages ELSE 0 END) * 8 * 1024 \
                 AS data_size, \
               SUM(CASE WHEN i.index_id > 1 THEN a.used_pages ELSE 0 END) * 8 * 1024 \
                 AS index_size, \
               SUM(a.used_pages) * 8 * 1024 AS total_size, \
               t.create_date AS create_time, \
               t.modify_date AS update_time, \
               CAST(ep.value AS NVARCHAR(4000)) AS comment \
             FROM sys.tables t \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.indexes i ON i.object_id = t.object_id \
             JOIN sys.partitions p ON p.object_id = i.object_id AND p.index_id = i.index_id \
             JOIN sys.allocation_units a ON a.container_id = p.partition_id \
             LEFT JOIN sys.extended_properties ep \
               ON ep.major_id = t.object_id AND ep.minor_id = 0 \
              AND ep.class = 1 AND ep.name = 'MS_Description' \
             WHERE s.name = '{}' \
             GROUP BY t.name, s.name, t.create_date, t.modify_date, \
               CAST(ep.value AS NVARCHAR(4000)) \
             ORDER BY t.name",
            quote_literal(schema)
        )
    }

    fn table_list_by_pattern_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT \
               t.name AS table_name, \
               s.name AS schema_name, \
               'TABLE' AS table_type, \
               SUM(CASE WHEN i.index_id IN (0, 1) THEN p.rows ELSE 0 END) AS row_count, \
               SUM(CASE WHEN i.index_id IN (0, 1) THEN a.used_pages ELSE 0 END) * 8 * 1024 \
                 AS data_size, \
               SUM(CASE WHEN i.index_id > 1 THEN a.used_pages ELSE 0 END) * 8 * 1024 \
                 AS index_size, \
               SUM(a.used_pages) * 8 * 1024 AS total_size, \
               t.create_date AS create_time, \
               t.modify_date AS update_time, \
               CAST(ep.value AS NVARCHAR(4000)) AS comment \
             FROM sys.tables t \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.indexes i ON i.object_id = t.object_id \
             JOIN sys.partitions p ON p.object_id = i.object_id AND p.index_id = i.index_id \
             JOIN sys.allocation_units a ON a.container_id = p.partition_id \
             LEFT JOIN sys.extended_properties ep \
               ON ep.major_id = t.object_id AND ep.minor_id = 0 \
              AND ep.class = 1 AND ep.name = 'MS_Description' \
             WHERE s.name = '{}' AND t.name LIKE '{}' \
             GROUP BY t.name, s.name, t.create_date, t.modify_date, \
               CAST(ep.value AS NVARCHAR(4000)) \
             ORDER BY t.name",
            quote_literal(schema),
            quote_literal(&glob_to_like(pattern))
        )
    }

    fn column_info_query(&self, schema: &str, table: &str) -> String {
        let schema_lit = quote_literal(schema);
        let table_lit = quote_literal(table);
        format!(
            "SELECT \
               c.name AS column_name, \
               TYPE_NAME(c.user_type_id) AS data_type, \
               c.max_length AS max_length, \
               c.precision AS precision, \
               c.scale AS scale, \
               c.is_nullable AS is_nullable, \
               dc.definition AS default_value, \
               CASE WHEN pk.column_id IS NOT NULL THEN 1 ELSE 0 END AS is_primary_key, \
               CASE WHEN uq.column_id IS NOT NULL THEN 1 ELSE 0 END AS is_unique, \
               c.is_identity AS is_identity, \
               CASE WHEN c.is_identity = 1 \
                 THEN CAST(IDENT_SEED('{schema_lit}.{table_lit}') AS BIGINT) END \
                 AS identity_seed, \
               CASE WHEN c.is_identity = 1 \
                 THEN CAST(IDENT_INCR('{schema_lit}.{table_lit}') AS BIGINT) END \
                 AS identity_increment, \
               CAST(ep.value AS NVARCHAR(4000)) AS comment, \
               c.column_id AS ordinal_position \
             FROM sys.columns c \
             JOIN sys.tables t ON t.object_id = c.object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             LEFT JOIN sys.default_constraints dc \
               ON dc.object_id = c.default_object_id \
             LEFT JOIN (\
               SELECT ic.object_id, ic.column_id \
               FROM sys.index_columns ic \
               JOIN sys.indexes i \
                 ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
               WHERE i.is_primary_key = 1\
             ) pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id \
             LEFT JOIN (\
               SELECT DISTINCT ic.object_id, ic.column_id \
               FROM sys.index_columns ic \
               JOIN sys.indexes i \
                 ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
               WHERE i.is_unique = 1 AND i.is_primary_key = 0\
             ) uq ON uq.object_id = c.object_id AND uq.column_id = c.column_id \
             LEFT JOIN sys.extended_properties ep \
               ON ep.major_id = c.object_id AND ep.minor_id = c.column_id \
              AND ep.class = 1 AND ep.name = 'MS_Description' \
             WHERE s.name = '{schema_lit}' AND t.name = '{table_lit}' \
             ORDER BY c.column_id"
        )
    }

    fn index_info_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               i.name AS index_name, \
               c.name AS column_name, \
               ic.key_ordinal AS ordinal_position, \
               CASE \
                 WHEN i.is_primary_key = 1 THEN 'PRIMARY' \
                 WHEN i.is_unique = 1 THEN 'UNIQUE' \
                 WHEN i.type = 3 THEN 'XML' \
                 WHEN i.type = 4 THEN 'SPATIAL' \
                 WHEN i.type = 6 THEN 'COLUMNSTORE' \
                 ELSE 'INDEX' \
               END AS index_type, \
               i.is_unique AS is_unique, \
               i.is_primary_key AS is_primary, \
               CASE WHEN i.index_id = 1 THEN 1 ELSE 0 END AS is_clustered, \
               ps.used_pages * 8 * 1024 AS size \
             FROM sys.indexes i \
             JOIN sys.tables t ON t.object_id = i.object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.index_columns ic \
               ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             JOIN sys.columns c \
               ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
             LEFT JOIN (\
               SELECT object_id, index_id, SUM(used_page_count) AS used_pages \
               FROM sys.dm_db_partition_stats \
               GROUP BY object_id, index_id\
             ) ps ON ps.object_id = i.object_id AND ps.index_id = i.index_id \
             WHERE s.name = '{}' AND t.name = '{}' \
               AND i.name IS NOT NULL AND ic.key_ordinal > 0 \
             ORDER BY i.name, ic.key_ordinal",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_stats_query(&self, schema: &str, table: &str) -> String {
        let schema_lit = quote_literal(schema);
        let table_lit = quote_literal(table);
        format!(
            "SELECT \
               t.name AS table_name, \
               s.name AS schema_name, \
               SUM(CASE WHEN i.index_id IN (0, 1) THEN p.rows ELSE 0 END) AS row_count, \
               SUM(CASE WHEN i.index_id IN (0, 1) THEN a.used_pages ELSE 0 END) * 8 * 1024 \
                 AS data_size, \
               SUM(CASE WHEN i.index_id > 1 THEN a.used_pages ELSE 0 END) * 8 * 1024 \
                 AS index_size, \
               SUM(a.used_pages) * 8 * 1024 AS total_size, \
               STATS_DATE(t.object_id, 1) AS last_analyzed, \
               CAST(IDENT_CURRENT('{schema_lit}.{table_lit}') AS BIGINT) AS auto_increment \
             FROM sys.tables t \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.indexes i ON i.object_id = t.object_id \
             JOIN sys.partitions p ON p.object_id = i.object_id AND p.index_id = i.index_id \
             JOIN sys.allocation_units a ON a.container_id = p.partition_id \
             WHERE s.name = '{schema_lit}' AND t.name = '{table_lit}' \
             GROUP BY t.name, s.name, t.object_id"
        )
    }

    fn table_ddl_query(&self, schema: &str, table: &str) -> String {
        // sp_helptext only covers programmable objects, not tables, so the
        // adapter assembles table DDL from column and index metadata instead.
        format!(
            "EXEC sp_helptext '{}.{}'",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn server_stats_query(&self) -> String {
        "SELECT 'uptime' AS name, \
           CAST(DATEDIFF(SECOND, sqlserver_start_time, GETDATE()) AS NVARCHAR(32)) AS value \
           FROM sys.dm_os_sys_info \
         UNION ALL \
         SELECT 'current_connections', CAST(COUNT(*) AS NVARCHAR(32)) \
           FROM sys.dm_exec_connections \
         UNION ALL \
         SELECT 'max_connections', CAST(value_in_use AS NVARCHAR(32)) \
           FROM sys.configurations WHERE name = 'user connections' \
         UNION ALL \
         SELECT 'total_queries', CAST(SUM(execution_count) AS NVARCHAR(32)) \
           FROM sys.dm_exec_query_stats"
            .to_string()
    }

    fn version_query(&self) -> String {
        "SELECT @@VERSION AS version".to_string()
    }

    fn format_data_type(&self, column: &ColumnInfo) -> String {
        let upper = column.data_type.to_uppercase();
        match upper.as_str() {
            // sys.columns reports nvarchar lengths in bytes, two per char.
            "NVARCHAR" => match column.max_length {
                Some(-1) => "NVARCHAR(MAX)".to_string(),
                Some(len) => format!("NVARCHAR({})", len / 2),
                None => upper,
            },
            "NCHAR" => match column.max_length {
                Some(len) => format!("NCHAR({})", len / 2),
                None => upper,
            },
            "VARCHAR" => match column.max_length {
                Some(-1) => "VARCHAR(MAX)".to_string(),
                Some(len) => format!("VARCHAR({})", len),
                None => upper,
            },
            "CHAR" => match column.max_length {
                Some(len) => format!("CHAR({})", len),
                None => upper,
            },
            "BINARY" | "VARBINARY" => match column.max_length {
                Some(-1) => format!("{}(MAX)", upper),
                Some(len) => format!("{}({})", upper, len),
                None => upper,
            },
            "DECIMAL" | "NUMERIC" => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("{}({},{})", upper, p, s),
                (Some(p), None) => format!("{}({})", upper, p),
                _ => upper,
            },
            "FLOAT" => match column.precision {
                Some(p) => format!("FLOAT({})", p),
                None => upper,
            },
            _ => upper,
        }
    }

    fn format_default_value(&self, default: &str, data_type: &str) -> String {
        // Default constraints come back wrapped in one or two layers of
        // parentheses, e.g. ((0)) or (getdate()).
        let mut value = default.trim();
        for _ in 0..2 {
            if value.starts_with('(') && value.ends_with(')') && value.len() >= 2 {
                value = value[1..value.len() - 1].trim();
            }
        }
        if value.is_empty() {
            return String::new();
        }
        if value.to_uppercase() == "NULL" {
            return "DEFAULT NULL".to_string();
        }
        if value.contains('(') && value.contains(')') {
            return format!("DEFAULT {}", value);
        }
        let string_types = ["NVARCHAR", "NCHAR", "VARCHAR", "CHAR", "TEXT", "NTEXT"];
        if string_types.contains(&data_type.to_uppercase().as_str()) {
            if value.starts_with('\'') {
                return format!("DEFAULT {}", value);
            }
            return format!("DEFAULT '{}'", value.replace('\'', "''"));
        }
        format!("DEFAULT {}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier_doubles_closing_bracket() {
        assert_eq!(SqlServerBuilder.escape_identifier("orders"), "[orders]");
        assert_eq!(
            SqlServerBuilder.escape_identifier("odd]name"),
            "[odd]]name]"
        );
    }

    #[test]
    fn test_schema_list_excludes_roles() {
        let sql = SqlServerBuilder.schema_list_query();
        assert!(sql.contains("'db_owner'"));
        assert!(sql.contains("'INFORMATION_SCHEMA'"));
    }

    #[test]
    fn test_table_list_sums_partition_pages() {
        let sql = SqlServerBuilder.table_list_query("shop");
        assert!(sql.contains("sys.partitions"));
        assert!(sql.contains("* 8 * 1024"));
        assert!(sql.contains("s.name = 'shop'"));
    }

    #[test]
    fn test_pattern_query_translates_glob() {
        let sql = SqlServerBuilder.table_list_by_pattern_query("shop", "ord*");
        assert!(sql.contains("t.name LIKE 'ord%'"));
    }

    #[test]
    fn test_column_query_reads_identity_seed() {
        let sql = SqlServerBuilder.column_info_query("shop", "orders");
        assert!(sql.contains("IDENT_SEED('shop.orders')"));
        assert!(sql.contains("IDENT_INCR('shop.orders')"));
        assert!(sql.contains("ORDER BY c.column_id"));
    }

    #[test]
    fn test_index_query_skips_included_columns() {
        let sql = SqlServerBuilder.index_info_query("shop", "orders");
        assert!(sql.contains("ic.key_ordinal > 0"));
        assert!(sql.contains("ORDER BY i.name, ic.key_ordinal"));
    }

    #[test]
    fn test_format_data_type_halves_nvarchar_length() {
        let col = ColumnInfo::new("name", "nvarchar").with_max_length(100);
        assert_eq!(SqlServerBuilder.format_data_type(&col), "NVARCHAR(50)");

        let col = ColumnInfo::new("body", "nvarchar").with_max_length(-1);
        assert_eq!(SqlServerBuilder.format_data_type(&col), "NVARCHAR(MAX)");

        let col = ColumnInfo::new("total", "decimal").with_precision(18, 2);
        assert_eq!(SqlServerBuilder.format_data_type(&col), "DECIMAL(18,2)");
    }

    #[test]
    fn test_format_default_unwraps_parens() {
        assert_eq!(
            SqlServerBuilder.format_default_value("((0))", "int"),
            "DEFAULT 0"
        );
        assert_eq!(
            SqlServerBuilder.format_default_value("(getdate())", "datetime"),
            "DEFAULT getdate()"
        );
        assert_eq!(
            SqlServerBuilder.format_default_value("('new')", "nvarchar"),
            "DEFAULT 'new'"
        );
    }
}
