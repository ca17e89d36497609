//! Oracle SQL generation.
//!
//! Oracle folds unquoted identifiers to uppercase, so identifiers are only
//! quoted when they would otherwise change meaning. Result-column aliases
//! are always quoted to keep them lowercase on the wire.

use super::{SqlBuilder, glob_to_like, quote_literal};
use crate::models::ColumnInfo;

/// Accounts installed by the server and its bundled options.
const SYSTEM_USERS: &str = "'SYS', 'SYSTEM', 'DBSNMP', 'SYSMAN', 'OUTLN', \
     'FLOWS_FILES', 'MDSYS', 'ORDSYS', 'EXFSYS', 'WMSYS', 'APPQOSSYS', \
     'APEX_030200', 'OWBSYS_AUDIT', 'ORDDATA', 'CTXSYS', 'ANONYMOUS', 'XDB', \
     'ORDPLUGINS', 'OWBSYS', 'SI_INFORMTN_SCHEMA', 'OLAPSYS', 'ORACLE_OCM', \
     'XS$NULL', 'BI', 'PM', 'MDDATA', 'IX', 'SH', 'DIP', 'OE', \
     'APEX_PUBLIC_USER', 'HR'";

/// Builder for Oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleBuilder;

impl SqlBuilder for OracleBuilder {
    fn escape_identifier(&self, ident: &str) -> String {
        let needs_quoting = ident.chars().any(|c| {
            c.is_ascii_lowercase()
                || !(c.is_ascii_uppercase() || c.is_ascii_digit() || "_$#".contains(c))
        });
        if needs_quoting {
            format!("\"{}\"", ident.replace('"', "\"\""))
        } else {
            ident.to_string()
        }
    }

    fn schema_list_query(&self) -> String {
        format!(
            "SELECT username AS \"name\", default_tablespace AS \"default_charset\" \
             FROM all_users \
             WHERE username NOT IN ({}) \
             ORDER BY username",
            SYSTEM_USERS
        )
    }

    fn table_list_query(&self, schema: &str) -> String {
        format!(
            "SELECT \
               t.table_name AS \"table_name\", \
               t.owner AS \"schema_name\", \
               'TABLE' AS \"table_type\", \
               t.num_rows AS \"row_count\", \
               t.blocks * 8192 AS \"data_size\", \
               0 AS \"index_size\", \
               t.blocks * 8192 AS \"total_size\", \
               t.last_analyzed AS \"update_time\", \
               c.comments AS \"comment\" \
             FROM all_tables t \
             LEFT JOIN all_tab_comments c \
               ON c.owner = t.owner AND c.table_name = t.table_name \
             WHERE t.owner = UPPER('{}') \
             ORDER BY t.table_name",
            quote_literal(schema)
        )
    }

    fn table_list_by_pattern_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT \
               t.table_name AS \"table_name\", \
               t.owner AS \"schema_name\", \
               'TABLE' AS \"table_type\", \
               t.num_rows AS \"row_count\", \
               t.blocks * 8192 AS \"data_size\", \
               0 AS \"index_size\", \
               t.blocks * 8192 AS \"total_size\", \
               t.last_analyzed AS \"update_time\", \
               c.comments AS \"comment\" \
             FROM all_tables t \
             LEFT JOIN all_tab_comments c \
               ON c.owner = t.owner AND c.table_name = t.table_name \
             WHERE t.owner = UPPER('{}') AND t.table_name LIKE UPPER('{}') \
             ORDER BY t.table_name",
            quote_literal(schema),
            quote_literal(&glob_to_like(pattern))
        )
    }

    fn column_info_query(&self, schema: &str, table: &str) -> String {
        let schema_lit = quote_literal(schema);
        let table_lit = quote_literal(table);
        format!(
            "SELECT \
               c.column_name AS \"column_name\", \
               c.data_type AS \"data_type\", \
               c.data_length AS \"max_length\", \
               c.data_precision AS \"precision\", \
               c.data_scale AS \"scale\", \
               CASE c.nullable WHEN 'Y' THEN 1 ELSE 0 END AS \"is_nullable\", \
               c.data_default AS \"default_value\", \
               CASE WHEN pk.column_name IS NOT NULL THEN 1 ELSE 0 END AS \"is_primary_key\", \
               CASE WHEN uq.column_name IS NOT NULL THEN 1 ELSE 0 END AS \"is_unique\", \
               CASE c.identity_column WHEN 'YES' THEN 1 ELSE 0 END AS \"is_identity\", \
               cc.comments AS \"comment\", \
               c.column_id AS \"ordinal_position\" \
             FROM all_tab_columns c \
             LEFT JOIN all_col_comments cc \
               ON cc.owner = c.owner AND cc.table_name = c.table_name \
              AND cc.column_name = c.column_name \
             LEFT JOIN (\
               SELECT acc.owner, acc.table_name, acc.column_name \
               FROM all_cons_columns acc \
               JOIN all_constraints ac \
                 ON ac.owner = acc.owner AND ac.constraint_name = acc.constraint_name \
               WHERE ac.constraint_type = 'P'\
             ) pk ON pk.owner = c.owner AND pk.table_name = c.table_name \
               AND pk.column_name = c.column_name \
             LEFT JOIN (\
               SELECT DISTINCT acc.owner, acc.table_name, acc.column_name \
               FROM all_cons_columns acc \
               JOIN all_constraints ac \
                 ON ac.owner = acc.owner AND ac.constraint_name = acc.constraint_name \
               WHERE ac.constraint_type = 'U'\
             ) uq ON uq.owner = c.owner AND uq.table_name = c.table_name \
               AND uq.column_name = c.column_name \
             WHERE c.owner = UPPER('{schema_lit}') \
               AND c.table_name = UPPER('{table_lit}') \
             ORDER BY c.column_id"
        )
    }

    fn index_info_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               i.index_name AS \"index_name\", \
               ic.column_name AS \"column_name\", \
               ic.column_position AS \"ordinal_position\", \
               CASE \
                 WHEN con.constraint_type = 'P' THEN 'PRIMARY' \
                 WHEN i.uniqueness = 'UNIQUE' THEN 'UNIQUE' \
                 WHEN i.index_type LIKE '%BITMAP%' THEN 'BITMAP' \
                 ELSE 'INDEX' \
               END AS \"index_type\", \
               CASE i.uniqueness WHEN 'UNIQUE' THEN 1 ELSE 0 END AS \"is_unique\", \
               CASE WHEN con.constraint_type = 'P' THEN 1 ELSE 0 END AS \"is_primary\", \
               0 AS \"is_clustered\", \
               i.distinct_keys AS \"cardinality\", \
               i.leaf_blocks * 8192 AS \"size\" \
             FROM all_indexes i \
             JOIN all_ind_columns ic \
               ON ic.index_owner = i.owner AND ic.index_name = i.index_name \
             LEFT JOIN all_constraints con \
               ON con.owner = i.table_owner AND con.constraint_name = i.index_name \
              AND con.constraint_type IN ('P', 'U') \
             WHERE i.table_owner = UPPER('{}') AND i.table_name = UPPER('{}') \
             ORDER BY i.index_name, ic.column_position",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_stats_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               table_name AS \"table_name\", \
               owner AS \"schema_name\", \
               num_rows AS \"row_count\", \
               blocks * 8192 AS \"data_size\", \
               0 AS \"index_size\", \
               blocks * 8192 AS \"total_size\", \
               avg_row_len AS \"avg_row_length\", \
               last_analyzed AS \"last_analyzed\" \
             FROM all_tables \
             WHERE owner = UPPER('{}') AND table_name = UPPER('{}')",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_ddl_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT DBMS_METADATA.GET_DDL('TABLE', UPPER('{}'), UPPER('{}')) AS \"ddl\" \
             FROM DUAL",
            quote_literal(table),
            quote_literal(schema)
        )
    }

    fn server_stats_query(&self) -> String {
        "SELECT 'uptime' AS \"name\", \
           TO_CHAR(ROUND((SYSDATE - startup_time) * 86400)) AS \"value\" \
           FROM v$instance \
         UNION ALL \
         SELECT 'current_connections', TO_CHAR(COUNT(*)) \
           FROM v$session WHERE type = 'USER' \
         UNION ALL \
         SELECT 'max_connections', value \
           FROM v$parameter WHERE name = 'sessions' \
         UNION ALL \
         SELECT 'total_queries', TO_CHAR(SUM(executions)) \
           FROM v$sqlstats"
            .to_string()
    }

    fn version_query(&self) -> String {
        "SELECT banner AS \"version\" FROM v$version WHERE ROWNUM = 1".to_string()
    }

    fn format_data_type(&self, column: &ColumnInfo) -> String {
        let upper = column.data_type.to_uppercase();
        match upper.as_str() {
            "VARCHAR2" => format!("VARCHAR2({})", column.max_length.unwrap_or(4000)),
            "NVARCHAR2" => format!("NVARCHAR2({})", column.max_length.unwrap_or(2000)),
            "CHAR" => format!("CHAR({})", column.max_length.unwrap_or(1)),
            "NCHAR" => format!("NCHAR({})", column.max_length.unwrap_or(1)),
            "NUMBER" => match (column.precision, column.scale) {
                (Some(p), Some(s)) if s > 0 => format!("NUMBER({},{})", p, s),
                (Some(p), _) => format!("NUMBER({})", p),
                _ => "NUMBER".to_string(),
            },
            "FLOAT" => match column.precision {
                Some(p) => format!("FLOAT({})", p),
                None => upper,
            },
            "RAW" => format!("RAW({})", column.max_length.unwrap_or(2000)),
            _ => upper,
        }
    }

    fn format_default_value(&self, default: &str, data_type: &str) -> String {
        let trimmed = default.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let upper = trimmed.to_uppercase();
        if upper.starts_with("DEFAULT ") {
            return trimmed.to_string();
        }
        if upper == "NULL" {
            return "DEFAULT NULL".to_string();
        }
        let keywords = [
            "SYSDATE",
            "SYSTIMESTAMP",
            "USER",
            "SYS_GUID()",
            "CURRENT_TIMESTAMP",
        ];
        if keywords.contains(&upper.as_str()) || upper.ends_with(".NEXTVAL") {
            return format!("DEFAULT {}", trimmed);
        }
        let string_types = ["VARCHAR2", "NVARCHAR2", "CHAR", "NCHAR", "CLOB", "NCLOB"];
        if string_types.contains(&data_type.to_uppercase().as_str()) {
            if trimmed.starts_with('\'') && trimmed.ends_with('\'') {
                return format!("DEFAULT {}", trimmed);
            }
            return format!("DEFAULT '{}'", trimmed.replace('\'', "''"));
        }
        format!("DEFAULT {}", trimmed)
    }
}
