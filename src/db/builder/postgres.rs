//! PostgreSQL SQL generation.

use super::{SqlBuilder, glob_to_like, quote_literal};
use crate::models::ColumnInfo;

/// Builder for PostgreSQL. Identifiers are quoted with double quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresBuilder;

impl SqlBuilder for PostgresBuilder {
    fn escape_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn schema_list_query(&self) -> String {
        "SELECT \
           schema_name AS name, \
           schema_owner AS owner \
         FROM information_schema.schemata \
         WHERE schema_name NOT IN ('pg_catalog', 'information_schema', 'pg_toast') \
           AND schema_name NOT LIKE 'pg_temp_%' \
           AND schema_name NOT LIKE 'pg_toast_temp_%' \
         ORDER BY schema_name"
            .to_string()
    }

    fn table_list_query(&self, schema: &str) -> String {
        format!(
            "SELECT \
               c.relname AS table_name, \
               n.nspname AS schema_name, \
               CASE \
                 WHEN c.relkind IN ('r', 'p') THEN 'TABLE' \
                 WHEN c.relkind IN ('v', 'm') THEN 'VIEW' \
                 ELSE 'SYSTEM TABLE' \
               END AS table_type, \
               s.n_live_tup AS row_count, \
               pg_relation_size(c.oid) AS data_size, \
               pg_indexes_size(c.oid) AS index_size, \
               pg_total_relation_size(c.oid) AS total_size, \
               s.last_analyze AS update_time, \
               obj_description(c.oid, 'pg_class') AS comment \
             FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             LEFT JOIN pg_stat_user_tables s ON s.relid = c.oid \
             WHERE n.nspname = '{}' AND c.relkind IN ('r', 'p', 'v', 'm') \
             ORDER BY c.relname",
            quote_literal(schema)
        )
    }

    fn table_list_by_pattern_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT \
               c.relname AS table_name, \
               n.nspname AS schema_name, \
               CASE \
                 WHEN c.relkind IN ('r', 'p') THEN 'TABLE' \
                 WHEN c.relkind IN ('v', 'm') THEN 'VIEW' \
                 ELSE 'SYSTEM TABLE' \
               END AS table_type, \
               s.n_live_tup AS row_count, \
               pg_relation_size(c.oid) AS data_size, \
               pg_indexes_size(c.oid) AS index_size, \
               pg_total_relation_size(c.oid) AS total_size, \
               s.last_analyze AS update_time, \
               obj_description(c.oid, 'pg_class') AS comment \
             FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             LEFT JOIN pg_stat_user_tables s ON s.relid = c.oid \
             WHERE n.nspname = '{}' AND c.relkind IN ('r', 'p', 'v', 'm') \
               AND c.relname LIKE '{}' \
             ORDER BY c.relname",
            quote_literal(schema),
            quote_literal(&glob_to_like(pattern))
        )
    }

    fn column_info_query(&self, schema: &str, table: &str) -> String {
        let schema_lit = quote_literal(schema);
        let table_lit = quote_literal(table);
        format!(
            "SELECT \
               c.column_name AS column_name, \
               c.data_type AS data_type, \
               c.character_maximum_length AS max_length, \
               c.numeric_precision AS precision, \
               c.numeric_scale AS scale, \
               c.is_nullable = 'YES' AS is_nullable, \
               c.column_default AS default_value, \
               EXISTS (\
                 SELECT 1 FROM information_schema.key_column_usage k \
                 JOIN information_schema.table_constraints tc \
                   ON tc.constraint_name = k.constraint_name \
                  AND tc.table_schema = k.table_schema \
                 WHERE tc.constraint_type = 'PRIMARY KEY' \
                   AND k.table_schema = c.table_schema \
                   AND k.table_name = c.table_name \
                   AND k.column_name = c.column_name\
               ) AS is_primary_key, \
               EXISTS (\
                 SELECT 1 FROM information_schema.key_column_usage k \
                 JOIN information_schema.table_constraints tc \
                   ON tc.constraint_name = k.constraint_name \
                  AND tc.table_schema = k.table_schema \
                 WHERE tc.constraint_type = 'UNIQUE' \
                   AND k.table_schema = c.table_schema \
                   AND k.table_name = c.table_name \
                   AND k.column_name = c.column_name\
               ) AS is_unique, \
               c.is_identity = 'YES' OR COALESCE(c.column_default, '') LIKE 'nextval%' \
                 AS is_identity, \
               CASE WHEN c.is_identity = 'YES' \
                 THEN c.identity_start::bigint END AS identity_seed, \
               CASE WHEN c.is_identity = 'YES' \
                 THEN c.identity_increment::bigint END AS identity_increment, \
               col_description(\
                 format('%I.%I', c.table_schema, c.table_name)::regclass::oid, \
                 c.ordinal_position::int) AS comment, \
               c.ordinal_position AS ordinal_position \
             FROM information_schema.columns c \
             WHERE c.table_schema = '{schema_lit}' AND c.table_name = '{table_lit}' \
             ORDER BY c.ordinal_position"
        )
    }

    fn index_info_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               i.relname AS index_name, \
               a.attname AS column_name, \
               k.ord AS ordinal_position, \
               CASE \
                 WHEN ix.indisprimary THEN 'PRIMARY' \
                 WHEN ix.indisunique THEN 'UNIQUE' \
                 ELSE 'INDEX' \
               END AS index_type, \
               ix.indisunique AS is_unique, \
               ix.indisprimary AS is_primary, \
               ix.indisclustered AS is_clustered, \
               i.reltuples::bigint AS cardinality, \
               pg_relation_size(i.oid) AS size \
             FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
             WHERE n.nspname = '{}' AND t.relname = '{}' \
             ORDER BY i.relname, k.ord",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_stats_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT \
               s.relname AS table_name, \
               s.schemaname AS schema_name, \
               s.n_live_tup AS row_count, \
               pg_relation_size(s.relid) AS data_size, \
               pg_indexes_size(s.relid) AS index_size, \
               pg_total_relation_size(s.relid) AS total_size, \
               COALESCE(s.last_analyze, s.last_autoanalyze) AS last_analyzed \
             FROM pg_stat_user_tables s \
             WHERE s.schemaname = '{}' AND s.relname = '{}'",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn table_ddl_query(&self, schema: &str, table: &str) -> String {
        // Assembles a column-level CREATE TABLE from the catalogs.
        // pg_get_expr replaces the adsrc column that newer servers dropped.
        format!(
            "SELECT 'CREATE TABLE ' || quote_ident(n.nspname) || '.' || \
               quote_ident(c.relname) || E' (\\n' || \
               string_agg(\
                 '  ' || quote_ident(a.attname) || ' ' || \
                 format_type(a.atttypid, a.atttypmod) || \
                 CASE WHEN d.adbin IS NOT NULL \
                   THEN ' DEFAULT ' || pg_get_expr(d.adbin, d.adrelid) \
                   ELSE '' END || \
                 CASE WHEN a.attnotnull THEN ' NOT NULL' ELSE '' END, \
                 E',\\n' ORDER BY a.attnum) || \
               E'\\n);' AS ddl \
             FROM pg_attribute a \
             JOIN pg_class c ON c.oid = a.attrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
             WHERE n.nspname = '{}' AND c.relname = '{}' \
               AND a.attnum > 0 AND NOT a.attisdropped \
             GROUP BY n.nspname, c.relname",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn server_stats_query(&self) -> String {
        "SELECT 'uptime' AS name, \
           EXTRACT(EPOCH FROM now() - pg_postmaster_start_time())::bigint::text AS value \
         UNION ALL \
         SELECT 'current_connections', COUNT(*)::text \
           FROM pg_stat_activity WHERE state = 'active' \
         UNION ALL \
         SELECT 'max_connections', setting \
           FROM pg_settings WHERE name = 'max_connections' \
         UNION ALL \
         SELECT 'total_queries', COALESCE(SUM(xact_commit + xact_rollback), 0)::text \
           FROM pg_stat_database"
            .to_string()
    }

    fn version_query(&self) -> String {
        "SELECT version() AS version".to_string()
    }

    fn format_data_type(&self, column: &ColumnInfo) -> String {
        let upper = column.data_type.to_uppercase();
        let mapped = match upper.as_str() {
            "CHARACTER VARYING" => "VARCHAR",
            "CHARACTER" => "CHAR",
            "INT4" => "INTEGER",
            "INT8" => "BIGINT",
            "INT2" => "SMALLINT",
            "FLOAT4" => "REAL",
            "FLOAT8" => "DOUBLE PRECISION",
            "BOOL" => "BOOLEAN",
            "TIMESTAMPTZ" => "TIMESTAMP WITH TIME ZONE",
            other => other,
        };
        match mapped {
            "VARCHAR" | "CHAR" => match column.max_length {
                Some(len) => format!("{}({})", mapped, len),
                None => mapped.to_string(),
            },
            "NUMERIC" | "DECIMAL" => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("{}({},{})", mapped, p, s),
                (Some(p), None) => format!("{}({})", mapped, p),
                _ => mapped.to_string(),
            },
            other => other.to_string(),
        }
    }

    fn format_default_value(&self, default: &str, data_type: &str) -> String {
        let trimmed = default.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        if trimmed.starts_with("nextval") {
            return format!("DEFAULT {}", trimmed);
        }
        // Strip a trailing ::type cast the catalogs attach to literals.
        let stripped = match trimmed.rfind("::") {
            Some(pos)
                if trimmed[pos + 2..]
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '"') =>
            {
                trimmed[..pos].trim()
            }
            _ => trimmed,
        };
        if stripped.to_uppercase() == "NULL" {
            return "DEFAULT NULL".to_string();
        }
        if stripped.contains('(') && stripped.contains(')') {
            return format!("DEFAULT {}", stripped);
        }
        let string_types = ["CHARACTER VARYING", "VARCHAR", "CHARACTER", "CHAR", "TEXT"];
        if string_types.contains(&data_type.to_uppercase().as_str()) {
            if stripped.starts_with('\'') && stripped.ends_with('\'') {
                return format!("DEFAULT {}", stripped);
            }
            return format!("DEFAULT '{}'", stripped.replace('\'', "''"));
        }
        format!("DEFAULT {}", stripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier_doubles_quotes() {
        assert_eq!(PostgresBuilder.escape_identifier("orders"), "\"orders\"");
        assert_eq!(
            PostgresBuilder.escape_identifier("odd\"name"),
            "\"odd\"\"name\""
        );
    }

    #[test]
    fn test_schema_list_excludes_catalogs() {
        let sql = PostgresBuilder.schema_list_query();
        assert!(sql.contains("'pg_catalog'"));
        assert!(sql.contains("NOT LIKE 'pg_temp_%'"));
    }

    #[test]
    fn test_table_list_uses_pg_class() {
        let sql = PostgresBuilder.table_list_query("shop");
        assert!(sql.contains("pg_class"));
        assert!(sql.contains("n.nspname = 'shop'"));
        assert!(sql.contains("pg_total_relation_size"));
    }

    #[test]
    fn test_pattern_query_translates_glob() {
        let sql = PostgresBuilder.table_list_by_pattern_query("shop", "ord*_?");
        assert!(sql.contains("LIKE 'ord%_\u{5f}'") || sql.contains("LIKE 'ord%__'"));
    }

    #[test]
    fn test_column_query_detects_serial_identity() {
        let sql = PostgresBuilder.column_info_query("shop", "orders");
        assert!(sql.contains("LIKE 'nextval%'"));
        assert!(sql.contains("is_identity"));
        assert!(sql.contains("identity_seed"));
    }

    #[test]
    fn test_index_query_unnests_with_ordinality() {
        let sql = PostgresBuilder.index_info_query("shop", "orders");
        assert!(sql.contains("WITH ORDINALITY"));
        assert!(sql.contains("ORDER BY i.relname, k.ord"));
    }

    #[test]
    fn test_ddl_query_uses_pg_get_expr() {
        let sql = PostgresBuilder.table_ddl_query("shop", "orders");
        assert!(sql.contains("pg_get_expr"));
        assert!(sql.contains("format_type"));
    }

    #[test]
    fn test_format_data_type_maps_internal_names() {
        let col = ColumnInfo::new("name", "character varying").with_max_length(80);
        assert_eq!(PostgresBuilder.format_data_type(&col), "VARCHAR(80)");

        let col = ColumnInfo::new("flag", "bool");
        assert_eq!(PostgresBuilder.format_data_type(&col), "BOOLEAN");

        let col = ColumnInfo::new("total", "numeric").with_precision(12, 4);
        assert_eq!(PostgresBuilder.format_data_type(&col), "NUMERIC(12,4)");
    }

    #[test]
    fn test_format_default_strips_cast() {
        assert_eq!(
            PostgresBuilder.format_default_value("'active'::character varying", "varchar"),
            "DEFAULT 'active'"
        );
        assert_eq!(
            PostgresBuilder.format_default_value("nextval('orders_id_seq'::regclass)", "integer"),
            "DEFAULT nextval('orders_id_seq'::regclass)"
        );
        assert_eq!(
            PostgresBuilder.format_default_value("now()", "timestamp"),
            "DEFAULT now()"
        );
        assert_eq!(
            PostgresBuilder.format_default_value("0", "integer"),
            "DEFAULT 0"
        );
    }
}
