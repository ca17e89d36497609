//! The uniform contract every dialect adapter implements.
//!
//! Concrete adapters supply connection handling, query execution and a small
//! set of hooks. Every catalog operation is a provided method that combines
//! the dialect's SQL builder with `execute_query` and maps the rows into the
//! common models, so introspection behaves identically across engines.
//! Catalog failures funnel through one wrap point that logs the connection id
//! and operation before reraising.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use crate::db::builder::SqlBuilder;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnInfo, DatabaseType, IndexInfo, IndexType, QueryParam, QueryResult, SchemaInfo,
    ServerStats, TableInfo, TableStats, TableType,
};

/// One result row as returned by `execute_query`.
pub(crate) type Row = serde_json::Map<String, JsonValue>;

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry id of the connection this adapter serves.
    fn connection_id(&self) -> &str;

    /// Dialect implemented by this adapter.
    fn database_type(&self) -> DatabaseType;

    /// SQL builder for this dialect.
    fn builder(&self) -> &dyn SqlBuilder;

    /// Close the underlying pool. Safe to call more than once.
    async fn disconnect(&self) -> DbResult<()>;

    /// Whether the adapter still holds an open pool.
    fn is_connected(&self) -> bool;

    /// Probe the connection. Returns false on any error, never fails.
    async fn ping(&self) -> bool;

    /// Execute one SQL statement with positional `?` parameters.
    ///
    /// Row-returning statements fill `rows` and `columns`; everything else
    /// reports `rows_affected`.
    async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult>;

    /// Run statements in one transaction, returning total affected rows.
    ///
    /// The first failing statement rolls everything back; the error carries
    /// its 1-based index.
    async fn execute_transaction(&self, statements: &[String]) -> DbResult<u64>;

    /// Fetch the server's own CREATE TABLE text, if the dialect has one.
    async fn native_table_ddl(&self, _schema: &str, _table: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    /// Assemble CREATE TABLE text from introspected metadata.
    fn build_create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        indexes: &[IndexInfo],
    ) -> String;

    /// Fold raw name/value pairs into the common server stats shape.
    ///
    /// The default understands the names the builders emit; MySQL overrides
    /// it for its SHOW STATUS counter names.
    fn transform_server_stats(&self, pairs: &[(String, String)]) -> ServerStats {
        let mut stats = ServerStats::default();
        for (name, value) in pairs {
            let number = value.trim().parse::<u64>().ok();
            match name.as_str() {
                "uptime" => stats.uptime_secs = number.unwrap_or(0),
                "current_connections" => stats.current_connections = number.unwrap_or(0),
                "max_connections" => stats.max_connections = number.unwrap_or(0),
                "total_queries" => stats.total_queries = number.unwrap_or(0),
                "slow_queries" => stats.slow_queries = number.unwrap_or(0),
                "bytes_received" => stats.bytes_received = number.unwrap_or(0),
                "bytes_sent" => stats.bytes_sent = number.unwrap_or(0),
                "threads_running" => stats.threads_running = number,
                _ => {
                    stats
                        .additional
                        .insert(name.clone(), JsonValue::String(value.clone()));
                }
            }
        }
        stats
    }

    /// List user schemas, sorted by name.
    async fn list_schemas(&self) -> DbResult<Vec<SchemaInfo>> {
        let sql = self.builder().schema_list_query();
        let result = self.catalog_query("list schemas", sql).await?;
        Ok(result.rows.iter().map(schema_from_row).collect())
    }

    /// List tables and views in a schema, sorted by name.
    async fn list_tables(&self, schema: &str) -> DbResult<Vec<TableInfo>> {
        let sql = self.builder().table_list_query(schema);
        let result = self.catalog_query("list tables", sql).await?;
        Ok(result.rows.iter().map(table_from_row).collect())
    }

    /// List tables matching a glob pattern (`*` and `?` wildcards).
    async fn find_tables(&self, schema: &str, pattern: &str) -> DbResult<Vec<TableInfo>> {
        let sql = self.builder().table_list_by_pattern_query(schema, pattern);
        let result = self.catalog_query("find tables", sql).await?;
        Ok(result.rows.iter().map(table_from_row).collect())
    }

    /// Describe the columns of a table in ordinal order.
    async fn table_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let sql = self.builder().column_info_query(schema, table);
        let result = self.catalog_query("describe columns", sql).await?;
        Ok(result.rows.iter().map(column_from_row).collect())
    }

    /// List the indexes of a table, one entry per index with its columns in
    /// key order.
    async fn table_indexes(&self, schema: &str, table: &str) -> DbResult<Vec<IndexInfo>> {
        let sql = self.builder().index_info_query(schema, table);
        let result = self.catalog_query("describe indexes", sql).await?;
        Ok(group_index_rows(schema, table, &result.rows))
    }

    /// Fetch storage statistics for one table.
    ///
    /// Fails when the catalog returns no row, which usually means the table
    /// does not exist.
    async fn table_stats(&self, schema: &str, table: &str) -> DbResult<TableStats> {
        let sql = self.builder().table_stats_query(schema, table);
        let result = self.catalog_query("table stats", sql).await?;
        match result.rows.first() {
            Some(row) => Ok(stats_from_row(schema, table, row)),
            None => Err(DbError::query(format!(
                "No statistics for table '{}.{}' on connection '{}'",
                schema,
                table,
                self.connection_id()
            ))),
        }
    }

    /// Produce CREATE TABLE DDL for one table.
    ///
    /// Dialects with a native dump (SHOW CREATE TABLE, DBMS_METADATA) are
    /// asked first; on error or absence the DDL is assembled from column and
    /// index metadata fetched concurrently.
    async fn table_ddl(&self, schema: &str, table: &str) -> DbResult<String> {
        match self.native_table_ddl(schema, table).await {
            Ok(Some(ddl)) => return Ok(ddl),
            Ok(None) => {}
            Err(err) => {
                warn!(
                    connection = self.connection_id(),
                    schema,
                    table,
                    error = %err,
                    "native DDL lookup failed, assembling from metadata"
                );
            }
        }
        let (columns, indexes) = futures_util::try_join!(
            self.table_columns(schema, table),
            self.table_indexes(schema, table)
        )?;
        if columns.is_empty() {
            return Err(DbError::query(format!(
                "No columns found for table '{}.{}' on connection '{}'",
                schema,
                table,
                self.connection_id()
            )));
        }
        Ok(self.build_create_table(schema, table, &columns, &indexes))
    }

    /// Generate a script that recreates every table in a schema.
    ///
    /// Tables fail independently; a failure becomes an inline SQL comment
    /// and the remaining tables still render, in table name order.
    async fn schema_script(&self, schema: &str) -> DbResult<String> {
        let tables = self.list_tables(schema).await?;
        script_for_tables(self, schema, &tables).await
    }

    /// Like `schema_script`, but only for tables matching a glob pattern.
    async fn schema_script_matching(&self, schema: &str, pattern: &str) -> DbResult<String> {
        let tables = self.find_tables(schema, pattern).await?;
        script_for_tables(self, schema, &tables).await
    }

    /// Validate that `sql` is a single CREATE TABLE statement, then run it.
    ///
    /// This is the one entry point that gates its input; `execute_query`
    /// stays permissive.
    async fn create_table(&self, sql: &str) -> DbResult<QueryResult> {
        crate::validate::validate_create_table(sql, self.database_type())?;
        self.execute_query(sql, &[]).await
    }

    /// Server-wide statistics, including the version string.
    async fn server_stats(&self) -> DbResult<ServerStats> {
        let sql = self.builder().server_stats_query();
        let result = self.catalog_query("server stats", sql).await?;
        let pairs = name_value_pairs(&result);
        let mut stats = self.transform_server_stats(&pairs);
        stats.version = self.server_version().await?;
        Ok(stats)
    }

    /// Server version string, or "Unknown" when the server does not say.
    async fn server_version(&self) -> DbResult<String> {
        let sql = self.builder().version_query();
        let result = self.catalog_query("server version", sql).await?;
        let version = result
            .rows
            .first()
            .and_then(|row| string_field(row, "version"))
            .unwrap_or_else(|| "Unknown".to_string());
        Ok(version)
    }

    /// Shared execution and error-wrap path for the catalog operations.
    async fn catalog_query(&self, operation: &'static str, sql: String) -> DbResult<QueryResult> {
        debug!(connection = self.connection_id(), operation, "catalog query");
        match self.execute_query(&sql, &[]).await {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(
                    connection = self.connection_id(),
                    operation,
                    error = %err,
                    "catalog query failed"
                );
                let suggestion = err
                    .suggestion()
                    .unwrap_or("Check the SQL syntax and referenced objects")
                    .to_string();
                Err(DbError::query_with_code(
                    format!(
                        "{} failed on connection '{}': {}",
                        operation,
                        self.connection_id(),
                        err
                    ),
                    None,
                    suggestion,
                ))
            }
        }
    }
}

/// Render the CREATE TABLE script for a listed set of tables.
///
/// Views are skipped. Tables fail independently; a failure becomes an
/// inline SQL comment and the remaining tables still render.
pub(crate) async fn script_for_tables<A: Adapter + ?Sized>(
    adapter: &A,
    schema: &str,
    tables: &[TableInfo],
) -> DbResult<String> {
    let mut parts = Vec::with_capacity(tables.len());
    for table in tables {
        if table.table_type != TableType::Table {
            continue;
        }
        match adapter.table_ddl(schema, &table.name).await {
            Ok(ddl) => parts.push(ddl),
            Err(err) => {
                warn!(
                    connection = adapter.connection_id(),
                    schema,
                    table = %table.name,
                    error = %err,
                    "skipping table in schema script"
                );
                parts.push(format!(
                    "-- failed to generate DDL for {}: {}",
                    table.name, err
                ));
            }
        }
    }
    Ok(parts.join("\n\n"))
}

/// Whether a statement produces a row set rather than an affected count.
pub(crate) fn is_row_returning(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH"
    )
}

/// Look up a value by key, falling back to a case-insensitive scan.
pub(crate) fn value_of<'a>(row: &'a Row, key: &str) -> Option<&'a JsonValue> {
    if let Some(value) = row.get(key) {
        return Some(value);
    }
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

pub(crate) fn string_field(row: &Row, key: &str) -> Option<String> {
    match value_of(row, key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn i64_field(row: &Row, key: &str) -> Option<i64> {
    match value_of(row, key)? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        JsonValue::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

pub(crate) fn u64_field(row: &Row, key: &str) -> Option<u64> {
    i64_field(row, key).and_then(|v| u64::try_from(v).ok())
}

pub(crate) fn u32_field(row: &Row, key: &str) -> Option<u32> {
    i64_field(row, key).and_then(|v| u32::try_from(v).ok())
}

/// Tolerant boolean: accepts bools, numbers and YES/NO style strings.
pub(crate) fn bool_field(row: &Row, key: &str) -> bool {
    match value_of(row, key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(0.0) != 0.0,
        Some(JsonValue::String(s)) => matches!(
            s.trim().to_uppercase().as_str(),
            "YES" | "Y" | "TRUE" | "T" | "1"
        ),
        _ => false,
    }
}

pub(crate) fn datetime_field(row: &Row, key: &str) -> Option<DateTime<Utc>> {
    let raw = string_field(row, key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

pub(crate) fn schema_from_row(row: &Row) -> SchemaInfo {
    let mut schema = SchemaInfo::new(string_field(row, "name").unwrap_or_default());
    schema.owner = string_field(row, "owner");
    schema.default_charset = string_field(row, "default_charset");
    schema.default_collation = string_field(row, "default_collation");
    schema
}

pub(crate) fn table_from_row(row: &Row) -> TableInfo {
    let mut table = TableInfo::new(
        string_field(row, "table_name").unwrap_or_default(),
        string_field(row, "schema_name").unwrap_or_default(),
    );
    table.table_type = string_field(row, "table_type")
        .map(|t| TableType::parse(&t))
        .unwrap_or(TableType::Table);
    table.row_count = u64_field(row, "row_count");
    table.data_size = u64_field(row, "data_size");
    table.index_size = u64_field(row, "index_size");
    table.total_size = u64_field(row, "total_size");
    table.created = datetime_field(row, "create_time");
    table.modified = datetime_field(row, "update_time");
    table.comment = string_field(row, "comment").filter(|c| !c.is_empty());
    table
}

pub(crate) fn column_from_row(row: &Row) -> ColumnInfo {
    let mut column = ColumnInfo::new(
        string_field(row, "column_name").unwrap_or_default(),
        string_field(row, "data_type").unwrap_or_default(),
    );
    column.max_length = i64_field(row, "max_length");
    column.precision = u32_field(row, "precision");
    column.scale = u32_field(row, "scale");
    column.is_nullable = bool_field(row, "is_nullable");
    column.default_value = string_field(row, "default_value")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    column.is_primary_key = bool_field(row, "is_primary_key");
    column.is_unique = bool_field(row, "is_unique");
    column.is_identity = bool_field(row, "is_identity");
    column.identity_seed = i64_field(row, "identity_seed");
    column.identity_increment = i64_field(row, "identity_increment");
    column.comment = string_field(row, "comment").filter(|c| !c.is_empty());
    column.ordinal_position = u32_field(row, "ordinal_position").unwrap_or(0);
    column
}

pub(crate) fn stats_from_row(schema: &str, table: &str, row: &Row) -> TableStats {
    TableStats {
        table_name: string_field(row, "table_name").unwrap_or_else(|| table.to_string()),
        schema_name: string_field(row, "schema_name").unwrap_or_else(|| schema.to_string()),
        row_count: u64_field(row, "row_count").unwrap_or(0),
        data_size: u64_field(row, "data_size").unwrap_or(0),
        index_size: u64_field(row, "index_size").unwrap_or(0),
        total_size: u64_field(row, "total_size").unwrap_or(0),
        avg_row_length: u64_field(row, "avg_row_length"),
        last_analyzed: datetime_field(row, "last_analyzed"),
        auto_increment: u64_field(row, "auto_increment"),
    }
}

/// Group per-column index rows into one entry per index.
///
/// Rows may arrive in any order; columns are sorted by ordinal position and
/// indexes come out sorted by name.
pub(crate) fn group_index_rows(schema: &str, table: &str, rows: &[Row]) -> Vec<IndexInfo> {
    struct Group {
        info: IndexInfo,
        columns: Vec<(u32, String)>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for row in rows {
        let name = match string_field(row, "index_name") {
            Some(n) => n,
            None => continue,
        };
        let column = match string_field(row, "column_name") {
            Some(c) => c,
            None => continue,
        };
        let ordinal = u32_field(row, "ordinal_position").unwrap_or(0);
        let group = groups.entry(name.clone()).or_insert_with(|| {
            let mut info = IndexInfo::new(name.clone(), table, schema);
            info.index_type = string_field(row, "index_type")
                .map(|t| IndexType::parse(&t))
                .unwrap_or(IndexType::Index);
            info.is_unique = bool_field(row, "is_unique");
            info.is_primary = bool_field(row, "is_primary");
            info.is_clustered = match value_of(row, "is_clustered") {
                None | Some(JsonValue::Null) => None,
                Some(_) => Some(bool_field(row, "is_clustered")),
            };
            info.cardinality = u64_field(row, "cardinality");
            info.size = u64_field(row, "size");
            Group {
                info,
                columns: Vec::new(),
            }
        });
        group.columns.push((ordinal, column));
    }

    groups
        .into_values()
        .map(|mut group| {
            group.columns.sort_by_key(|(ordinal, _)| *ordinal);
            group.info.columns = group.columns.into_iter().map(|(_, c)| c).collect();
            group.info
        })
        .collect()
}

/// Read name/value rows positionally via the result's column metadata.
///
/// The first result column is the metric name, the second its value,
/// whatever the dialect called them.
pub(crate) fn name_value_pairs(result: &QueryResult) -> Vec<(String, String)> {
    let (name_key, value_key) = if result.columns.len() >= 2 {
        (
            result.columns[0].name.clone(),
            result.columns[1].name.clone(),
        )
    } else {
        ("name".to_string(), "value".to_string())
    };
    result
        .rows
        .iter()
        .filter_map(|row| {
            let name = string_field(row, &name_key)?;
            let value = string_field(row, &value_key)?;
            Some((name, value))
        })
        .collect()
}

/// One open transaction, by whichever driver is underneath.
pub(crate) trait TxHandle {
    async fn run(&mut self, sql: &str) -> DbResult<u64>;
    async fn commit(self) -> DbResult<()>;
    async fn rollback(self) -> DbResult<()>;
}

/// Run statements sequentially in one transaction.
///
/// The first failure rolls back and reports the 1-based statement index; a
/// rollback failure is logged but the original error wins. An empty list
/// commits immediately with zero affected rows.
pub(crate) async fn run_transaction<T: TxHandle>(
    mut tx: T,
    statements: &[String],
) -> DbResult<u64> {
    let mut total = 0u64;
    for (idx, sql) in statements.iter().enumerate() {
        match tx.run(sql).await {
            Ok(affected) => total += affected,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after statement error");
                }
                return Err(DbError::transaction(idx + 1, err.to_string()));
            }
        }
    }
    tx.commit().await?;
    Ok(total)
}
