//! Catalog pipeline tests against a canned adapter.
//!
//! A stub adapter answers the builder-generated catalog SQL with fixed rows,
//! so the provided introspection methods (schema and table listing, column
//! and index mapping, DDL assembly, stats, server info) run end to end
//! without a live server. The fixture is one connection `db1` with a schema
//! `shop` holding an `orders` table, an `order_totals` view and a `broken`
//! table whose catalog queries fail.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};

use dbatlas::db::builder::MySqlBuilder;
use dbatlas::models::{
    ColumnInfo, ColumnMetadata, ConnectionConfig, DatabaseType, IndexInfo, QueryParam, QueryResult,
    TableType,
};
use dbatlas::{Adapter, ConnectionRegistry, Connector, DbError, DbResult, SqlBuilder};

fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn rows_result(columns: Vec<ColumnMetadata>, rows: Vec<Map<String, Value>>) -> QueryResult {
    QueryResult {
        columns,
        rows,
        rows_affected: None,
        execution_time_ms: 1,
    }
}

/// Adapter that serves the `shop` fixture from canned rows.
#[derive(Clone)]
struct FixtureAdapter {
    builder: MySqlBuilder,
    executed: Arc<Mutex<Vec<String>>>,
    native_ddl: Option<String>,
    native_fails: bool,
}

impl FixtureAdapter {
    fn new() -> Self {
        Self {
            builder: MySqlBuilder,
            executed: Arc::new(Mutex::new(Vec::new())),
            native_ddl: None,
            native_fails: false,
        }
    }

    fn with_native_ddl(ddl: &str) -> Self {
        let mut adapter = Self::new();
        adapter.native_ddl = Some(ddl.to_string());
        adapter
    }

    fn with_failing_native_ddl() -> Self {
        let mut adapter = Self::new();
        adapter.native_fails = true;
        adapter
    }

    fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn respond(&self, sql: &str) -> DbResult<QueryResult> {
        if sql.trim_start().to_uppercase().starts_with("CREATE TABLE") {
            return Ok(QueryResult::write_result(0, 1));
        }
        if sql.contains("'broken'") {
            return Err(DbError::query("simulated catalog failure"));
        }
        if sql.contains("information_schema.SCHEMATA") {
            return Ok(rows_result(
                vec![
                    ColumnMetadata::new("name", "varchar", false),
                    ColumnMetadata::new("default_charset", "varchar", true),
                ],
                vec![row(&[
                    ("name", json!("shop")),
                    ("default_charset", json!("utf8mb4")),
                    ("default_collation", json!("utf8mb4_general_ci")),
                ])],
            ));
        }
        // Table stats shares information_schema.TABLES with the listing
        // queries, so match its distinctive column first.
        if sql.contains("AVG_ROW_LENGTH") {
            if sql.contains("'missing'") {
                return Ok(rows_result(vec![], vec![]));
            }
            return Ok(rows_result(
                vec![ColumnMetadata::new("table_name", "varchar", false)],
                vec![row(&[
                    ("table_name", json!("orders")),
                    ("schema_name", json!("shop")),
                    ("row_count", json!(1250)),
                    ("data_size", json!(65536)),
                    ("index_size", json!(16384)),
                    ("total_size", json!(81920)),
                    ("avg_row_length", json!(52)),
                    ("auto_increment", json!(1251)),
                ])],
            ));
        }
        if sql.contains("information_schema.COLUMNS") {
            if !sql.contains("'orders'") {
                return Ok(rows_result(vec![], vec![]));
            }
            return Ok(rows_result(
                vec![ColumnMetadata::new("column_name", "varchar", false)],
                vec![
                    row(&[
                        ("column_name", json!("id")),
                        ("data_type", json!("int")),
                        ("is_nullable", json!(0)),
                        ("is_primary_key", json!(1)),
                        ("is_identity", json!(1)),
                        ("ordinal_position", json!(1)),
                    ]),
                    row(&[
                        ("column_name", json!("total")),
                        ("data_type", json!("decimal")),
                        ("precision", json!(10)),
                        ("scale", json!(2)),
                        ("is_nullable", json!(1)),
                        ("is_primary_key", json!(0)),
                        ("is_identity", json!(0)),
                        ("ordinal_position", json!(2)),
                    ]),
                ],
            ));
        }
        if sql.contains("information_schema.STATISTICS") {
            return Ok(rows_result(
                vec![ColumnMetadata::new("index_name", "varchar", false)],
                vec![row(&[
                    ("index_name", json!("PRIMARY")),
                    ("column_name", json!("id")),
                    ("ordinal_position", json!(1)),
                    ("index_type", json!("PRIMARY")),
                    ("is_unique", json!(1)),
                    ("is_primary", json!(1)),
                ])],
            ));
        }
        if sql.contains("information_schema.TABLES") {
            let table_row = |name: &str, table_type: &str| {
                row(&[
                    ("table_name", json!(name)),
                    ("schema_name", json!("shop")),
                    ("table_type", json!(table_type)),
                ])
            };
            let rows = if sql.contains("LIKE") {
                vec![table_row("orders", "BASE TABLE")]
            } else {
                vec![
                    table_row("broken", "BASE TABLE"),
                    table_row("order_totals", "VIEW"),
                    table_row("orders", "BASE TABLE"),
                ]
            };
            return Ok(rows_result(
                vec![ColumnMetadata::new("table_name", "varchar", false)],
                rows,
            ));
        }
        if sql.starts_with("SHOW GLOBAL STATUS") {
            // Snake names exercise the default stats mapping; the value of
            // the MySQL-specific override is covered by its own unit tests.
            return Ok(rows_result(
                vec![
                    ColumnMetadata::new("name", "varchar", false),
                    ColumnMetadata::new("value", "varchar", false),
                ],
                vec![
                    row(&[("name", json!("uptime")), ("value", json!("3600"))]),
                    row(&[("name", json!("total_queries")), ("value", json!("420"))]),
                    row(&[
                        ("name", json!("buffer_pool_size")),
                        ("value", json!("134217728")),
                    ]),
                ],
            ));
        }
        if sql.contains("VERSION()") {
            return Ok(rows_result(
                vec![ColumnMetadata::new("version", "varchar", false)],
                vec![row(&[("version", json!("8.0.36-test"))])],
            ));
        }
        Err(DbError::internal(format!("unexpected catalog query: {}", sql)))
    }
}

#[async_trait]
impl Adapter for FixtureAdapter {
    fn connection_id(&self) -> &str {
        "db1"
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn builder(&self) -> &dyn SqlBuilder {
        &self.builder
    }

    async fn disconnect(&self) -> DbResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn execute_query(&self, sql: &str, _params: &[QueryParam]) -> DbResult<QueryResult> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.respond(sql)
    }

    async fn execute_transaction(&self, _statements: &[String]) -> DbResult<u64> {
        Ok(0)
    }

    async fn native_table_ddl(&self, _schema: &str, _table: &str) -> DbResult<Option<String>> {
        if self.native_fails {
            return Err(DbError::query("simulated native DDL failure"));
        }
        Ok(self.native_ddl.clone())
    }

    fn build_create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        indexes: &[IndexInfo],
    ) -> String {
        let builder = &self.builder;
        let mut lines: Vec<String> = columns
            .iter()
            .map(|column| {
                let mut line = format!(
                    "  {} {}",
                    builder.escape_identifier(&column.name),
                    builder.format_data_type(column)
                );
                if !column.is_nullable {
                    line.push_str(" NOT NULL");
                }
                if column.is_identity {
                    line.push_str(" AUTO_INCREMENT");
                }
                line
            })
            .collect();
        if let Some(pk) = indexes.iter().find(|index| index.is_primary) {
            let cols: Vec<String> = pk
                .columns
                .iter()
                .map(|c| builder.escape_identifier(c))
                .collect();
            lines.push(format!("  PRIMARY KEY ({})", cols.join(", ")));
        }
        format!(
            "CREATE TABLE {} (\n{}\n)",
            builder.qualified_name(schema, table),
            lines.join(",\n")
        )
    }
}

struct FixtureConnector {
    adapter: FixtureAdapter,
}

#[async_trait]
impl Connector for FixtureConnector {
    type Adapter = FixtureAdapter;

    async fn connect(&self, _config: &ConnectionConfig) -> DbResult<Self::Adapter> {
        Ok(self.adapter.clone())
    }
}

async fn setup_registry(adapter: FixtureAdapter) -> ConnectionRegistry<FixtureConnector> {
    let registry = ConnectionRegistry::with_connector(FixtureConnector { adapter });
    let config = ConnectionConfig::new("db1", DatabaseType::MySql, "localhost", "app", "secret");
    registry.register(config).await.unwrap();
    registry
}

#[tokio::test]
async fn test_catalog_walk_through_registry() {
    let registry = setup_registry(FixtureAdapter::new()).await;

    // Sole registered connection, so no id is needed.
    let adapter = registry.adapter(None).await.unwrap();

    let schemas = adapter.list_schemas().await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "shop");
    assert_eq!(schemas[0].default_charset.as_deref(), Some("utf8mb4"));

    let tables = adapter.list_tables("shop").await.unwrap();
    assert_eq!(tables.len(), 3);
    assert_eq!(tables[1].name, "order_totals");
    assert_eq!(tables[1].table_type, TableType::View);
    assert_eq!(tables[2].name, "orders");
    assert_eq!(tables[2].table_type, TableType::Table);

    let found = adapter.find_tables("shop", "ord*").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "orders");
}

#[tokio::test]
async fn test_column_and_index_mapping() {
    let adapter = FixtureAdapter::new();

    let columns = adapter.table_columns("shop", "orders").await.unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "id");
    assert!(columns[0].is_primary_key);
    assert!(columns[0].is_identity);
    assert!(!columns[0].is_nullable);
    assert_eq!(columns[1].name, "total");
    assert!(columns[1].is_nullable);
    assert_eq!(columns[1].precision, Some(10));
    assert_eq!(columns[1].scale, Some(2));

    let indexes = adapter.table_indexes("shop", "orders").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].is_primary);
    assert_eq!(indexes[0].columns, vec!["id".to_string()]);
}

#[tokio::test]
async fn test_table_ddl_assembles_from_metadata() {
    let adapter = FixtureAdapter::new();
    let ddl = adapter.table_ddl("shop", "orders").await.unwrap();

    assert!(ddl.contains("CREATE TABLE `shop`.`orders`"));
    assert!(ddl.contains("`id` INT(11) NOT NULL AUTO_INCREMENT"));
    assert!(ddl.contains("`total` DECIMAL(10,2)"));
    assert!(!ddl.contains("`total` DECIMAL(10,2) NOT NULL"));
    assert!(ddl.contains("PRIMARY KEY (`id`)"));
}

#[tokio::test]
async fn test_table_ddl_prefers_native_dump() {
    let adapter = FixtureAdapter::with_native_ddl("CREATE TABLE `shop`.`orders` (native)");
    let ddl = adapter.table_ddl("shop", "orders").await.unwrap();

    assert_eq!(ddl, "CREATE TABLE `shop`.`orders` (native)");
    // The metadata path must not have been taken.
    assert!(
        adapter
            .executed_sql()
            .iter()
            .all(|sql| !sql.contains("information_schema.COLUMNS"))
    );
}

#[tokio::test]
async fn test_table_ddl_falls_back_when_native_fails() {
    let adapter = FixtureAdapter::with_failing_native_ddl();
    let ddl = adapter.table_ddl("shop", "orders").await.unwrap();

    assert!(ddl.contains("CREATE TABLE `shop`.`orders`"));
    assert!(
        adapter
            .executed_sql()
            .iter()
            .any(|sql| sql.contains("information_schema.COLUMNS"))
    );
}

#[tokio::test]
async fn test_table_ddl_fails_without_columns() {
    let adapter = FixtureAdapter::new();
    let err = adapter.table_ddl("shop", "empty_table").await.unwrap_err();
    assert!(err.to_string().contains("No columns found"));
}

#[tokio::test]
async fn test_schema_script_skips_views_and_comments_failures() {
    let adapter = FixtureAdapter::new();
    let script = adapter.schema_script("shop").await.unwrap();

    assert!(script.contains("CREATE TABLE `shop`.`orders`"));
    assert!(script.contains("-- failed to generate DDL for broken:"));
    assert!(!script.contains("order_totals"));
    // Failed table renders before the good one, in table name order.
    assert!(script.find("broken").unwrap() < script.find("`orders`").unwrap());
}

#[tokio::test]
async fn test_schema_script_matching_uses_pattern() {
    let adapter = FixtureAdapter::new();
    let script = adapter.schema_script_matching("shop", "ord*").await.unwrap();

    // The LIKE-filtered listing returns only `orders`, so nothing else
    // appears and nothing fails.
    assert!(script.contains("CREATE TABLE `shop`.`orders`"));
    assert!(!script.contains("broken"));
    assert!(
        adapter
            .executed_sql()
            .iter()
            .any(|sql| sql.contains("LIKE 'ord%'"))
    );
}

#[tokio::test]
async fn test_create_table_gates_its_input() {
    let adapter = FixtureAdapter::new();

    let result = adapter
        .create_table("CREATE TABLE `shop`.`refunds` (id INT PRIMARY KEY)")
        .await
        .unwrap();
    assert_eq!(result.rows_affected, Some(0));

    // Anything but a single CREATE TABLE is rejected before execution.
    let err = adapter.create_table("DROP TABLE `shop`.`orders`").await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
    assert!(
        adapter
            .executed_sql()
            .iter()
            .all(|sql| !sql.contains("DROP TABLE"))
    );
}

#[tokio::test]
async fn test_table_stats_requires_a_row() {
    let adapter = FixtureAdapter::new();

    let stats = adapter.table_stats("shop", "orders").await.unwrap();
    assert_eq!(stats.row_count, 1250);
    assert_eq!(stats.total_size, 81920);
    assert_eq!(stats.auto_increment, Some(1251));

    let err = adapter.table_stats("shop", "missing").await.unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_server_stats_and_version() {
    let adapter = FixtureAdapter::new();
    let stats = adapter.server_stats().await.unwrap();

    assert_eq!(stats.uptime_secs, 3600);
    assert_eq!(stats.total_queries, 420);
    assert_eq!(stats.version, "8.0.36-test");
    assert_eq!(
        stats.additional.get("buffer_pool_size"),
        Some(&json!("134217728"))
    );
}

#[tokio::test]
async fn test_catalog_errors_carry_connection_and_operation() {
    let adapter = FixtureAdapter::new();
    let err = adapter.table_columns("shop", "broken").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("describe columns"));
    assert!(message.contains("db1"));
}
