//! SQL Server adapter backed by tiberius with bb8 pooling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bb8_tiberius::ConnectionManager;
use serde_json::Value as JsonValue;
use tiberius::{AuthMethod, ColumnData, EncryptionLevel, ToSql};
use tracing::debug;

use crate::db::adapter::{Adapter, TxHandle, is_row_returning, run_transaction};
use crate::db::adapters::{PlaceholderStyle, connect_error, number_placeholders};
use crate::db::builder::{SqlBuilder, SqlServerBuilder};
use crate::db::ddl;
use crate::db::decode::{encode_binary, float_to_json};
use crate::error::DbResult;
use crate::models::{
    ColumnInfo, ColumnMetadata, ConnectionConfig, DatabaseType, IndexInfo, QueryParam,
    QueryResult,
};

/// Adapter for SQL Server and Azure SQL.
#[derive(Clone)]
pub struct SqlServerAdapter {
    id: String,
    pool: bb8::Pool<ConnectionManager>,
    connected: Arc<AtomicBool>,
    builder: SqlServerBuilder,
}

impl std::fmt::Debug for SqlServerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerAdapter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SqlServerAdapter {
    /// Open a connection pool for `config`. Fails if the server cannot be
    /// reached or rejects the credentials.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let mut tds = tiberius::Config::new();
        tds.host(&config.host);
        tds.port(config.effective_port());
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));

        if let Some(database) = &config.database {
            tds.database(database);
        }
        let mssql = config.options.mssql.clone().unwrap_or_default();
        if let Some(application_name) = &mssql.application_name {
            tds.application_name(application_name);
        }
        if mssql.trust_server_certificate_or_default() {
            tds.trust_cert();
        }
        if let Some(ssl) = config.ssl {
            tds.encryption(if ssl {
                EncryptionLevel::Required
            } else {
                EncryptionLevel::NotSupported
            });
        }

        let failed =
            |e: &dyn std::fmt::Display| {
                connect_error(
                    DatabaseType::SqlServer,
                    &config.host,
                    config.effective_port(),
                    e,
                )
            };

        let pool = bb8::Pool::builder()
            .max_size(config.pool.max_connections_or_default())
            .min_idle(Some(config.pool.min_connections_or_default()))
            .connection_timeout(Duration::from_millis(config.connect_timeout_or_default()))
            .idle_timeout(Some(Duration::from_millis(
                config.pool.idle_timeout_or_default(),
            )))
            .build(ConnectionManager::new(tds))
            .await
            .map_err(|e| failed(&e))?;

        // bb8 opens connections lazily, so probe one now to surface bad
        // credentials or an unreachable server at register time.
        {
            let mut conn = pool.get().await.map_err(|e| failed(&e))?;
            conn.simple_query("SELECT 1")
                .await
                .map_err(|e| failed(&e))?
                .into_results()
                .await
                .map_err(|e| failed(&e))?;
        }

        Ok(Self {
            id: config.id.clone(),
            pool,
            connected: Arc::new(AtomicBool::new(true)),
            builder: SqlServerBuilder,
        })
    }
}

fn column_metadata_of(row: &tiberius::Row) -> Vec<ColumnMetadata> {
    row.columns()
        .iter()
        .map(|col| ColumnMetadata::new(col.name(), format!("{:?}", col.column_type()), true))
        .collect()
}

fn row_to_json(row: &tiberius::Row) -> serde_json::Map<String, JsonValue> {
    let mut map = serde_json::Map::new();
    for (idx, (column, data)) in row.cells().enumerate() {
        map.insert(column.name().to_string(), cell_to_json(row, idx, data));
    }
    map
}

fn cell_to_json(row: &tiberius::Row, idx: usize, data: &ColumnData<'_>) -> JsonValue {
    match data {
        ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        ColumnData::U8(v) => v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::I16(v) => v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::I32(v) => v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::I64(v) => v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null),
        ColumnData::F32(v) => v
            .map(|n| float_to_json(f64::from(n)))
            .unwrap_or(JsonValue::Null),
        ColumnData::F64(v) => v.map(float_to_json).unwrap_or(JsonValue::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| JsonValue::String(g.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| encode_binary(b))
            .unwrap_or(JsonValue::Null),
        // DECIMAL and NUMERIC come back as exact strings.
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| JsonValue::String(n.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| JsonValue::String(x.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Date(_) => match row.try_get::<chrono::NaiveDate, _>(idx) {
            Ok(Some(d)) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            _ => JsonValue::Null,
        },
        ColumnData::Time(_) => match row.try_get::<chrono::NaiveTime, _>(idx) {
            Ok(Some(t)) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
            _ => JsonValue::Null,
        },
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            match row.try_get::<chrono::NaiveDateTime, _>(idx) {
                Ok(Some(dt)) => JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
                _ => JsonValue::Null,
            }
        }
        ColumnData::DateTimeOffset(_) => {
            match row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
                Ok(Some(dt)) => JsonValue::String(dt.to_rfc3339()),
                _ => JsonValue::Null,
            }
        }
    }
}

impl ToSql for QueryParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            QueryParam::Null => ColumnData::I32(None),
            QueryParam::Bool(v) => ColumnData::Bit(Some(*v)),
            QueryParam::Int(v) => ColumnData::I64(Some(*v)),
            QueryParam::Float(v) => ColumnData::F64(Some(*v)),
            QueryParam::String(v) => ColumnData::String(Some(v.as_str().into())),
            QueryParam::Bytes(v) => ColumnData::Binary(Some(v.as_slice().into())),
        }
    }
}

#[async_trait]
impl Adapter for SqlServerAdapter {
    fn connection_id(&self) -> &str {
        &self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn builder(&self) -> &dyn SqlBuilder {
        &self.builder
    }

    async fn disconnect(&self) -> DbResult<()> {
        // bb8 has no explicit shutdown; connections close when the last pool
        // handle drops.
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> bool {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(err) => {
                debug!(connection_id = %self.id, error = %err, "SQL Server ping failed");
                return false;
            }
        };
        let stream = match conn.simple_query("SELECT 1").await {
            Ok(stream) => stream,
            Err(err) => {
                debug!(connection_id = %self.id, error = %err, "SQL Server ping failed");
                return false;
            }
        };
        stream.into_results().await.is_ok()
    }

    async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(
            connection_id = %self.id,
            sql = %sql,
            param_count = params.len(),
            "Executing SQL Server statement"
        );

        // The driver only understands @PN placeholders.
        let sql = if params.is_empty() {
            sql.to_string()
        } else {
            number_placeholders(sql, PlaceholderStyle::AtP)
        };
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let mut conn = self.pool.get().await?;
        if is_row_returning(&sql) {
            let sets = conn.query(sql.as_str(), &refs).await?.into_results().await?;
            let rows = sets.into_iter().next().unwrap_or_default();
            let columns = rows.first().map(column_metadata_of).unwrap_or_default();
            let mapped = rows.iter().map(row_to_json).collect();
            Ok(QueryResult {
                columns,
                rows: mapped,
                rows_affected: None,
                execution_time_ms: start.elapsed().as_millis() as u64,
            })
        } else {
            let done = conn.execute(sql.as_str(), &refs).await?;
            Ok(QueryResult::write_result(
                done.total(),
                start.elapsed().as_millis() as u64,
            ))
        }
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<u64> {
        debug!(
            connection_id = %self.id,
            statement_count = statements.len(),
            "Executing SQL Server transaction"
        );
        let mut conn = self.pool.get().await?;
        conn.simple_query("BEGIN TRANSACTION")
            .await?
            .into_results()
            .await?;
        run_transaction(MssqlTx { conn }, statements).await
    }

    fn build_create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        indexes: &[IndexInfo],
    ) -> String {
        ddl::mssql_create_table(schema, table, columns, indexes)
    }
}

struct MssqlTx<'a> {
    conn: bb8::PooledConnection<'a, ConnectionManager>,
}

impl TxHandle for MssqlTx<'_> {
    async fn run(&mut self, sql: &str) -> DbResult<u64> {
        let done = self.conn.execute(sql, &[]).await?;
        Ok(done.total())
    }

    async fn commit(mut self) -> DbResult<()> {
        self.conn
            .simple_query("COMMIT TRANSACTION")
            .await?
            .into_results()
            .await?;
        Ok(())
    }

    async fn rollback(mut self) -> DbResult<()> {
        self.conn
            .simple_query("ROLLBACK TRANSACTION")
            .await?
            .into_results()
            .await?;
        Ok(())
    }
}
