//! Oracle adapter backed by the blocking oracle driver.
//!
//! The driver has no async API, so every call runs inside
//! `tokio::task::spawn_blocking` to keep the contract non-blocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use oracle::sql_type::{OracleType, ToSql};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::db::adapter::{Adapter, is_row_returning, string_field};
use crate::db::adapters::{PlaceholderStyle, connect_error, number_placeholders};
use crate::db::builder::{OracleBuilder, SqlBuilder};
use crate::db::ddl;
use crate::db::decode::{encode_binary, float_to_json};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnInfo, ColumnMetadata, ConnectionConfig, DatabaseType, IndexInfo, QueryParam,
    QueryResult,
};

/// Adapter for Oracle Database servers.
#[derive(Clone)]
pub struct OracleAdapter {
    id: String,
    pool: Arc<oracle::pool::Pool>,
    connected: Arc<AtomicBool>,
    builder: OracleBuilder,
}

impl std::fmt::Debug for OracleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleAdapter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl OracleAdapter {
    /// Open a session pool for `config`. Fails if the listener cannot be
    /// reached or rejects the credentials.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let connect_string = oracle_connect_string(config);
        let user = config.user.clone();
        let password = config.password.clone();
        let max_connections = config.pool.max_connections_or_default();
        let min_connections = config.pool.min_connections_or_default();

        let pool = tokio::task::spawn_blocking(move || {
            oracle::pool::PoolBuilder::new(user, password, connect_string)
                .max_connections(max_connections)
                .min_connections(min_connections)
                .build()
        })
        .await
        .map_err(join_error)?
        .map_err(|e| {
            connect_error(
                DatabaseType::Oracle,
                &config.host,
                config.effective_port(),
                e,
            )
        })?;
        let pool = Arc::new(pool);

        // Probe a session so bad credentials or an unreachable listener fail
        // here rather than on the first query.
        let probe = pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = probe.get()?;
            conn.query_row_as::<i64>("SELECT 1 FROM DUAL", &[])?;
            Ok::<_, oracle::Error>(())
        })
        .await
        .map_err(join_error)?
        .map_err(|e| {
            connect_error(
                DatabaseType::Oracle,
                &config.host,
                config.effective_port(),
                e,
            )
        })?;

        Ok(Self {
            id: config.id.clone(),
            pool,
            connected: Arc::new(AtomicBool::new(true)),
            builder: OracleBuilder,
        })
    }
}

fn oracle_connect_string(config: &ConnectionConfig) -> String {
    if let Some(oracle) = &config.options.oracle {
        if let Some(connect_string) = &oracle.connect_string {
            return connect_string.clone();
        }
    }
    let service = config.database.as_deref().unwrap_or("ORCL");
    format!("//{}:{}/{}", config.host, config.effective_port(), service)
}

fn join_error(err: tokio::task::JoinError) -> DbError {
    DbError::internal(format!("Oracle worker task failed: {}", err))
}

fn oracle_params(params: &[QueryParam]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|param| -> Box<dyn ToSql> {
            match param {
                QueryParam::Null => Box::new(None::<String>),
                QueryParam::Bool(v) => Box::new(i64::from(*v)),
                QueryParam::Int(v) => Box::new(*v),
                QueryParam::Float(v) => Box::new(*v),
                QueryParam::String(v) => Box::new(v.clone()),
                QueryParam::Bytes(v) => Box::new(v.clone()),
            }
        })
        .collect()
}

fn map_row(
    row: &oracle::Row,
    columns: &[(String, OracleType)],
) -> serde_json::Map<String, JsonValue> {
    let mut map = serde_json::Map::new();
    for (idx, (name, otype)) in columns.iter().enumerate() {
        map.insert(name.clone(), cell_to_json(row, idx, otype));
    }
    map
}

fn cell_to_json(row: &oracle::Row, idx: usize, otype: &OracleType) -> JsonValue {
    match otype {
        OracleType::Varchar2(_)
        | OracleType::NVarchar2(_)
        | OracleType::Char(_)
        | OracleType::NChar(_)
        | OracleType::CLOB
        | OracleType::NCLOB
        | OracleType::Long
        | OracleType::Rowid => string_cell(row, idx),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
            match row.get::<usize, Option<Vec<u8>>>(idx) {
                Ok(Some(bytes)) => encode_binary(&bytes),
                _ => JsonValue::Null,
            }
        }
        OracleType::Date | OracleType::Timestamp(_) => {
            match row.get::<usize, Option<chrono::NaiveDateTime>>(idx) {
                Ok(Some(dt)) => JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
                _ => JsonValue::Null,
            }
        }
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => {
            match row.get::<usize, Option<chrono::DateTime<chrono::Utc>>>(idx) {
                Ok(Some(dt)) => JsonValue::String(dt.to_rfc3339()),
                _ => JsonValue::Null,
            }
        }
        OracleType::Number(_, scale) if *scale <= 0 => integer_cell(row, idx),
        OracleType::Int64 | OracleType::UInt64 => integer_cell(row, idx),
        OracleType::Number(..)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble => float_cell(row, idx),
        _ => string_cell(row, idx),
    }
}

fn string_cell(row: &oracle::Row, idx: usize) -> JsonValue {
    match row.get::<usize, Option<String>>(idx) {
        Ok(Some(s)) => JsonValue::String(s),
        _ => JsonValue::Null,
    }
}

/// NUMBER columns with a non-positive scale; falls back to float when the
/// value does not fit an integer after all.
fn integer_cell(row: &oracle::Row, idx: usize) -> JsonValue {
    match row.get::<usize, Option<i64>>(idx) {
        Ok(Some(n)) => JsonValue::Number(n.into()),
        Ok(None) => JsonValue::Null,
        Err(_) => float_cell(row, idx),
    }
}

fn float_cell(row: &oracle::Row, idx: usize) -> JsonValue {
    match row.get::<usize, Option<f64>>(idx) {
        Ok(Some(v)) => float_to_json(v),
        Ok(None) => JsonValue::Null,
        Err(_) => string_cell(row, idx),
    }
}

enum Fetched {
    Rows {
        columns: Vec<(String, OracleType)>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
    },
    Affected(u64),
}

#[async_trait]
impl Adapter for OracleAdapter {
    fn connection_id(&self) -> &str {
        &self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn builder(&self) -> &dyn SqlBuilder {
        &self.builder
    }

    async fn disconnect(&self) -> DbResult<()> {
        // Sessions close when the last pool handle drops.
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> bool {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.query_row_as::<i64>("SELECT 1 FROM DUAL", &[])?;
            Ok::<_, oracle::Error>(())
        })
        .await;
        match result {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                debug!(connection_id = %self.id, error = %err, "Oracle ping failed");
                false
            }
            Err(err) => {
                debug!(connection_id = %self.id, error = %err, "Oracle ping task failed");
                false
            }
        }
    }

    async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(
            connection_id = %self.id,
            sql = %sql,
            param_count = params.len(),
            "Executing Oracle statement"
        );

        // The driver only understands :N placeholders.
        let sql = if params.is_empty() {
            sql.to_string()
        } else {
            number_placeholders(sql, PlaceholderStyle::Colon)
        };
        let row_returning = is_row_returning(&sql);
        let params = params.to_vec();
        let pool = self.pool.clone();

        let fetched = tokio::task::spawn_blocking(move || -> Result<Fetched, oracle::Error> {
            let conn = pool.get()?;
            let boxed = oracle_params(&params);
            let refs: Vec<&dyn ToSql> = boxed.iter().map(|b| b.as_ref()).collect();
            if row_returning {
                let result_set = conn.query(&sql, &refs)?;
                let columns: Vec<(String, OracleType)> = result_set
                    .column_info()
                    .iter()
                    .map(|info| (info.name().to_string(), info.oracle_type().clone()))
                    .collect();
                let mut rows = Vec::new();
                for row in result_set {
                    let row = row?;
                    rows.push(map_row(&row, &columns));
                }
                Ok(Fetched::Rows { columns, rows })
            } else {
                let statement = conn.execute(&sql, &refs)?;
                let affected = statement.row_count()?;
                conn.commit()?;
                Ok(Fetched::Affected(affected))
            }
        })
        .await
        .map_err(join_error)??;

        let elapsed = start.elapsed().as_millis() as u64;
        match fetched {
            Fetched::Rows { columns, rows } => Ok(QueryResult {
                columns: columns
                    .into_iter()
                    .map(|(name, otype)| ColumnMetadata::new(name, otype.to_string(), true))
                    .collect(),
                rows,
                rows_affected: None,
                execution_time_ms: elapsed,
            }),
            Fetched::Affected(affected) => Ok(QueryResult::write_result(affected, elapsed)),
        }
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<u64> {
        debug!(
            connection_id = %self.id,
            statement_count = statements.len(),
            "Executing Oracle transaction"
        );
        let statements = statements.to_vec();
        let pool = self.pool.clone();
        let id = self.id.clone();
        tokio::task::spawn_blocking(move || -> DbResult<u64> {
            let conn = pool.get().map_err(DbError::from)?;
            let mut total = 0u64;
            for (idx, sql) in statements.iter().enumerate() {
                match conn.execute(sql, &[]) {
                    Ok(statement) => {
                        total += statement.row_count().map_err(DbError::from)?;
                    }
                    Err(err) => {
                        if let Err(rollback_err) = conn.rollback() {
                            warn!(
                                connection_id = %id,
                                error = %rollback_err,
                                "Rollback failed after statement error"
                            );
                        }
                        return Err(DbError::transaction(idx + 1, err.to_string()));
                    }
                }
            }
            conn.commit().map_err(DbError::from)?;
            Ok(total)
        })
        .await
        .map_err(join_error)?
    }

    /// `DBMS_METADATA.GET_DDL` gives the authoritative DDL, so prefer it over
    /// rebuilding from catalog metadata.
    async fn native_table_ddl(&self, schema: &str, table: &str) -> DbResult<Option<String>> {
        let sql = self.builder.table_ddl_query(schema, table);
        let result = self.execute_query(&sql, &[]).await?;
        let ddl = result.rows.first().and_then(|row| string_field(row, "ddl"));
        Ok(ddl)
    }

    fn build_create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        indexes: &[IndexInfo],
    ) -> String {
        ddl::oracle_create_table(schema, table, columns, indexes)
    }
}
