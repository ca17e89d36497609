//! MySQL and MariaDB adapter backed by a sqlx connection pool.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use tracing::debug;

use crate::db::adapter::{Adapter, TxHandle, is_row_returning, run_transaction, string_field};
use crate::db::adapters::connect_error;
use crate::db::builder::{MySqlBuilder, SqlBuilder};
use crate::db::ddl;
use crate::db::decode::RowToJson;
use crate::error::DbResult;
use crate::models::{
    ColumnInfo, ConnectionConfig, DatabaseType, IndexInfo, QueryParam, QueryResult, ServerStats,
};

/// Adapter for MySQL and MariaDB servers.
#[derive(Clone)]
pub struct MySqlAdapter {
    id: String,
    pool: MySqlPool,
    builder: MySqlBuilder,
}

impl std::fmt::Debug for MySqlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdapter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl MySqlAdapter {
    /// Open a connection pool for `config`. Fails if the server cannot be
    /// reached or rejects the credentials.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.effective_port())
            .username(&config.user)
            .password(&config.password)
            .charset("utf8mb4");

        if let Some(database) = &config.database {
            options = options.database(database);
        }
        if let Some(mysql) = &config.options.mysql {
            if let Some(charset) = &mysql.charset {
                options = options.charset(charset);
            }
            if let Some(socket) = &mysql.socket {
                options = options.socket(socket);
            }
        }
        if let Some(ssl) = config.ssl {
            options = options.ssl_mode(if ssl {
                MySqlSslMode::Required
            } else {
                MySqlSslMode::Disabled
            });
        }

        let pool = MySqlPoolOptions::new()
            .min_connections(config.pool.min_connections_or_default())
            .max_connections(config.pool.max_connections_or_default())
            .acquire_timeout(Duration::from_millis(config.connect_timeout_or_default()))
            .idle_timeout(Some(Duration::from_millis(
                config.pool.idle_timeout_or_default(),
            )))
            .connect_with(options)
            .await
            .map_err(|e| {
                connect_error(
                    DatabaseType::MySql,
                    &config.host,
                    config.effective_port(),
                    e,
                )
            })?;

        Ok(Self {
            id: config.id.clone(),
            pool,
            builder: MySqlBuilder,
        })
    }
}

fn bind_param<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Maps `SHOW GLOBAL STATUS` variable names onto [`ServerStats`].
fn status_pairs_to_stats(pairs: &[(String, String)]) -> ServerStats {
    let mut stats = ServerStats::default();
    for (name, value) in pairs {
        let number = value.trim().parse::<u64>().ok();
        match name.as_str() {
            "Uptime" => stats.uptime_secs = number.unwrap_or(0),
            "Threads_connected" => stats.current_connections = number.unwrap_or(0),
            "Max_used_connections" => stats.max_connections = number.unwrap_or(0),
            "Questions" => stats.total_queries = number.unwrap_or(0),
            "Slow_queries" => stats.slow_queries = number.unwrap_or(0),
            "Bytes_received" => stats.bytes_received = number.unwrap_or(0),
            "Bytes_sent" => stats.bytes_sent = number.unwrap_or(0),
            "Threads_running" => stats.threads_running = number,
            _ => {
                stats
                    .additional
                    .insert(name.clone(), serde_json::Value::String(value.clone()));
            }
        }
    }
    stats
}

#[async_trait]
impl Adapter for MySqlAdapter {
    fn connection_id(&self) -> &str {
        &self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn builder(&self) -> &dyn SqlBuilder {
        &self.builder
    }

    async fn disconnect(&self) -> DbResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(err) => {
                debug!(connection_id = %self.id, error = %err, "MySQL ping failed");
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
            "Executing MySQL statement"
        );

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }

        if is_row_returning(sql) {
            let rows = query.fetch_all(&self.pool).await?;
            let columns = rows
                .first()
                .map(|row| row.column_metadata())
                .unwrap_or_default();
            let mapped = rows.iter().map(|row| row.to_json_map()).collect();
            Ok(QueryResult {
                columns,
                rows: mapped,
                rows_affected: None,
                execution_time_ms: start.elapsed().as_millis() as u64,
            })
        } else {
            let done = query.execute(&self.pool).await?;
            Ok(QueryResult::write_result(
                done.rows_affected(),
                start.elapsed().as_millis() as u64,
            ))
        }
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<u64> {
        debug!(
            connection_id = %self.id,
            statement_count = statements.len(),
            "Executing MySQL transaction"
        );
        let tx = self.pool.begin().await?;
        run_transaction(MySqlTx(tx), statements).await
    }

    /// `SHOW CREATE TABLE` gives the authoritative DDL, so prefer it over
    /// rebuilding from catalog metadata.
    async fn native_table_ddl(&self, schema: &str, table: &str) -> DbResult<Option<String>> {
        let sql = self.builder.table_ddl_query(schema, table);
        let result = self.execute_query(&sql, &[]).await?;
        let ddl = result
            .rows
            .first()
            .and_then(|row| string_field(row, "Create Table"));
        Ok(ddl)
    }

    fn build_create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        indexes: &[IndexInfo],
    ) -> String {
        ddl::mysql_create_table(schema, table, columns, indexes)
    }

    fn transform_server_stats(&self, pairs: &[(String, String)]) -> ServerStats {
        status_pairs_to_stats(pairs)
    }
}

struct MySqlTx(sqlx::Transaction<'static, sqlx::MySql>);

impl TxHandle for MySqlTx {
    async fn run(&mut self, sql: &str) -> DbResult<u64> {
        let done = sqlx::query(sql).execute(&mut *self.0).await?;
        Ok(done.rows_affected())
    }

    async fn commit(self) -> DbResult<()> {
        self.0.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        self.0.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_status_pairs_map_known_variables() {
        let stats = status_pairs_to_stats(&[
            pair("Uptime", "86400"),
            pair("Threads_connected", "12"),
            pair("Max_used_connections", "40"),
            pair("Questions", "123456"),
            pair("Slow_queries", "7"),
            pair("Bytes_received", "1024"),
            pair("Bytes_sent", "2048"),
            pair("Threads_running", "3"),
        ]);

        assert_eq!(stats.uptime_secs, 86400);
        assert_eq!(stats.current_connections, 12);
        assert_eq!(stats.max_connections, 40);
        assert_eq!(stats.total_queries, 123456);
        assert_eq!(stats.slow_queries, 7);
        assert_eq!(stats.bytes_received, 1024);
        assert_eq!(stats.bytes_sent, 2048);
        assert_eq!(stats.threads_running, Some(3));
        assert!(stats.additional.is_empty());
    }

    #[test]
    fn test_status_pairs_keep_unknown_variables() {
        let stats = status_pairs_to_stats(&[
            pair("Uptime", "10"),
            pair("Innodb_buffer_pool_reads", "55"),
        ]);

        assert_eq!(stats.uptime_secs, 10);
        assert_eq!(
            stats.additional.get("Innodb_buffer_pool_reads"),
            Some(&serde_json::Value::String("55".to_string()))
        );
    }

    #[test]
    fn test_status_pairs_tolerate_non_numeric_values() {
        let stats = status_pairs_to_stats(&[pair("Uptime", "not-a-number")]);
        assert_eq!(stats.uptime_secs, 0);
    }
}
