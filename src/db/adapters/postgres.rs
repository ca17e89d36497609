//! PostgreSQL adapter backed by a sqlx connection pool.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tracing::debug;

use crate::db::adapter::{Adapter, TxHandle, is_row_returning, run_transaction, string_field};
use crate::db::adapters::{PlaceholderStyle, connect_error, number_placeholders};
use crate::db::builder::{PostgresBuilder, SqlBuilder};
use crate::db::ddl;
use crate::db::decode::RowToJson;
use crate::error::DbResult;
use crate::models::{
    ColumnInfo, ConnectionConfig, DatabaseType, IndexInfo, QueryParam, QueryResult,
};

/// Adapter for PostgreSQL servers.
#[derive(Clone)]
pub struct PostgresAdapter {
    id: String,
    pool: PgPool,
    builder: PostgresBuilder,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PostgresAdapter {
    /// Open a connection pool for `config`. Fails if the server cannot be
    /// reached or rejects the credentials.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.effective_port())
            .username(&config.user)
            .password(&config.password);

        if let Some(database) = &config.database {
            options = options.database(database);
        }
        if let Some(postgres) = &config.options.postgres {
            if let Some(application_name) = &postgres.application_name {
                options = options.application_name(application_name);
            }
            if let Some(search_path) = &postgres.search_path {
                options = options.options([("search_path", search_path.as_str())]);
            }
        }
        if let Some(ssl) = config.ssl {
            options = options.ssl_mode(if ssl {
                PgSslMode::Require
            } else {
                PgSslMode::Disable
            });
        }

        let pool = PgPoolOptions::new()
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
                    DatabaseType::Postgres,
                    &config.host,
                    config.effective_port(),
                    e,
                )
            })?;

        Ok(Self {
            id: config.id.clone(),
            pool,
            builder: PostgresBuilder,
        })
    }
}

fn bind_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn connection_id(&self) -> &str {
        &self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
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
                debug!(connection_id = %self.id, error = %err, "PostgreSQL ping failed");
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
            "Executing PostgreSQL statement"
        );

        // The driver only understands $N placeholders.
        let sql = if params.is_empty() {
            sql.to_string()
        } else {
            number_placeholders(sql, PlaceholderStyle::Dollar)
        };

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param);
        }

        if is_row_returning(&sql) {
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
            "Executing PostgreSQL transaction"
        );
        let tx = self.pool.begin().await?;
        run_transaction(PgTx(tx), statements).await
    }

    /// The catalog query assembles the full statement server-side from
    /// `pg_catalog`, so use it before falling back to metadata assembly.
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
        ddl::postgres_create_table(schema, table, columns, indexes)
    }
}

struct PgTx(sqlx::Transaction<'static, sqlx::Postgres>);

impl TxHandle for PgTx {
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
