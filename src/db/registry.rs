//! Connection registry: the directory of live adapters.
//!
//! The registry owns every registered adapter together with the configuration
//! it was built from, keyed by the caller-chosen connection id. It is safe to
//! share behind an `Arc` and call concurrently; register and close on
//! different ids never contend beyond the map lock itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::adapter::Adapter;
use crate::db::adapters::AnyAdapter;
use crate::db::factory;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, ConnectionInfo, ConnectionSummary};

/// Opens adapters from configuration.
///
/// The registry is generic over this seam so tests can swap in a stub that
/// never dials a real server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Adapter: Adapter + Clone + Send + Sync + 'static;

    async fn connect(&self, config: &ConnectionConfig) -> DbResult<Self::Adapter>;
}

/// Production connector: dials the server named by the config's dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialectConnector;

#[async_trait]
impl Connector for DialectConnector {
    type Adapter = AnyAdapter;

    async fn connect(&self, config: &ConnectionConfig) -> DbResult<AnyAdapter> {
        factory::connect(config).await
    }
}

struct Entry<A> {
    adapter: A,
    config: ConnectionConfig,
}

/// Directory of live connections, keyed by connection id.
pub struct ConnectionRegistry<C: Connector = DialectConnector> {
    connector: C,
    connections: Arc<RwLock<HashMap<String, Entry<C::Adapter>>>>,
    default_id: Arc<RwLock<Option<String>>>,
}

impl ConnectionRegistry {
    /// Create a registry that connects to real servers.
    pub fn new() -> Self {
        Self::with_connector(DialectConnector)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> ConnectionRegistry<C> {
    /// Create a registry with a custom connector.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            connections: Arc::new(RwLock::new(HashMap::new())),
            default_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Connect and store a new adapter under `config.id`.
    ///
    /// A duplicate id or a failed connect attempt fails without touching the
    /// registry.
    pub async fn register(&self, config: ConnectionConfig) -> DbResult<ConnectionInfo> {
        let connection_id = config.id.clone();

        // Early check so we do not dial on an obviously duplicate id.
        {
            let connections = self.connections.read().await;
            if connections.contains_key(&connection_id) {
                return Err(DbError::duplicate_connection(&connection_id));
            }
        }

        info!(
            connection_id = %connection_id,
            dialect = %config.dialect,
            "Registering connection"
        );

        let adapter = self.connector.connect(&config).await?;
        let connection_info = config.info();

        // Re-check after the connect to close the race with a concurrent
        // register on the same id. The loser disconnects its fresh adapter
        // outside the lock.
        let duplicate = {
            let mut connections = self.connections.write().await;
            if connections.contains_key(&connection_id) {
                Some(adapter)
            } else {
                connections.insert(connection_id.clone(), Entry { adapter, config });
                None
            }
        };

        if let Some(adapter) = duplicate {
            if let Err(err) = adapter.disconnect().await {
                warn!(
                    connection_id = %connection_id,
                    error = %err,
                    "Failed to close adapter that lost a concurrent register"
                );
            }
            return Err(DbError::duplicate_connection(&connection_id));
        }

        info!(connection_id = %connection_id, "Connection registered");
        Ok(connection_info)
    }

    /// Register several connections concurrently.
    ///
    /// Every configuration is attempted; the ones that connect stay
    /// registered even when others fail. Any failure turns the whole call
    /// into an error listing each failed id with its reason.
    pub async fn register_many(
        &self,
        configs: Vec<ConnectionConfig>,
    ) -> DbResult<Vec<ConnectionInfo>> {
        let ids: Vec<String> = configs.iter().map(|config| config.id.clone()).collect();
        let results = join_all(configs.into_iter().map(|config| self.register(config))).await;

        let mut infos = Vec::new();
        let mut failures = Vec::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(connection_info) => infos.push(connection_info),
                Err(err) => failures.push(format!("{}: {}", id, err)),
            }
        }

        if failures.is_empty() {
            return Ok(infos);
        }
        Err(DbError::connection(
            format!(
                "Failed to register {} connection(s): {}",
                failures.len(),
                failures.join("; ")
            ),
            "Fix the failing configurations and register them again; the others stayed registered",
        ))
    }

    /// Look up a live adapter by id.
    pub async fn get(&self, connection_id: &str) -> DbResult<C::Adapter> {
        let connections = self.connections.read().await;
        connections
            .get(connection_id)
            .map(|entry| entry.adapter.clone())
            .ok_or_else(|| DbError::connection_not_found(connection_id))
    }

    /// Check if a connection id is registered.
    pub async fn contains(&self, connection_id: &str) -> bool {
        let connections = self.connections.read().await;
        connections.contains_key(connection_id)
    }

    /// All registered connection ids, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut ids: Vec<String> = connections.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Summaries of every registered connection, sorted by id.
    pub async fn list_all(&self) -> Vec<ConnectionSummary> {
        let connections = self.connections.read().await;
        let mut summaries: Vec<ConnectionSummary> = connections
            .values()
            .map(|entry| entry.config.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Connection details for `connection_id`. Never includes the password.
    pub async fn info(&self, connection_id: &str) -> DbResult<ConnectionInfo> {
        let connections = self.connections.read().await;
        connections
            .get(connection_id)
            .map(|entry| entry.config.info())
            .ok_or_else(|| DbError::connection_not_found(connection_id))
    }

    /// Number of registered connections.
    pub async fn count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Close and remove one connection. An unknown id logs a warning and
    /// returns Ok.
    pub async fn close(&self, connection_id: &str) -> DbResult<()> {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(connection_id)
        };

        let entry = match removed {
            Some(entry) => entry,
            None => {
                warn!(connection_id = %connection_id, "Close requested for unknown connection");
                return Ok(());
            }
        };

        {
            let mut default_id = self.default_id.write().await;
            if default_id.as_deref() == Some(connection_id) {
                *default_id = None;
            }
        }

        entry.adapter.disconnect().await?;
        info!(connection_id = %connection_id, "Connection closed");
        Ok(())
    }

    /// Close every connection independently and empty the registry.
    ///
    /// One failed disconnect never blocks the others; failures are returned
    /// alongside a warning log, not raised.
    pub async fn close_all(&self) -> Vec<(String, DbError)> {
        let entries: Vec<(String, Entry<C::Adapter>)> = {
            let mut connections = self.connections.write().await;
            connections.drain().collect()
        };
        {
            let mut default_id = self.default_id.write().await;
            *default_id = None;
        }

        let mut failures = Vec::new();
        for (id, entry) in entries {
            info!(connection_id = %id, "Closing connection");
            if let Err(err) = entry.adapter.disconnect().await {
                warn!(connection_id = %id, error = %err, "Failed to close connection");
                failures.push((id, err));
            }
        }
        info!("All connections closed");
        failures
    }

    /// Liveness check for one connection. Unknown ids report `false`.
    pub async fn ping(&self, connection_id: &str) -> bool {
        let adapter = {
            let connections = self.connections.read().await;
            connections
                .get(connection_id)
                .map(|entry| entry.adapter.clone())
        };
        match adapter {
            Some(adapter) => adapter.ping().await,
            None => false,
        }
    }

    /// Ping every registered connection concurrently, sorted by id.
    pub async fn ping_all(&self) -> Vec<(String, bool)> {
        let adapters: Vec<(String, C::Adapter)> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .map(|(id, entry)| (id.clone(), entry.adapter.clone()))
                .collect()
        };

        let checks = adapters.into_iter().map(|(id, adapter)| async move {
            let alive = adapter.ping().await;
            (id, alive)
        });
        let mut results = join_all(checks).await;
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Close `connection_id` and reconnect it from the stored configuration.
    /// Keeps its default-connection marker if it had one.
    pub async fn restart(&self, connection_id: &str) -> DbResult<ConnectionInfo> {
        let config = {
            let connections = self.connections.read().await;
            match connections.get(connection_id) {
                Some(entry) => entry.config.clone(),
                None => return Err(DbError::connection_not_found(connection_id)),
            }
        };
        let was_default = {
            let default_id = self.default_id.read().await;
            default_id.as_deref() == Some(connection_id)
        };

        self.close(connection_id).await?;
        let connection_info = self.register(config).await?;
        if was_default {
            self.set_default(connection_id).await?;
        }
        info!(connection_id = %connection_id, "Connection restarted");
        Ok(connection_info)
    }

    /// Mark `connection_id` as the default for calls that omit an id.
    pub async fn set_default(&self, connection_id: &str) -> DbResult<()> {
        {
            let connections = self.connections.read().await;
            if !connections.contains_key(connection_id) {
                return Err(DbError::connection_not_found(connection_id));
            }
        }
        let mut default_id = self.default_id.write().await;
        *default_id = Some(connection_id.to_string());
        debug!(connection_id = %connection_id, "Default connection set");
        Ok(())
    }

    /// Drop the default marker without touching any connection.
    pub async fn clear_default(&self) {
        let mut default_id = self.default_id.write().await;
        *default_id = None;
    }

    /// Resolve which connection a caller meant: an explicit id wins, then
    /// the default, then the only registered connection. Anything else is an
    /// error naming the candidates.
    pub async fn resolve(&self, connection_id: Option<&str>) -> DbResult<String> {
        if let Some(id) = connection_id {
            let connections = self.connections.read().await;
            if connections.contains_key(id) {
                return Ok(id.to_string());
            }
            return Err(DbError::connection_not_found(id));
        }

        {
            let default_id = self.default_id.read().await;
            if let Some(id) = default_id.as_ref() {
                return Ok(id.clone());
            }
        }

        let connections = self.connections.read().await;
        if connections.len() == 1 {
            if let Some(id) = connections.keys().next() {
                return Ok(id.clone());
            }
        }

        let mut available: Vec<&str> = connections.keys().map(String::as_str).collect();
        available.sort_unstable();
        if available.is_empty() {
            return Err(DbError::invalid_input(
                "No connections are registered; register one first",
            ));
        }
        Err(DbError::invalid_input(format!(
            "No connection id given and no default set; available: {}",
            available.join(", ")
        )))
    }

    /// Resolve and fetch in one step.
    pub async fn adapter(&self, connection_id: Option<&str>) -> DbResult<C::Adapter> {
        let id = self.resolve(connection_id).await?;
        self.get(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::db::builder::{MySqlBuilder, SqlBuilder};
    use crate::models::{
        ColumnInfo, DatabaseType, IndexInfo, QueryParam, QueryResult, ServerStats,
    };

    #[derive(Clone, Debug)]
    struct StubAdapter {
        id: String,
        fail_disconnect: bool,
        alive: bool,
        closed_log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn connection_id(&self) -> &str {
            &self.id
        }

        fn database_type(&self) -> DatabaseType {
            DatabaseType::MySql
        }

        fn builder(&self) -> &dyn SqlBuilder {
            &MySqlBuilder
        }

        async fn disconnect(&self) -> DbResult<()> {
            if self.fail_disconnect {
                return Err(DbError::internal("stub disconnect failure"));
            }
            self.closed_log.lock().unwrap().push(self.id.clone());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.alive
        }

        async fn ping(&self) -> bool {
            self.alive
        }

        async fn execute_query(
            &self,
            _sql: &str,
            _params: &[QueryParam],
        ) -> DbResult<QueryResult> {
            Ok(QueryResult::empty(0))
        }

        async fn execute_transaction(&self, _statements: &[String]) -> DbResult<u64> {
            Ok(0)
        }

        fn build_create_table(
            &self,
            _schema: &str,
            _table: &str,
            _columns: &[ColumnInfo],
            _indexes: &[IndexInfo],
        ) -> String {
            String::new()
        }

        fn transform_server_stats(&self, _pairs: &[(String, String)]) -> ServerStats {
            ServerStats::default()
        }
    }

    struct StubConnector {
        fail_ids: Vec<String>,
        dead_ids: Vec<String>,
        disconnect_fail_ids: Vec<String>,
        closed_log: Arc<Mutex<Vec<String>>>,
        connect_calls: AtomicUsize,
    }

    impl StubConnector {
        fn new() -> Self {
            Self {
                fail_ids: Vec::new(),
                dead_ids: Vec::new(),
                disconnect_fail_ids: Vec::new(),
                closed_log: Arc::new(Mutex::new(Vec::new())),
                connect_calls: AtomicUsize::new(0),
            }
        }

        fn failing_on(mut self, id: &str) -> Self {
            self.fail_ids.push(id.to_string());
            self
        }

        fn dead_on(mut self, id: &str) -> Self {
            self.dead_ids.push(id.to_string());
            self
        }

        fn disconnect_failing_on(mut self, id: &str) -> Self {
            self.disconnect_fail_ids.push(id.to_string());
            self
        }
    }

    #[async_trait]
    impl Connector for StubConnector {
        type Adapter = StubAdapter;

        async fn connect(&self, config: &ConnectionConfig) -> DbResult<StubAdapter> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&config.id) {
                return Err(DbError::connection(
                    format!("refused connection for '{}'", config.id),
                    "stub connector always refuses this id",
                ));
            }
            Ok(StubAdapter {
                id: config.id.clone(),
                fail_disconnect: self.disconnect_fail_ids.contains(&config.id),
                alive: !self.dead_ids.contains(&config.id),
                closed_log: self.closed_log.clone(),
            })
        }
    }

    fn config(id: &str) -> ConnectionConfig {
        ConnectionConfig::new(id, DatabaseType::MySql, "localhost", "root", "secret")
            .with_database("appdb")
    }

    fn registry() -> ConnectionRegistry<StubConnector> {
        ConnectionRegistry::with_connector(StubConnector::new())
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = registry();
        let connection_info = registry.register(config("db1")).await.unwrap();
        assert_eq!(connection_info.id, "db1");

        let adapter = registry.get("db1").await.unwrap();
        assert_eq!(adapter.connection_id(), "db1");
        assert!(registry.contains("db1").await);
        assert_eq!(registry.ids().await, vec!["db1".to_string()]);
    }

    #[tokio::test]
    async fn test_register_duplicate_keeps_original() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();

        let err = registry.register(config("db1")).await.unwrap_err();
        assert!(err.to_string().contains("db1"));
        assert_eq!(registry.count().await, 1);
        assert!(registry.get("db1").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_registry_unchanged() {
        let registry = ConnectionRegistry::with_connector(StubConnector::new().failing_on("bad"));
        registry.register(config("db1")).await.unwrap();

        let err = registry.register(config("bad")).await.unwrap_err();
        assert!(err.to_string().contains("bad"));
        assert_eq!(registry.ids().await, vec!["db1".to_string()]);
        assert!(!registry.contains("bad").await);
    }

    #[tokio::test]
    async fn test_get_unknown_fails() {
        let registry = registry();
        let err = registry.get("missing").await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_close_unknown_is_ok() {
        let registry = registry();
        assert!(registry.close("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_close_removes_connection() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();
        registry.close("db1").await.unwrap();

        assert!(!registry.contains("db1").await);
        assert!(registry.get("db1").await.is_err());
    }

    #[tokio::test]
    async fn test_close_all_removes_everything_despite_failures() {
        let connector = StubConnector::new().disconnect_failing_on("flaky");
        let registry = ConnectionRegistry::with_connector(connector);
        registry.register(config("db1")).await.unwrap();
        registry.register(config("flaky")).await.unwrap();
        registry.register(config("db2")).await.unwrap();

        let failures = registry.close_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "flaky");
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_register_many_pairs_failures_with_ids() {
        let connector = StubConnector::new().failing_on("bad-a").failing_on("bad-b");
        let registry = ConnectionRegistry::with_connector(connector);

        let err = registry
            .register_many(vec![
                config("db1"),
                config("bad-a"),
                config("db2"),
                config("bad-b"),
            ])
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("bad-a: "));
        assert!(message.contains("bad-b: "));
        assert!(!message.contains("db1:"));
        // Successful registrations survive the aggregate failure.
        assert_eq!(registry.ids().await, vec!["db1".to_string(), "db2".to_string()]);
    }

    #[tokio::test]
    async fn test_register_many_all_ok() {
        let registry = registry();
        let infos = registry
            .register_many(vec![config("db1"), config("db2")])
            .await
            .unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(registry.count().await, 2);
    }

    #[tokio::test]
    async fn test_ping_unknown_is_false() {
        let registry = registry();
        assert!(!registry.ping("missing").await);
    }

    #[tokio::test]
    async fn test_ping_all_reports_each_connection() {
        let connector = StubConnector::new().dead_on("down");
        let registry = ConnectionRegistry::with_connector(connector);
        registry.register(config("db1")).await.unwrap();
        registry.register(config("down")).await.unwrap();

        let results = registry.ping_all().await;
        assert_eq!(
            results,
            vec![("db1".to_string(), true), ("down".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_restart_reconnects_with_stored_config() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();

        let connection_info = registry.restart("db1").await.unwrap();
        assert_eq!(connection_info.id, "db1");
        assert!(registry.contains("db1").await);
        assert_eq!(registry.connector.connect_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            registry.connector.closed_log.lock().unwrap().as_slice(),
            &["db1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_restart_unknown_fails() {
        let registry = registry();
        assert!(registry.restart("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_restart_keeps_default_marker() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();
        registry.set_default("db1").await.unwrap();

        registry.restart("db1").await.unwrap();
        assert_eq!(registry.resolve(None).await.unwrap(), "db1");
    }

    #[tokio::test]
    async fn test_resolve_explicit_id() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();
        registry.register(config("db2")).await.unwrap();

        assert_eq!(registry.resolve(Some("db2")).await.unwrap(), "db2");
        assert!(registry.resolve(Some("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_default_then_sole() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();

        // Sole connection resolves without a default.
        assert_eq!(registry.resolve(None).await.unwrap(), "db1");

        registry.register(config("db2")).await.unwrap();
        let err = registry.resolve(None).await.unwrap_err();
        assert!(err.to_string().contains("db1"));
        assert!(err.to_string().contains("db2"));

        registry.set_default("db2").await.unwrap();
        assert_eq!(registry.resolve(None).await.unwrap(), "db2");

        registry.clear_default().await;
        assert!(registry.resolve(None).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_with_nothing_registered() {
        let registry = registry();
        let err = registry.resolve(None).await.unwrap_err();
        assert!(err.to_string().contains("No connections"));
    }

    #[tokio::test]
    async fn test_set_default_requires_existing_connection() {
        let registry = registry();
        assert!(registry.set_default("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_closing_default_clears_marker() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();
        registry.register(config("db2")).await.unwrap();
        registry.set_default("db1").await.unwrap();

        registry.close("db1").await.unwrap();
        let err = registry.resolve(None).await.unwrap_err();
        assert!(err.to_string().contains("db2"));
    }

    #[tokio::test]
    async fn test_info_never_exposes_password() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();

        let connection_info = registry.info("db1").await.unwrap();
        let json = serde_json::to_value(&connection_info).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["id"], "db1");

        for summary in registry.list_all().await {
            let json = serde_json::to_value(&summary).unwrap();
            assert!(json.get("password").is_none());
        }
    }

    #[tokio::test]
    async fn test_adapter_resolves_and_fetches() {
        let registry = registry();
        registry.register(config("db1")).await.unwrap();
        let adapter = registry.adapter(None).await.unwrap();
        assert_eq!(adapter.connection_id(), "db1");
    }
}
