//! Connection-related data models.
//!
//! This module defines the connection configuration shared by every dialect
//! adapter, plus the password-free projections handed back to callers.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};

/// Default maximum pool size when the config does not set one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default minimum pool size when the config does not set one.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;

/// Default idle timeout for pooled connections, in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MILLIS: u64 = 30_000;

/// Default connect timeout, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MILLIS: u64 = 15_000;

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    /// Includes MariaDB
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgresql")]
    Postgres,
    /// Microsoft SQL Server / Azure SQL
    #[serde(rename = "mssql")]
    SqlServer,
    #[serde(rename = "oracle")]
    Oracle,
}

impl DatabaseType {
    /// All dialects this crate can connect to.
    pub const ALL: [DatabaseType; 4] = [
        DatabaseType::MySql,
        DatabaseType::Postgres,
        DatabaseType::SqlServer,
        DatabaseType::Oracle,
    ];

    /// The canonical configuration tag for this dialect.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgresql",
            Self::SqlServer => "mssql",
            Self::Oracle => "oracle",
        }
    }

    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::SqlServer => "SQL Server",
            Self::Oracle => "Oracle",
        }
    }

    /// Get the default server port for this dialect.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::SqlServer => 1433,
            Self::Oracle => 1521,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgresql" | "postgres" => Ok(Self::Postgres),
            "mssql" | "sqlserver" => Ok(Self::SqlServer),
            "oracle" => Ok(Self::Oracle),
            other => Err(DbError::unsupported_dialect(other)),
        }
    }
}

/// Connection pool bounds, passed straight through to the native driver pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in the pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum connections kept open (default: 0)
    pub min_connections: Option<u32>,
    /// Idle timeout in milliseconds (default: 30000)
    pub idle_timeout_millis: Option<u64>,
}

impl PoolOptions {
    /// Get max_connections with the default applied.
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// Get min_connections with the default applied.
    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    /// Get the idle timeout with the default applied.
    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_millis
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_MILLIS)
    }
}

/// MySQL-specific connection options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MySqlOptions {
    /// Connection character set (e.g. `utf8mb4`)
    pub charset: Option<String>,
    /// Unix socket path, used instead of host/port when set
    pub socket: Option<String>,
}

/// PostgreSQL-specific connection options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostgresOptions {
    /// Reported `application_name`
    pub application_name: Option<String>,
    /// Session `search_path` override
    pub search_path: Option<String>,
}

/// SQL Server-specific connection options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlServerOptions {
    /// Reported application name
    pub application_name: Option<String>,
    /// Accept the server certificate without CA validation (default: true)
    pub trust_server_certificate: Option<bool>,
}

impl SqlServerOptions {
    /// Whether to trust the server certificate (defaults to true).
    pub fn trust_server_certificate_or_default(&self) -> bool {
        self.trust_server_certificate.unwrap_or(true)
    }
}

/// Oracle-specific connection options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleOptions {
    /// Full connect string override (e.g. `//db1.example.com:1521/XEPDB1`).
    /// When set, host/port/database from the config are ignored.
    pub connect_string: Option<String>,
}

/// Typed per-dialect option sections. At most the section matching the
/// configured dialect may be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialectOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mysql: Option<MySqlOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mssql: Option<SqlServerOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleOptions>,
}

impl DialectOptions {
    /// True when no section is set.
    pub fn is_empty(&self) -> bool {
        self.mysql.is_none()
            && self.postgres.is_none()
            && self.mssql.is_none()
            && self.oracle.is_none()
    }

    /// Name of the first section that does not match `dialect`, if any.
    fn mismatched_section(&self, dialect: DatabaseType) -> Option<&'static str> {
        let sections: [(&'static str, bool, DatabaseType); 4] = [
            ("mysql", self.mysql.is_some(), DatabaseType::MySql),
            ("postgres", self.postgres.is_some(), DatabaseType::Postgres),
            ("mssql", self.mssql.is_some(), DatabaseType::SqlServer),
            ("oracle", self.oracle.is_some(), DatabaseType::Oracle),
        ];
        sections
            .into_iter()
            .find(|(_, set, d)| *set && *d != dialect)
            .map(|(name, _, _)| name)
    }
}

/// Configuration for one database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Caller-chosen identifier, unique within a registry.
    pub id: String,
    pub dialect: DatabaseType,
    pub host: String,
    /// Server port; dialect default when unset.
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    /// Contains sensitive data - never serialized or logged
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password: String,
    /// Database / service name. Optional for server-level connections.
    #[serde(default)]
    pub database: Option<String>,
    /// Enable TLS where the driver supports toggling it.
    #[serde(default)]
    pub ssl: Option<bool>,
    /// Connect timeout in milliseconds (default: 15000)
    #[serde(default)]
    pub connect_timeout_millis: Option<u64>,
    /// Per-request timeout in milliseconds, where the driver supports one.
    #[serde(default)]
    pub request_timeout_millis: Option<u64>,
    /// Pool bounds for the native driver pool.
    #[serde(default)]
    pub pool: PoolOptions,
    /// Dialect-specific options.
    #[serde(default)]
    pub options: DialectOptions,
}

impl ConnectionConfig {
    /// Create a configuration with required fields only.
    pub fn new(
        id: impl Into<String>,
        dialect: DatabaseType,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            dialect,
            host: host.into(),
            port: None,
            user: user.into(),
            password: password.into(),
            database: None,
            ssl: None,
            connect_timeout_millis: None,
            request_timeout_millis: None,
            pool: PoolOptions::default(),
            options: DialectOptions::default(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database / service name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the TLS flag.
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    /// Set pool bounds.
    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }

    /// Set dialect-specific options.
    pub fn with_options(mut self, options: DialectOptions) -> Self {
        self.options = options;
        self
    }

    /// The port to connect to, falling back to the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }

    /// Connect timeout with the default applied.
    pub fn connect_timeout_or_default(&self) -> u64 {
        self.connect_timeout_millis
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MILLIS)
    }

    /// Check the configuration for problems that would fail every connect.
    pub fn validate(&self) -> DbResult<()> {
        if self.id.is_empty() {
            return Err(DbError::invalid_input("connection id cannot be empty"));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DbError::invalid_input(format!(
                "connection id contains invalid characters: {}",
                self.id
            )));
        }
        if self.host.is_empty() {
            return Err(DbError::invalid_input("host cannot be empty"));
        }
        if self.user.is_empty() {
            return Err(DbError::invalid_input("user cannot be empty"));
        }
        if let Some(section) = self.options.mismatched_section(self.dialect) {
            return Err(DbError::invalid_input(format!(
                "options.{} set but dialect is {}",
                section,
                self.dialect.as_str()
            )));
        }
        Ok(())
    }

    /// Password-free projection for callers.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id.clone(),
            dialect: self.dialect,
            host: self.host.clone(),
            port: self.effective_port(),
            user: self.user.clone(),
            database: self.database.clone(),
            ssl: self.ssl,
            pool: self.pool.clone(),
        }
    }

    /// Short listing entry for this connection.
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            id: self.id.clone(),
            dialect: self.dialect,
            host: self.host.clone(),
            database: self.database.clone(),
        }
    }
}

/// Details of a registered connection, with credentials stripped.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub dialect: DatabaseType,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
    pub pool: PoolOptions,
}

/// One row of the connection listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub dialect: DatabaseType,
    pub host: String,
    pub database: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_tag_round_trip() {
        for dialect in DatabaseType::ALL {
            let parsed: DatabaseType = dialect.as_str().parse().unwrap();
            assert_eq!(parsed, dialect);
        }
    }

    #[test]
    fn test_dialect_aliases() {
        assert_eq!("mariadb".parse::<DatabaseType>().unwrap(), DatabaseType::MySql);
        assert_eq!(
            "postgres".parse::<DatabaseType>().unwrap(),
            DatabaseType::Postgres
        );
        assert_eq!(
            "sqlserver".parse::<DatabaseType>().unwrap(),
            DatabaseType::SqlServer
        );
    }

    #[test]
    fn test_unsupported_dialect_fails() {
        let err = "sqlite".parse::<DatabaseType>().unwrap_err();
        assert!(matches!(err, DbError::UnsupportedDialect { dialect } if dialect == "sqlite"));
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(DatabaseType::MySql.default_port(), 3306);
        assert_eq!(DatabaseType::Postgres.default_port(), 5432);
        assert_eq!(DatabaseType::SqlServer.default_port(), 1433);
        assert_eq!(DatabaseType::Oracle.default_port(), 1521);
    }

    #[test]
    fn test_config_effective_port() {
        let config = ConnectionConfig::new("db1", DatabaseType::Oracle, "localhost", "scott", "x");
        assert_eq!(config.effective_port(), 1521);
        assert_eq!(config.with_port(1522).effective_port(), 1522);
    }

    #[test]
    fn test_config_validate_empty_id() {
        let config = ConnectionConfig::new("", DatabaseType::MySql, "localhost", "root", "x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_bad_id() {
        let config = ConnectionConfig::new("my conn", DatabaseType::MySql, "localhost", "root", "x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_mismatched_options() {
        let config = ConnectionConfig::new("db1", DatabaseType::MySql, "localhost", "root", "x")
            .with_options(DialectOptions {
                oracle: Some(OracleOptions::default()),
                ..Default::default()
            });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("options.oracle"));
    }

    #[test]
    fn test_config_validate_matching_options() {
        let config = ConnectionConfig::new("db1", DatabaseType::MySql, "localhost", "root", "x")
            .with_options(DialectOptions {
                mysql: Some(MySqlOptions {
                    charset: Some("utf8mb4".into()),
                    socket: None,
                }),
                ..Default::default()
            });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_never_serialized() {
        let config = ConnectionConfig::new("db1", DatabaseType::Postgres, "localhost", "app", "s3cret")
            .with_database("appdb");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!json.contains("password"));

        let info_json = serde_json::to_string(&config.info()).unwrap();
        assert!(!info_json.contains("s3cret"));
    }

    #[test]
    fn test_config_deserializes_without_password() {
        let json = r#"{"id":"db1","dialect":"mysql","host":"localhost","user":"root"}"#;
        let config: ConnectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.password, "");
        assert_eq!(config.dialect, DatabaseType::MySql);
    }

    #[test]
    fn test_summary_fields() {
        let config = ConnectionConfig::new("db1", DatabaseType::SqlServer, "db.example.com", "sa", "x")
            .with_database("erp");
        let summary = config.summary();
        assert_eq!(summary.id, "db1");
        assert_eq!(summary.dialect, DatabaseType::SqlServer);
        assert_eq!(summary.host, "db.example.com");
        assert_eq!(summary.database.as_deref(), Some("erp"));
    }
}
