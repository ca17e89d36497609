//! Error types for the engine.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. Each variant carries an actionable message; connection and query
//! failures additionally carry a suggestion derived from the driver error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// Driver error code or SQLSTATE, e.g. "42P01" for undefined table
        code: Option<String>,
        suggestion: String,
    },

    #[error("Transaction failed at statement {statement_index}: {message}")]
    Transaction {
        message: String,
        /// 1-based index of the failing statement
        statement_index: usize,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    #[error("Connection '{connection_id}' already exists")]
    DuplicateConnection { connection_id: String },

    #[error("Unsupported database dialect: {dialect}")]
    UnsupportedDialect { dialect: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error without a driver code.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            code: None,
            suggestion: "Check the SQL syntax and referenced objects".to_string(),
        }
    }

    /// Create a query error with an optional driver code.
    pub fn query_with_code(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create a transaction error for the given 1-based statement index.
    pub fn transaction(statement_index: usize, message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            statement_index,
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(connection_id: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_id: connection_id.into(),
        }
    }

    /// Create a duplicate connection error.
    pub fn duplicate_connection(connection_id: impl Into<String>) -> Self {
        Self::DuplicateConnection {
            connection_id: connection_id.into(),
        }
    }

    /// Create an unsupported dialect error.
    pub fn unsupported_dialect(dialect: impl Into<String>) -> Self {
        Self::UnsupportedDialect {
            dialect: dialect.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Generate a helpful suggestion from a raw driver error message.
pub(crate) fn connection_suggestion(raw_error: &str) -> String {
    let error_str = raw_error.to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("timed out") {
        return "Check that the database server is running and accessible".to_string();
    }

    if error_str.contains("authentication")
        || error_str.contains("password")
        || error_str.contains("access denied")
        || error_str.contains("login failed")
    {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist")
        || error_str.contains("unknown database")
        || error_str.contains("cannot open database")
    {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    "Check the host, port and credentials".to_string()
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query_with_code(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::query_with_code(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::query(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert tiberius errors to DbError.
impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Server(token) => DbError::query_with_code(
                token.message().to_string(),
                Some(token.code().to_string()),
                "Check the SQL syntax and referenced objects",
            ),
            tiberius::error::Error::Io { message, .. } => {
                let suggestion = connection_suggestion(&message);
                DbError::connection(format!("I/O error: {}", message), suggestion)
            }
            tiberius::error::Error::Tls(message) => DbError::connection(
                format!("TLS error: {}", message),
                "Verify TLS configuration or set trust_server_certificate",
            ),
            other => {
                let message = other.to_string();
                let suggestion = connection_suggestion(&message);
                DbError::connection(message, suggestion)
            }
        }
    }
}

/// Convert bb8 pool errors (wrapping tiberius) to DbError.
impl From<bb8::RunError<bb8_tiberius::Error>> for DbError {
    fn from(err: bb8::RunError<bb8_tiberius::Error>) -> Self {
        match err {
            bb8::RunError::TimedOut => DbError::timeout("connection pool acquire", 30),
            bb8::RunError::User(inner) => {
                let message = inner.to_string();
                let suggestion = connection_suggestion(&message);
                DbError::connection(message, suggestion)
            }
        }
    }
}

/// Convert oracle driver errors to DbError.
impl From<oracle::Error> for DbError {
    fn from(err: oracle::Error) -> Self {
        // ORA codes stay inside the message text
        DbError::query_with_code(
            err.to_string(),
            None,
            "Check the SQL syntax and referenced objects",
        )
    }
}
