//! Maps a connection configuration onto its concrete dialect adapter.

use tracing::debug;

use crate::db::adapters::{
    AnyAdapter, MySqlAdapter, OracleAdapter, PostgresAdapter, SqlServerAdapter,
};
use crate::error::DbResult;
use crate::models::{ConnectionConfig, DatabaseType};

/// Validate `config`, connect to the server it describes, and wrap the
/// connection in the matching dialect adapter.
pub async fn connect(config: &ConnectionConfig) -> DbResult<AnyAdapter> {
    config.validate()?;
    debug!(
        connection_id = %config.id,
        dialect = %config.dialect,
        host = %config.host,
        "Building adapter"
    );
    let adapter = match config.dialect {
        DatabaseType::MySql => AnyAdapter::MySql(MySqlAdapter::connect(config).await?),
        DatabaseType::Postgres => AnyAdapter::Postgres(PostgresAdapter::connect(config).await?),
        DatabaseType::SqlServer => AnyAdapter::SqlServer(SqlServerAdapter::connect(config).await?),
        DatabaseType::Oracle => AnyAdapter::Oracle(OracleAdapter::connect(config).await?),
    };
    Ok(adapter)
}

/// The closed set of dialects this crate can connect to.
pub fn supported_dialects() -> &'static [DatabaseType] {
    &DatabaseType::ALL
}

/// Whether `tag` names a supported dialect (aliases included).
pub fn is_supported(tag: &str) -> bool {
    tag.parse::<DatabaseType>().is_ok()
}
