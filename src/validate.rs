//! Opt-in SQL statement validation.
//!
//! Embedding layers that expose ad-hoc query execution can use these helpers
//! to keep a read path read-only or a DDL path DDL-only. The engine itself
//! never applies them; `execute_query` runs whatever it is given.
//!
//! Validation is AST-based via [sqlparser](https://docs.rs/sqlparser/), so a
//! write statement cannot slip past a read-only gate through formatting
//! tricks or dialect quirks.

use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;

/// Coarse classification of a parsed SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT and other row-returning reads (SHOW, EXPLAIN of a read).
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, COPY.
    DmlWrite,
    /// CREATE, ALTER, DROP, TRUNCATE.
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT.
    Transaction,
    /// CALL, EXECUTE, PREPARE.
    ProcedureCall,
    /// GRANT, SET, LOCK and other server administration.
    Administrative,
    /// Parsed, but not in the classification table. Treated as blocked.
    Unknown,
}

fn parser_dialect(dialect: DatabaseType) -> Box<dyn Dialect> {
    match dialect {
        DatabaseType::MySql => Box::new(MySqlDialect {}),
        DatabaseType::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseType::SqlServer => Box::new(MsSqlDialect {}),
        // sqlparser has no dedicated Oracle dialect.
        DatabaseType::Oracle => Box::new(GenericDialect {}),
    }
}

fn parse(sql: &str, dialect: DatabaseType) -> DbResult<Vec<Statement>> {
    let parser = parser_dialect(dialect);
    let statements = Parser::parse_sql(parser.as_ref(), sql)
        .map_err(|e| DbError::invalid_input(format!("Failed to parse SQL: {}", e)))?;
    if statements.is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }
    Ok(statements)
}

/// Check that `sql` contains only read statements.
///
/// Returns `Ok(())` for SELECT, SHOW and EXPLAIN-of-a-read; anything that
/// writes, changes schema, controls transactions, calls procedures or
/// administers the server fails with a permission error naming the
/// offending operation.
pub fn validate_readonly(sql: &str, dialect: DatabaseType) -> DbResult<()> {
    for statement in parse(sql, dialect)? {
        let (kind, operation) = classify(&statement);
        let reason = match kind {
            StatementKind::Read => continue,
            StatementKind::DmlWrite => {
                "Write statements are not allowed on a read-only path; use execute_transaction"
            }
            StatementKind::Ddl => "Schema changes are not allowed on a read-only path",
            StatementKind::Transaction => {
                "Transaction control is not allowed here; use execute_transaction"
            }
            StatementKind::ProcedureCall => {
                "Procedure calls are not allowed on a read-only path"
            }
            StatementKind::Administrative => {
                "Administrative statements are not allowed on a read-only path"
            }
            StatementKind::Unknown => "Only read statements are allowed on this path",
        };
        return Err(DbError::permission(operation, reason));
    }
    Ok(())
}

/// Check that `sql` is exactly one CREATE TABLE statement.
pub fn validate_create_table(sql: &str, dialect: DatabaseType) -> DbResult<()> {
    let statements = parse(sql, dialect)?;
    if statements.len() != 1 {
        return Err(DbError::invalid_input(format!(
            "Expected exactly one statement, found {}",
            statements.len()
        )));
    }
    match &statements[0] {
        Statement::CreateTable { .. } => Ok(()),
        other => {
            let (_, operation) = classify(other);
            Err(DbError::invalid_input(format!(
                "Expected a CREATE TABLE statement, found {}",
                operation
            )))
        }
    }
}

/// Classify a parsed statement and name its operation for error messages.
fn classify(statement: &Statement) -> (StatementKind, &'static str) {
    match statement {
        // Reads.
        Statement::Query(_) => (StatementKind::Read, "SELECT"),
        Statement::ShowTables { .. } => (StatementKind::Read, "SHOW TABLES"),
        Statement::ShowColumns { .. } => (StatementKind::Read, "SHOW COLUMNS"),
        Statement::ShowDatabases { .. } => (StatementKind::Read, "SHOW DATABASES"),
        Statement::ShowSchemas { .. } => (StatementKind::Read, "SHOW SCHEMAS"),
        Statement::ShowCreate { .. } => (StatementKind::Read, "SHOW CREATE"),
        Statement::ShowFunctions { .. } => (StatementKind::Read, "SHOW FUNCTIONS"),
        Statement::ShowVariable { .. } => (StatementKind::Read, "SHOW VARIABLE"),
        Statement::ShowVariables { .. } => (StatementKind::Read, "SHOW VARIABLES"),
        Statement::ShowStatus { .. } => (StatementKind::Read, "SHOW STATUS"),
        Statement::ShowCollation { .. } => (StatementKind::Read, "SHOW COLLATION"),
        Statement::ExplainTable { .. } => (StatementKind::Read, "EXPLAIN TABLE"),

        // EXPLAIN is only a read when the statement under it is one.
        Statement::Explain { statement, .. } => {
            let (inner_kind, inner_name) = classify(statement);
            if inner_kind == StatementKind::Read {
                (StatementKind::Read, "EXPLAIN")
            } else {
                (inner_kind, inner_name)
            }
        }

        // DML writes.
        Statement::Insert(_) => (StatementKind::DmlWrite, "INSERT"),
        Statement::Update { .. } => (StatementKind::DmlWrite, "UPDATE"),
        Statement::Delete(_) => (StatementKind::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (StatementKind::DmlWrite, "MERGE"),
        Statement::Copy { .. } => (StatementKind::DmlWrite, "COPY"),

        // DDL.
        Statement::CreateTable { .. } => (StatementKind::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (StatementKind::Ddl, "CREATE VIEW"),
        Statement::CreateIndex(_) => (StatementKind::Ddl, "CREATE INDEX"),
        Statement::CreateSchema { .. } => (StatementKind::Ddl, "CREATE SCHEMA"),
        Statement::CreateDatabase { .. } => (StatementKind::Ddl, "CREATE DATABASE"),
        Statement::CreateSequence { .. } => (StatementKind::Ddl, "CREATE SEQUENCE"),
        Statement::CreateFunction { .. } => (StatementKind::Ddl, "CREATE FUNCTION"),
        Statement::CreateProcedure { .. } => (StatementKind::Ddl, "CREATE PROCEDURE"),
        Statement::CreateTrigger { .. } => (StatementKind::Ddl, "CREATE TRIGGER"),
        Statement::AlterTable { .. } => (StatementKind::Ddl, "ALTER TABLE"),
        Statement::AlterView { .. } => (StatementKind::Ddl, "ALTER VIEW"),
        Statement::AlterIndex { .. } => (StatementKind::Ddl, "ALTER INDEX"),
        Statement::Drop { .. } => (StatementKind::Ddl, "DROP"),
        Statement::DropFunction { .. } => (StatementKind::Ddl, "DROP FUNCTION"),
        Statement::DropProcedure { .. } => (StatementKind::Ddl, "DROP PROCEDURE"),
        Statement::DropTrigger { .. } => (StatementKind::Ddl, "DROP TRIGGER"),
        Statement::Truncate { .. } => (StatementKind::Ddl, "TRUNCATE"),
        Statement::Comment { .. } => (StatementKind::Ddl, "COMMENT"),

        // Transaction control.
        Statement::StartTransaction { .. } => (StatementKind::Transaction, "BEGIN"),
        Statement::Commit { .. } => (StatementKind::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (StatementKind::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (StatementKind::Transaction, "SAVEPOINT"),
        Statement::ReleaseSavepoint { .. } => (StatementKind::Transaction, "RELEASE SAVEPOINT"),

        // Procedure and prepared-statement machinery.
        Statement::Call { .. } => (StatementKind::ProcedureCall, "CALL"),
        Statement::Execute { .. } => (StatementKind::ProcedureCall, "EXECUTE"),
        Statement::Prepare { .. } => (StatementKind::ProcedureCall, "PREPARE"),
        Statement::Deallocate { .. } => (StatementKind::ProcedureCall, "DEALLOCATE"),

        // Server administration.
        Statement::Grant { .. } => (StatementKind::Administrative, "GRANT"),
        Statement::Revoke { .. } => (StatementKind::Administrative, "REVOKE"),
        Statement::Deny { .. } => (StatementKind::Administrative, "DENY"),
        Statement::Set(_) => (StatementKind::Administrative, "SET"),
        Statement::Use(_) => (StatementKind::Administrative, "USE"),
        Statement::Kill { .. } => (StatementKind::Administrative, "KILL"),
        Statement::LockTables { .. } => (StatementKind::Administrative, "LOCK"),
        Statement::UnlockTables => (StatementKind::Administrative, "UNLOCK"),
        Statement::Flush { .. } => (StatementKind::Administrative, "FLUSH"),
        Statement::Analyze { .. } => (StatementKind::Administrative, "ANALYZE"),
        Statement::Vacuum { .. } => (StatementKind::Administrative, "VACUUM"),
        Statement::Discard { .. } => (StatementKind::Administrative, "DISCARD"),
        Statement::OptimizeTable { .. } => (StatementKind::Administrative, "OPTIMIZE"),
        Statement::LISTEN { .. } => (StatementKind::Administrative, "LISTEN"),
        Statement::UNLISTEN { .. } => (StatementKind::Administrative, "UNLISTEN"),
        Statement::NOTIFY { .. } => (StatementKind::Administrative, "NOTIFY"),

        // Everything else is blocked rather than guessed at.
        _ => (StatementKind::Unknown, "Unknown"),
    }
}
