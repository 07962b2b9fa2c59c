//! One-shot SQL execution against a caller-specified server.

use super::{row_to_json, ConnectionInfo};
use crate::config::MysqlDefaults;
use serde_json::Value;
use sqlx::mysql::{MySqlConnection, MySqlDatabaseError};
use sqlx::Connection;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Leading-keyword classification of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Show,
    Describe,
    Explain,
    Other,
}

impl SqlType {
    /// Case- and whitespace-insensitive on the first keyword only; the rest
    /// of the statement is never inspected.
    pub fn classify(sql: &str) -> Self {
        let lower = sql.trim_start().to_lowercase();
        for (prefix, ty) in [
            ("select", SqlType::Select),
            ("insert", SqlType::Insert),
            ("update", SqlType::Update),
            ("delete", SqlType::Delete),
            ("create", SqlType::Create),
            ("drop", SqlType::Drop),
            ("alter", SqlType::Alter),
            ("show", SqlType::Show),
            ("describe", SqlType::Describe),
            ("explain", SqlType::Explain),
        ] {
            if lower.starts_with(prefix) {
                return ty;
            }
        }
        SqlType::Other
    }

    /// Reads fetch result rows; everything else commits and reports the
    /// affected-row count.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            SqlType::Select | SqlType::Show | SqlType::Describe | SqlType::Explain
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SqlType::Select => "SELECT",
            SqlType::Insert => "INSERT",
            SqlType::Update => "UPDATE",
            SqlType::Delete => "DELETE",
            SqlType::Create => "CREATE",
            SqlType::Drop => "DROP",
            SqlType::Alter => "ALTER",
            SqlType::Show => "SHOW",
            SqlType::Describe => "DESCRIBE",
            SqlType::Explain => "EXPLAIN",
            SqlType::Other => "OTHER",
        }
    }
}

/// Result of one executed statement: result rows for reads, the affected-row
/// count for writes.
#[derive(Debug)]
pub struct SqlOutcome {
    pub data: Value,
    pub row_count: u64,
    pub execution_time: f64,
    pub sql_type: SqlType,
}

#[derive(Error, Debug)]
pub enum ExecuteError {
    /// Driver- or network-level failure, with the native MySQL error number
    /// when the server reported one.
    #[error("database error: {message}")]
    Database {
        code: Option<u32>,
        message: String,
        sql: String,
        execution_time: f64,
    },
    /// Anything else, e.g. the caller-supplied statement timeout expiring.
    #[error("sql execution failed: {message}")]
    Execution { message: String, execution_time: f64 },
}

pub struct SqlExecutor {
    defaults: MysqlDefaults,
}

impl SqlExecutor {
    pub fn new(defaults: MysqlDefaults) -> Self {
        Self { defaults }
    }

    pub fn default_timeout(&self) -> u64 {
        self.defaults.connection_timeout
    }

    /// Execute one statement, exactly once, over a fresh connection.
    ///
    /// The connect timeout is the larger of the caller's timeout and 60
    /// seconds to tolerate slow network paths; the statement itself is
    /// bounded by the caller's timeout. The connection is closed on every
    /// path before returning.
    pub async fn execute(
        &self,
        sql: &str,
        info: &ConnectionInfo,
        timeout_secs: u64,
    ) -> Result<SqlOutcome, ExecuteError> {
        let started = Instant::now();
        let opts = info.connect_options(&self.defaults);
        let connect_timeout = Duration::from_secs(timeout_secs.max(60));
        let statement_timeout = Duration::from_secs(timeout_secs);

        tracing::info!(endpoint = %info.endpoint(&self.defaults), "connecting to database");
        let mut conn =
            match tokio::time::timeout(connect_timeout, MySqlConnection::connect_with(&opts)).await
            {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => return Err(classify_driver(e, sql, started)),
                Err(_) => return Err(connect_timeout_error(connect_timeout.as_secs(), sql, started)),
            };

        let sql_type = SqlType::classify(sql);
        tracing::info!(sql = %truncate_sql(sql), sql_type = sql_type.as_str(), "executing statement");

        let result = if sql_type.is_read() {
            match tokio::time::timeout(statement_timeout, sqlx::query(sql).fetch_all(&mut conn))
                .await
            {
                Ok(Ok(rows)) => {
                    let data: Vec<Value> =
                        rows.iter().map(|r| Value::Object(row_to_json(r))).collect();
                    let row_count = data.len() as u64;
                    tracing::info!(row_count, "query returned rows");
                    Ok(SqlOutcome {
                        data: Value::Array(data),
                        row_count,
                        execution_time: started.elapsed().as_secs_f64(),
                        sql_type,
                    })
                }
                Ok(Err(e)) => Err(classify_driver(e, sql, started)),
                Err(_) => Err(statement_timeout_error(timeout_secs, started)),
            }
        } else {
            // Writes run with the driver's autocommit; no explicit
            // transaction is opened around a single statement.
            match tokio::time::timeout(statement_timeout, sqlx::query(sql).execute(&mut conn)).await
            {
                Ok(Ok(done)) => {
                    let affected = done.rows_affected();
                    tracing::info!(affected, "statement affected rows");
                    Ok(SqlOutcome {
                        data: Value::from(affected),
                        row_count: affected,
                        execution_time: started.elapsed().as_secs_f64(),
                        sql_type,
                    })
                }
                Ok(Err(e)) => Err(classify_driver(e, sql, started)),
                Err(_) => Err(statement_timeout_error(timeout_secs, started)),
            }
        };

        // Guaranteed release: the connection is closed whether the statement
        // succeeded or not.
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "error closing database connection");
        }
        result
    }
}

fn classify_driver(err: sqlx::Error, sql: &str, started: Instant) -> ExecuteError {
    let code = err
        .as_database_error()
        .and_then(|d| d.try_downcast_ref::<MySqlDatabaseError>())
        .map(|m| u32::from(m.number()));
    tracing::error!(error = %err, "database operation failed");
    ExecuteError::Database {
        code,
        message: err.to_string(),
        sql: truncate_sql(sql),
        execution_time: started.elapsed().as_secs_f64(),
    }
}

/// A connect timeout means the server was never reached; it classifies with
/// refused and unreachable connections, not with statement failures.
fn connect_timeout_error(timeout_secs: u64, sql: &str, started: Instant) -> ExecuteError {
    ExecuteError::Database {
        code: None,
        message: format!("connection attempt timed out after {}s", timeout_secs),
        sql: truncate_sql(sql),
        execution_time: started.elapsed().as_secs_f64(),
    }
}

fn statement_timeout_error(timeout_secs: u64, started: Instant) -> ExecuteError {
    ExecuteError::Execution {
        message: format!("statement timed out after {}s", timeout_secs),
        execution_time: started.elapsed().as_secs_f64(),
    }
}

/// First 100 characters of the statement, for logs and error details.
pub(crate) fn truncate_sql(sql: &str) -> String {
    if sql.chars().count() > 100 {
        let head: String = sql.chars().take(100).collect();
        format!("{}...", head)
    } else {
        sql.to_string()
    }
}
