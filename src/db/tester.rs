//! Connection reachability probes: a full driver handshake with a version
//! query, and a raw TCP connect for narrowing down network problems.

use super::ConnectionInfo;
use crate::config::MysqlDefaults;
use sqlx::mysql::MySqlConnection;
use sqlx::Connection;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Connect timeout for the driver probe. Fixed; the test endpoint has no
/// caller-supplied timeout field.
const TEST_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the raw TCP probe.
const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct TestOutcome {
    pub server_version: String,
    pub response_time: f64,
}

#[derive(Error, Debug)]
pub enum TestError {
    #[error("database connection failed: {message}")]
    Connection { message: String, response_time: f64 },
    #[error("connection test failed: {message}")]
    Other { message: String, response_time: f64 },
}

#[derive(Error, Debug)]
#[error("tcp connect to {host}:{port} failed: {message}")]
pub struct NetworkError {
    pub host: String,
    pub port: u16,
    pub message: String,
    pub response_time: f64,
}

pub struct ConnectionTester {
    defaults: MysqlDefaults,
}

impl ConnectionTester {
    pub fn new(defaults: MysqlDefaults) -> Self {
        Self { defaults }
    }

    /// Open a short-lived connection and run one fixed `SELECT VERSION()`
    /// probe. The connection is closed on every path.
    pub async fn test(&self, info: &ConnectionInfo) -> Result<TestOutcome, TestError> {
        let started = Instant::now();
        let opts = info.connect_options(&self.defaults);

        tracing::info!(endpoint = %info.endpoint(&self.defaults), "testing database connection");
        let mut conn = match tokio::time::timeout(
            TEST_CONNECT_TIMEOUT,
            MySqlConnection::connect_with(&opts),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "connection test failed");
                return Err(TestError::Connection {
                    message: e.to_string(),
                    response_time: started.elapsed().as_secs_f64(),
                });
            }
            Err(_) => return Err(connect_timeout_error(started)),
        };

        let result = match tokio::time::timeout(
            TEST_CONNECT_TIMEOUT,
            sqlx::query_scalar::<_, String>("SELECT VERSION()").fetch_one(&mut conn),
        )
        .await
        {
            Ok(Ok(version)) => {
                let response_time = started.elapsed().as_secs_f64();
                tracing::info!(server_version = %version, response_time, "connection test succeeded");
                Ok(TestOutcome {
                    server_version: version,
                    response_time,
                })
            }
            Ok(Err(e)) => Err(TestError::Connection {
                message: e.to_string(),
                response_time: started.elapsed().as_secs_f64(),
            }),
            Err(_) => Err(TestError::Other {
                message: "version probe timed out".into(),
                response_time: started.elapsed().as_secs_f64(),
            }),
        };

        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "error closing database connection");
        }
        result
    }
}

/// A connect timeout is a connection failure like any refused or
/// unreachable server, not a generic test failure.
fn connect_timeout_error(started: Instant) -> TestError {
    TestError::Connection {
        message: format!(
            "connection attempt timed out after {}s",
            TEST_CONNECT_TIMEOUT.as_secs()
        ),
        response_time: started.elapsed().as_secs_f64(),
    }
}

pub struct NetworkProbe;

impl NetworkProbe {
    /// Plain TCP connect, no MySQL handshake. Distinguishes "host
    /// unreachable" from "server rejected the credentials".
    pub async fn probe(host: &str, port: u16) -> Result<f64, NetworkError> {
        let started = Instant::now();
        let addr = format!("{}:{}", host, port);
        tracing::info!(%addr, "tcp probe");
        match tokio::time::timeout(TCP_PROBE_TIMEOUT, tokio::net::TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => Ok(started.elapsed().as_secs_f64()),
            Ok(Err(e)) => Err(NetworkError {
                host: host.to_string(),
                port,
                message: e.to_string(),
                response_time: started.elapsed().as_secs_f64(),
            }),
            Err(_) => Err(NetworkError {
                host: host.to_string(),
                port,
                message: format!("timed out after {}s", TCP_PROBE_TIMEOUT.as_secs()),
                response_time: started.elapsed().as_secs_f64(),
            }),
        }
    }
}
