//! Shared application state. Everything here is immutable after startup;
//! handlers share no mutable state with each other.

use crate::config::AppConfig;
use crate::db::{ConnectionTester, SqlExecutor};
use crate::image::ImageGenerator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub executor: Arc<SqlExecutor>,
    pub tester: Arc<ConnectionTester>,
    pub generator: Arc<ImageGenerator>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        Self {
            executor: Arc::new(SqlExecutor::new(config.mysql.clone())),
            tester: Arc::new(ConnectionTester::new(config.mysql.clone())),
            generator: Arc::new(ImageGenerator::new(&config.qianfan)),
            config,
        }
    }
}
