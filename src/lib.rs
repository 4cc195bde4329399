use std::sync::Arc;

use config::Config;
use notify::Notifier;
use sqlx::PgPool;

pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod store;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub notifier: Arc<Notifier>,
}
