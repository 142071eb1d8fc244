pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod notifications;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::auth::TokenIssuer;
use crate::api::rate_limit::RateLimiter;
use crate::notifications::Mailer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenIssuer,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, mailer: Arc<dyn Mailer>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let tokens = TokenIssuer::new(&config.auth);
        Self {
            config,
            db,
            mailer,
            tokens,
            rate_limiter,
        }
    }
}
