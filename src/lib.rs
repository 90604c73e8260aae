mod auth;
mod config;
mod cron_tasks;
mod error;
mod session;

pub use auth::CurrentSession;
pub use config::{Config, LoggingConfig, SessionConfig, StorageConfig};
pub use cron_tasks::sweep_sessions;
pub use error::app_error::AppError;
pub use session::model::Session;
pub use session::store::{RequestMeta, SessionStore, SweepStats};
pub use session::token::new_token;

use rocket::fairing::AdHoc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG takes precedence for fine-grained per-module control, e.g.
    // RUST_LOG=info,session_vault::session=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    if json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Ignite fairing that builds the session store from config, manages it for
/// the `CurrentSession` guard, and spawns the periodic expiry sweep.
pub fn stage_sessions(storage: StorageConfig, session: SessionConfig) -> AdHoc {
    AdHoc::on_ignite("Session Store", move |rocket| {
        let store = Arc::new(SessionStore::new(storage.base_dir, session.lifetime()));
        store.clone().spawn_sweep_task(session.sweep_interval());

        Box::pin(async move { rocket.manage(store) })
    })
}
