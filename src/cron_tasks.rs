use crate::Config;
use crate::session::store::{SessionStore, SweepStats};

/// One-shot expiry sweep for external schedulers (see `bin/cron.rs`).
pub async fn sweep_sessions(config: &Config) -> Result<SweepStats, String> {
    let store = SessionStore::new(config.storage.base_dir.clone(), config.session.lifetime());

    store
        .sweep_expired()
        .await
        .map_err(|err| format!("Failed to sweep expired sessions: {err:?}"))
}
