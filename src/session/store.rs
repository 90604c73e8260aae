//! Session lifecycle and the user→tokens secondary index.
//!
//! Operations on different tokens or users are independent and may
//! interleave; within a single token the store does not serialize
//! concurrent fetch/refresh/destroy calls. A destroy racing a fetch yields
//! `Unauthorized` on the next access, which is the accepted outcome for
//! advisory authentication state. The index read-modify-write, which would
//! otherwise lose tokens under concurrent logins for the same user, is
//! serialized behind a per-user in-process lock.

use crate::error::app_error::AppError;
use crate::session::codec;
use crate::session::file_store::{Namespace, ShardedFileStore};
use crate::session::model::Session;
use crate::session::token::{is_token, new_token};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Request metadata attached to a session at creation time.
///
/// Fields left unset fall back to `"unknown"` (ip, user agent) or empty
/// (referer) when the session is built.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// Counters reported by one expiry sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub scanned: u64,
    pub removed: u64,
}

pub struct SessionStore {
    files: ShardedFileStore,
    lifetime: chrono::Duration,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Build a store rooted at `base_dir` with the given sliding lifetime.
    ///
    /// The lifetime is injected here rather than read from process-wide
    /// state so tests can run with short deterministic values.
    pub fn new(base_dir: impl Into<PathBuf>, lifetime: Duration) -> Self {
        let lifetime = chrono::Duration::from_std(lifetime).expect("session lifetime out of range");
        Self {
            files: ShardedFileStore::new(base_dir),
            lifetime,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a session and persist it.
    ///
    /// The `password` attribute is stripped before the remaining attributes
    /// are copied into the session's data map. Authenticated sessions are
    /// also appended to their owner's index entry. On any write failure the
    /// session must be treated as not started.
    pub async fn start(
        &self,
        meta: &RequestMeta,
        user_id: Option<String>,
        attributes: BTreeMap<String, String>,
        roles: BTreeSet<String>,
        permissions: BTreeSet<String>,
    ) -> Result<Session, AppError> {
        let mut data = attributes;
        data.remove("password");

        let now = Utc::now();
        let session = Session {
            token: new_token(),
            user_id,
            permissions,
            roles,
            data,
            ip: meta.ip.clone().unwrap_or_else(|| "unknown".to_string()),
            user_agent: meta.user_agent.clone().unwrap_or_else(|| "unknown".to_string()),
            referer: meta.referer.clone().unwrap_or_default(),
            created_at: now,
            updated_at: now,
            expires_at: now + self.lifetime,
        };

        self.persist_record(&session).await?;
        if let Some(user_id) = &session.user_id {
            self.index_append(user_id, &session.token).await?;
        }

        info!(
            token = %token_prefix(&session.token),
            user = session.user_id.as_deref().unwrap_or("anonymous"),
            "session started"
        );
        Ok(session)
    }

    /// Start an anonymous session: no user ID, no roles, no permissions.
    pub async fn start_anonymous(&self, meta: &RequestMeta) -> Result<Session, AppError> {
        self.start(meta, None, BTreeMap::new(), BTreeSet::new(), BTreeSet::new()).await
    }

    /// Resolve a token to its live session, extending its expiry.
    ///
    /// A missing, expired, or undecodable record uniformly fails with
    /// `Unauthorized` so callers cannot distinguish "never existed" from
    /// "expired". Expired and corrupt records are purged on the spot.
    /// Every successful fetch slides the expiry forward by the full
    /// configured lifetime.
    pub async fn fetch(&self, token: &str) -> Result<Session, AppError> {
        // Tokens come straight from cookies and become path components;
        // anything not shaped like a generated token must never reach the
        // filesystem.
        if !is_token(token) {
            return Err(AppError::Unauthorized);
        }

        let bytes = self
            .files
            .read(Namespace::Tokens, token)
            .await
            .map_err(|e| AppError::io("Failed to read session record", e))?;
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => return Err(AppError::Unauthorized),
        };

        let mut session = match codec::decode(&bytes) {
            Ok(session) => session,
            Err(_) => {
                warn!(token = %token_prefix(token), "purging undecodable session record");
                self.files
                    .delete(Namespace::Tokens, token)
                    .await
                    .map_err(|e| AppError::io("Failed to purge session record", e))?;
                return Err(AppError::Unauthorized);
            }
        };

        if !session.is_live(Utc::now()) {
            self.files
                .delete(Namespace::Tokens, token)
                .await
                .map_err(|e| AppError::io("Failed to purge expired session", e))?;
            debug!(token = %token_prefix(token), "expired session purged on access");
            return Err(AppError::Unauthorized);
        }

        self.refresh(&mut session).await?;
        Ok(session)
    }

    /// Extend a session's life by the full configured lifetime and rewrite
    /// its record. Also re-asserts the owner's index entry, healing an index
    /// that lost this token to a racing write.
    pub async fn refresh(&self, session: &mut Session) -> Result<(), AppError> {
        let now = Utc::now();
        session.updated_at = now;
        session.expires_at = now + self.lifetime;

        self.persist_record(session).await?;
        if let Some(user_id) = &session.user_id {
            self.index_append(user_id, &session.token).await?;
        }
        Ok(())
    }

    /// Destroy one session: delete its record (absence is success) and drop
    /// its token from the owner's index entry.
    pub async fn destroy(&self, session: &Session) -> Result<(), AppError> {
        self.files
            .delete(Namespace::Tokens, &session.token)
            .await
            .map_err(|e| AppError::io("Failed to delete session record", e))?;

        if let Some(user_id) = &session.user_id {
            self.index_remove(user_id, &session.token).await?;
        }

        info!(
            token = %token_prefix(&session.token),
            user = session.user_id.as_deref().unwrap_or("anonymous"),
            "session destroyed"
        );
        Ok(())
    }

    /// Destroy every session a user owns, then remove the index entry.
    ///
    /// Per-token deletions are best-effort: a failure is logged and the
    /// batch continues, so one bad record cannot strand the rest behind an
    /// index entry that is about to disappear anyway.
    pub async fn destroy_all_for_user(&self, user_id: &str) -> Result<(), AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let tokens = self.read_index(user_id).await?;
        for token in &tokens {
            if let Err(e) = self.files.delete(Namespace::Tokens, token).await {
                warn!(
                    token = %token_prefix(token),
                    user = user_id,
                    error = %e,
                    "failed to delete session record during bulk destroy"
                );
            }
        }

        self.files
            .delete(Namespace::Index, user_id)
            .await
            .map_err(|e| AppError::io("Failed to delete user index entry", e))?;

        info!(user = user_id, sessions = tokens.len(), "all sessions destroyed for user");
        Ok(())
    }

    /// Enumerate a user's live sessions.
    ///
    /// Indexed tokens that no longer resolve are treated as already removed
    /// and skipped; each resolved session gets the usual sliding refresh.
    pub async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        let tokens = self.read_index(user_id).await?;
        let mut sessions = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.fetch(&token).await {
                Ok(session) => sessions.push(session),
                Err(AppError::Unauthorized) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(sessions)
    }

    /// Walk the token namespace and delete expired or corrupt records.
    ///
    /// Holds no store lock; each deletion is an independent file operation,
    /// so foreground traffic is never blocked for longer than one of them.
    pub async fn sweep_expired(&self) -> Result<SweepStats, AppError> {
        let now = Utc::now();
        let mut stats = SweepStats::default();

        let entries = self
            .files
            .list_entries(Namespace::Tokens)
            .await
            .map_err(|e| AppError::io("Failed to list session records", e))?;

        for path in entries {
            stats.scanned += 1;
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Deleted by a foreground destroy between listing and read
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "sweep could not read record");
                    continue;
                }
            };

            let expired = match codec::decode(&bytes) {
                Ok(session) => !session.is_live(now),
                Err(_) => {
                    warn!(path = %path.display(), "sweep removing undecodable record");
                    true
                }
            };

            if expired && remove_file_if_present(&path).await {
                stats.removed += 1;
            }
        }

        self.prune_user_locks().await;

        Ok(stats)
    }

    /// Drop per-user lock entries nobody is holding, so the lock map does
    /// not grow without bound across the lifetime of the process. An entry
    /// whose only reference is the map's own is idle; a user who comes back
    /// simply gets a fresh lock.
    async fn prune_user_locks(&self) {
        let mut locks = self.user_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Spawn a periodic background sweep of expired records.
    pub fn spawn_sweep_task(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                match self.sweep_expired().await {
                    Ok(stats) => {
                        info!(scanned = stats.scanned, removed = stats.removed, "session sweep completed");
                    }
                    Err(e) => warn!(error = ?e, "session sweep failed"),
                }
            }
        });
    }

    async fn persist_record(&self, session: &Session) -> Result<(), AppError> {
        let bytes = codec::encode(session)?;
        self.files
            .write(Namespace::Tokens, &session.token, &bytes)
            .await
            .map_err(|e| AppError::io("Failed to persist session record", e))
    }

    /// Append a token to a user's index entry if not already present.
    async fn index_append(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut tokens = self.read_index(user_id).await?;
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
            self.write_index(user_id, &tokens).await?;
        }
        Ok(())
    }

    /// Drop a token from a user's index entry. An emptied entry is rewritten
    /// as an empty list rather than unlinked.
    async fn index_remove(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut tokens = self.read_index(user_id).await?;
        let before = tokens.len();
        tokens.retain(|t| t != token);
        if tokens.len() != before {
            self.write_index(user_id, &tokens).await?;
        }
        Ok(())
    }

    async fn read_index(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let bytes = self
            .files
            .read(Namespace::Index, user_id)
            .await
            .map_err(|e| AppError::io("Failed to read user index entry", e))?;
        match bytes {
            Some(bytes) => codec::decode_index(&bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn write_index(&self, user_id: &str, tokens: &[String]) -> Result<(), AppError> {
        let bytes = codec::encode_index(tokens)?;
        self.files
            .write(Namespace::Index, user_id, &bytes)
            .await
            .map_err(|e| AppError::io("Failed to persist user index entry", e))
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }
}

async fn remove_file_if_present(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "sweep could not delete record");
            false
        }
    }
}

/// First characters of a token, safe to log.
fn token_prefix(token: &str) -> &str {
    &token[..token.len().min(8)]
}
