use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One authenticated or anonymous browsing session.
///
/// `token` is the primary key and never changes after creation; neither does
/// `user_id`. Capability and role sets have no post-creation update path —
/// changing authorization means destroying the session and starting a new
/// one. Ordered containers are used so a single snapshot always re-encodes
/// to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Present only for authenticated sessions.
    pub user_id: Option<String>,
    pub permissions: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    /// Auxiliary user attributes captured at login; never contains `password`.
    pub data: BTreeMap<String, String>,
    pub ip: String,
    pub user_agent: String,
    pub referer: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is live strictly before its expiry instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whether the session holds the named capability.
    pub fn can(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Whether the session holds the named role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the session holds at least one of the named capabilities.
    pub fn has_any_permission<I, S>(&self, permissions: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        permissions.into_iter().any(|p| self.permissions.contains(p.as_ref()))
    }

    /// Render the `Set-Cookie` value for this session.
    ///
    /// `debug` omits the `Secure` attribute for non-TLS deployments.
    pub fn cookie(&self, debug: bool) -> String {
        let expires = self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT");
        if debug {
            format!("session={}; HttpOnly; Path=/; Expires={}; SameSite=Strict", self.token, expires)
        } else {
            format!("session={}; HttpOnly; Secure; Path=/; Expires={}; SameSite=Strict", self.token, expires)
        }
    }
}
