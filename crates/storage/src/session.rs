//! Tracks the single active login across restarts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use curalink_config::SessionConfig;
use tracing::{debug, warn};

use crate::entities::Session;
use crate::local::LocalStorage;
use crate::types::StorageResult;

pub const SESSION_KEY: &str = "curalink_session";

/// Anonymous until [`SessionTracker::save_session`], authenticated until
/// [`SessionTracker::clear_session`] or expiry.
#[derive(Clone)]
pub struct SessionTracker {
    storage: Arc<dyn LocalStorage>,
    ttl: Option<Duration>,
}

impl SessionTracker {
    pub fn new(storage: Arc<dyn LocalStorage>, config: &SessionConfig) -> Self {
        // Durations too large for chrono simply never expire.
        let ttl = match config.ttl_seconds {
            0 => None,
            seconds => Duration::try_seconds(i64::try_from(seconds).unwrap_or(i64::MAX)),
        };

        Self { storage, ttl }
    }

    /// The active user id, if any.
    pub async fn get_session(&self) -> StorageResult<Option<String>> {
        Ok(self.current().await?.map(|session| session.user_id))
    }

    /// The active session record. Expired or unreadable sessions are removed
    /// and reported as anonymous.
    pub async fn current(&self) -> StorageResult<Option<Session>> {
        let Some(json) = self.storage.get_item(SESSION_KEY).await? else {
            return Ok(None);
        };

        let session = match serde_json::from_str::<Session>(&json) {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "discarding unreadable session");
                self.storage.remove_item(SESSION_KEY).await?;
                return Ok(None);
            }
        };

        if session.is_expired_at(Utc::now()) {
            debug!(user = %session.user_id, "session expired");
            self.storage.remove_item(SESSION_KEY).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub async fn save_session(&self, user_id: &str) -> StorageResult<Session> {
        let started_at = Utc::now();
        let expires_at = self
            .ttl
            .and_then(|ttl| started_at.checked_add_signed(ttl));

        let session = Session {
            user_id: user_id.to_owned(),
            started_at,
            expires_at,
        };

        let json = serde_json::to_string(&session)?;
        self.storage.set_item(SESSION_KEY, &json).await?;
        debug!(user = user_id, "session saved");
        Ok(session)
    }

    pub async fn clear_session(&self) -> StorageResult<()> {
        self.storage.remove_item(SESSION_KEY).await?;
        debug!("session cleared");
        Ok(())
    }
}
