//! CuraLink Storage Crate
//!
//! Local persistence for CuraLink: a string key/value backend (in-memory or
//! SQLite), the persistence store holding users, profiles, favorites and
//! forum posts, and the session tracker.

use std::sync::Arc;

use curalink_config::{SessionConfig, StorageConfig};

pub mod connection;
pub mod database;
pub mod entities;
pub mod local;
pub mod migrations;
pub mod session;
pub mod types;

pub use connection::prepare_database;
pub use database::{Database, DATABASE_KEY};
pub use local::{open_local_storage, LocalStorage, MemoryStorage, SqliteStorage};
pub use migrations::run_migrations;
pub use session::{SessionTracker, SESSION_KEY};

pub use entities::{
    ClinicalTrial, CreateForumPostRequest, CreateForumReplyRequest, CreateUserRequest, Expert,
    FavoriteItem, FavoriteKind, ForumPost, ForumReply, PatientProfile, Profile, Publication,
    ResearcherProfile, Session, User, UserType, Versioned,
};

pub use types::{DatabaseError, DatabaseResult, StorageError, StorageResult};

/// The persistence store and session tracker sharing one backend.
#[derive(Clone)]
pub struct LocalState {
    pub database: Database,
    pub sessions: SessionTracker,
}

impl LocalState {
    pub async fn from_storage(storage: Arc<dyn LocalStorage>, session: &SessionConfig) -> Self {
        let database = Database::load(storage.clone()).await;
        let sessions = SessionTracker::new(storage, session);
        Self { database, sessions }
    }
}

/// Open the configured backend and load the store from it
pub async fn initialize_storage(
    storage: &StorageConfig,
    session: &SessionConfig,
) -> StorageResult<LocalState> {
    let backend = open_local_storage(storage).await?;
    Ok(LocalState::from_storage(backend, session).await)
}
