//! The persistence store: users, profiles, favorites and forum posts.
//!
//! Everything lives in one JSON record under [`DATABASE_KEY`]. The record is
//! loaded once, kept in memory, and rewritten wholesale after each mutation.
//! Mutations are serialized by an async mutex and applied to a copy of the
//! record; the copy only replaces the in-memory state once the write to the
//! backend has succeeded, so a failed write changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::{
    CreateForumPostRequest, CreateForumReplyRequest, CreateUserRequest, FavoriteItem, ForumPost,
    ForumReply, Profile, User, Versioned,
};
use crate::local::LocalStorage;
use crate::types::{DatabaseError, DatabaseResult};

pub const DATABASE_KEY: &str = "curalink_database";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Record {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    profiles: HashMap<String, Versioned<Profile>>,
    #[serde(default)]
    favorites: HashMap<String, Versioned<Vec<FavoriteItem>>>,
    #[serde(default)]
    forum_posts: Vec<ForumPost>,
}

impl Record {
    fn user_exists(&self, user_id: &str) -> bool {
        self.users.iter().any(|user| user.id == user_id)
    }

    fn require_user(&self, user_id: &str) -> DatabaseResult<()> {
        if self.user_exists(user_id) {
            Ok(())
        } else {
            Err(DatabaseError::UserNotFound(user_id.to_owned()))
        }
    }

    fn insert_user(&mut self, request: CreateUserRequest) -> DatabaseResult<User> {
        if self
            .users
            .iter()
            .any(|user| emails_match(&user.email, &request.email))
        {
            return Err(DatabaseError::EmailAlreadyExists);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            email: request.email.trim().to_owned(),
            password_hash: request.password_hash,
            user_type: request.user_type,
            created_at: Utc::now(),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    fn profile_revision(&self, user_id: &str) -> u64 {
        self.profiles.get(user_id).map_or(0, |entry| entry.revision)
    }

    fn favorites_revision(&self, user_id: &str) -> u64 {
        self.favorites.get(user_id).map_or(0, |entry| entry.revision)
    }

    fn put_profile(&mut self, user_id: &str, profile: Profile) -> u64 {
        let revision = self.profile_revision(user_id) + 1;
        self.profiles.insert(
            user_id.to_owned(),
            Versioned {
                revision,
                value: profile,
            },
        );
        revision
    }

    fn put_favorites(&mut self, user_id: &str, favorites: Vec<FavoriteItem>) -> u64 {
        let revision = self.favorites_revision(user_id) + 1;
        self.favorites.insert(
            user_id.to_owned(),
            Versioned {
                revision,
                value: dedupe_favorites(favorites),
            },
        );
        revision
    }
}

/// Shared handle to the persistence store. Clones share state.
#[derive(Clone)]
pub struct Database {
    storage: Arc<dyn LocalStorage>,
    record: Arc<Mutex<Record>>,
}

impl Database {
    /// Load the store from `storage`.
    ///
    /// A missing record starts an empty store. An unreadable or corrupt
    /// record is logged and also starts an empty store; the bad record is
    /// left in place until the next successful write replaces it.
    pub async fn load(storage: Arc<dyn LocalStorage>) -> Self {
        let record = match storage.get_item(DATABASE_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Record>(&json) {
                Ok(record) => {
                    info!(
                        users = record.users.len(),
                        profiles = record.profiles.len(),
                        "loaded local database"
                    );
                    record
                }
                Err(error) => {
                    warn!(%error, "stored database is corrupt, starting empty");
                    Record::default()
                }
            },
            Ok(None) => {
                debug!("no stored database, starting empty");
                Record::default()
            }
            Err(error) => {
                warn!(%error, "failed to read stored database, starting empty");
                Record::default()
            }
        };

        Self {
            storage,
            record: Arc::new(Mutex::new(record)),
        }
    }

    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut Record) -> DatabaseResult<T>,
    ) -> DatabaseResult<T> {
        let mut current = self.record.lock().await;
        let mut next = current.clone();
        let output = apply(&mut next)?;

        let json = serde_json::to_string(&next)?;
        self.storage.set_item(DATABASE_KEY, &json).await?;

        *current = next;
        Ok(output)
    }

    // User management

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let record = self.record.lock().await;
        record
            .users
            .iter()
            .find(|user| emails_match(&user.email, email))
            .cloned()
    }

    pub async fn find_user_by_id(&self, id: &str) -> Option<User> {
        let record = self.record.lock().await;
        record.users.iter().find(|user| user.id == id).cloned()
    }

    /// Append a user with a fresh UUID.
    ///
    /// Fails with [`DatabaseError::EmailAlreadyExists`] when another user has
    /// the same email ignoring case. The check and the insert happen under
    /// one lock.
    pub async fn add_user(&self, request: CreateUserRequest) -> DatabaseResult<User> {
        let user = self.mutate(|record| record.insert_user(request)).await?;

        info!(user = %user.id, user_type = %user.user_type, "user added");
        Ok(user)
    }

    /// Append a user together with their first profile in a single write.
    /// Either both are stored or neither is.
    pub async fn add_user_with_profile(
        &self,
        request: CreateUserRequest,
        profile: Profile,
    ) -> DatabaseResult<User> {
        let user = self
            .mutate(|record| {
                let user = record.insert_user(request)?;
                record.put_profile(&user.id, profile);
                Ok(user)
            })
            .await?;

        info!(user = %user.id, user_type = %user.user_type, "user added with profile");
        Ok(user)
    }

    pub async fn user_count(&self) -> usize {
        self.record.lock().await.users.len()
    }

    // Profile management

    pub async fn get_profile(&self, user_id: &str) -> Option<Profile> {
        self.get_profile_versioned(user_id)
            .await
            .map(|entry| entry.value)
    }

    pub async fn get_profile_versioned(&self, user_id: &str) -> Option<Versioned<Profile>> {
        self.record.lock().await.profiles.get(user_id).cloned()
    }

    /// Replace the user's profile and return its new revision.
    pub async fn save_profile(&self, user_id: &str, profile: Profile) -> DatabaseResult<u64> {
        self.mutate(|record| {
            record.require_user(user_id)?;
            Ok(record.put_profile(user_id, profile))
        })
        .await
    }

    /// Replace the user's profile only if it is still at `expected_revision`
    /// (0 when no profile has been saved yet).
    pub async fn save_profile_if(
        &self,
        user_id: &str,
        profile: Profile,
        expected_revision: u64,
    ) -> DatabaseResult<u64> {
        self.mutate(|record| {
            record.require_user(user_id)?;
            let actual = record.profile_revision(user_id);
            if actual != expected_revision {
                return Err(DatabaseError::RevisionConflict {
                    expected: expected_revision,
                    actual,
                });
            }
            Ok(record.put_profile(user_id, profile))
        })
        .await
    }

    // Favorites management

    pub async fn get_favorites(&self, user_id: &str) -> Vec<FavoriteItem> {
        self.get_favorites_versioned(user_id).await.value
    }

    /// Favorites with their revision; a user with no saved list is at revision 0.
    pub async fn get_favorites_versioned(&self, user_id: &str) -> Versioned<Vec<FavoriteItem>> {
        self.record
            .lock()
            .await
            .favorites
            .get(user_id)
            .cloned()
            .unwrap_or(Versioned {
                revision: 0,
                value: Vec::new(),
            })
    }

    /// Replace the user's favorites. Later entries repeating an earlier id are dropped.
    pub async fn save_favorites(
        &self,
        user_id: &str,
        favorites: Vec<FavoriteItem>,
    ) -> DatabaseResult<u64> {
        self.mutate(|record| {
            record.require_user(user_id)?;
            Ok(record.put_favorites(user_id, favorites))
        })
        .await
    }

    pub async fn save_favorites_if(
        &self,
        user_id: &str,
        favorites: Vec<FavoriteItem>,
        expected_revision: u64,
    ) -> DatabaseResult<u64> {
        self.mutate(|record| {
            record.require_user(user_id)?;
            let actual = record.favorites_revision(user_id);
            if actual != expected_revision {
                return Err(DatabaseError::RevisionConflict {
                    expected: expected_revision,
                    actual,
                });
            }
            Ok(record.put_favorites(user_id, favorites))
        })
        .await
    }

    /// Add `item` if no favorite shares its id, otherwise remove that favorite.
    /// Returns the resulting list.
    pub async fn toggle_favorite(
        &self,
        user_id: &str,
        item: FavoriteItem,
    ) -> DatabaseResult<Vec<FavoriteItem>> {
        self.mutate(|record| {
            record.require_user(user_id)?;

            let mut favorites = record
                .favorites
                .get(user_id)
                .map(|entry| entry.value.clone())
                .unwrap_or_default();

            if let Some(position) = favorites.iter().position(|fav| fav.id() == item.id()) {
                let removed = favorites.remove(position);
                debug!(user = user_id, id = removed.id(), kind = %removed.kind(), "favorite removed");
            } else {
                debug!(user = user_id, id = item.id(), kind = %item.kind(), "favorite added");
                favorites.push(item);
            }

            record.put_favorites(user_id, favorites.clone());
            Ok(favorites)
        })
        .await
    }

    pub async fn is_favorite(&self, user_id: &str, id: &str) -> bool {
        self.record
            .lock()
            .await
            .favorites
            .get(user_id)
            .is_some_and(|entry| entry.value.iter().any(|fav| fav.id() == id))
    }

    // Forums

    /// Posts in creation order, optionally limited to one category (case-insensitive).
    pub async fn list_forum_posts(&self, category: Option<&str>) -> Vec<ForumPost> {
        let record = self.record.lock().await;
        record
            .forum_posts
            .iter()
            .filter(|post| category.map_or(true, |c| post.category.eq_ignore_ascii_case(c.trim())))
            .cloned()
            .collect()
    }

    pub async fn create_forum_post(
        &self,
        request: CreateForumPostRequest,
    ) -> DatabaseResult<ForumPost> {
        self.mutate(|record| {
            let post = ForumPost {
                id: Uuid::new_v4().to_string(),
                author: request.author,
                user_type: request.user_type,
                title: request.title,
                content: request.content,
                category: request.category,
                created_at: Utc::now(),
                replies: Vec::new(),
            };
            record.forum_posts.push(post.clone());
            Ok(post)
        })
        .await
    }

    pub async fn add_forum_reply(
        &self,
        post_id: &str,
        request: CreateForumReplyRequest,
    ) -> DatabaseResult<ForumPost> {
        self.mutate(|record| {
            let post = record
                .forum_posts
                .iter_mut()
                .find(|post| post.id == post_id)
                .ok_or_else(|| DatabaseError::PostNotFound(post_id.to_owned()))?;

            post.replies.push(ForumReply {
                id: Uuid::new_v4().to_string(),
                author: request.author,
                content: request.content,
                created_at: Utc::now(),
            });
            Ok(post.clone())
        })
        .await
    }
}

fn emails_match(stored: &str, candidate: &str) -> bool {
    stored.trim().to_lowercase() == candidate.trim().to_lowercase()
}

fn dedupe_favorites(favorites: Vec<FavoriteItem>) -> Vec<FavoriteItem> {
    let mut unique: Vec<FavoriteItem> = Vec::with_capacity(favorites.len());
    for item in favorites {
        if !unique.iter().any(|existing| existing.id() == item.id()) {
            unique.push(item);
        }
    }
    unique
}
