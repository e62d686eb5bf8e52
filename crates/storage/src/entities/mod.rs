//! Domain entities persisted by the local store

pub mod favorite;
pub mod forum;
pub mod profile;
pub mod research;
pub mod session;
pub mod user;

use serde::{Deserialize, Serialize};

pub use favorite::{FavoriteItem, FavoriteKind};
pub use forum::{CreateForumPostRequest, CreateForumReplyRequest, ForumPost, ForumReply};
pub use profile::{PatientProfile, Profile, ResearcherProfile};
pub use research::{ClinicalTrial, Expert, Publication};
pub use session::Session;
pub use user::{CreateUserRequest, User, UserType};

/// A stored value paired with the revision it was written at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub revision: u64,
    pub value: T,
}
