//! Forum entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub author: String,
    pub user_type: UserType,
    pub title: String,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub replies: Vec<ForumReply>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumReply {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Request for creating a new forum post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateForumPostRequest {
    pub author: String,
    pub user_type: UserType,
    pub title: String,
    pub content: String,
    pub category: String,
}

/// Request for replying to an existing post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateForumReplyRequest {
    pub author: String,
    pub content: String,
}
