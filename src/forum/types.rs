//! Forum type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Post category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Workouts,
    Nutrition,
    Motivation,
    Progress,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 5] = [
        Category::General,
        Category::Workouts,
        Category::Nutrition,
        Category::Motivation,
        Category::Progress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Workouts => "workouts",
            Category::Nutrition => "nutrition",
            Category::Motivation => "motivation",
            Category::Progress => "progress",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Category::General),
            "workouts" => Some(Category::Workouts),
            "nutrition" => Some(Category::Nutrition),
            "motivation" => Some(Category::Motivation),
            "progress" => Some(Category::Progress),
            _ => None,
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Category::General => "Geral",
            Category::Workouts => "Treinos",
            Category::Nutrition => "Nutrição",
            Category::Motivation => "Motivação",
            Category::Progress => "Progresso",
        }
    }
}

/// A forum post with its author's display name.
#[derive(Debug, Clone, Serialize)]
pub struct ForumPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub category: Category,
    pub title: String,
    pub content: String,
    pub likes_count: u32,
    pub replies_count: u32,
    /// Whether the requesting user has liked the post
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

impl ForumPost {
    /// Trending score: replies weigh more than likes.
    pub fn score(&self) -> u32 {
        self.likes_count * 2 + self.replies_count * 3
    }
}

/// A reply to a post.
#[derive(Debug, Clone, Serialize)]
pub struct ForumReply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Community-wide counters.
#[derive(Debug, Clone, Serialize)]
pub struct CommunityStats {
    pub total_members: u32,
    pub total_posts: u32,
    pub total_replies: u32,
    pub posts_today: u32,
}

/// Post count for a category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryActivity {
    pub category: Category,
    pub posts: u32,
}

/// Forum errors.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Notification error: {0}")]
    NotificationError(#[from] crate::notifications::NotificationError),

    #[error("Post not found: {0}")]
    PostNotFound(Uuid),

    #[error("Only the author can delete this post")]
    NotAuthor,

    #[error("Validation error: {0}")]
    ValidationError(String),
}
