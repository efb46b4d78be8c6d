use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::InFlight => "in_flight",
            PostStatus::Sent => "sent",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "in_flight" => Some(PostStatus::InFlight),
            "sent" => Some(PostStatus::Sent),
            "failed" => Some(PostStatus::Failed),
            "cancelled" => Some(PostStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PostStatus::Sent | PostStatus::Failed | PostStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Document => "document",
        }
    }

    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaCategory::Image),
            "video" => Some(MediaCategory::Video),
            "audio" => Some(MediaCategory::Audio),
            "document" => Some(MediaCategory::Document),
            _ => None,
        }
    }

    /// Whether the Telegram album transport can carry this category.
    pub fn is_groupable(&self) -> bool {
        !matches!(self, MediaCategory::Document)
    }
}

/// Transport strategy chosen from a post's attachment composition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SendMode {
    Text,
    SingleMedia,
    MediaGroup,
    DocGroup,
}

/// Which item of a batched media group carries the caption.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CaptionPlacement {
    First,
    Last,
}

/// Inline URL button shown under a delivered message. The label may be
/// translated per recipient; the URL never is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub title: String,
    pub can_post: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGroup {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    pub group_id: i64,
    pub chat_id: i64,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub html: bool,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub status: PostStatus,
    pub error_message: Option<String>,
    pub schedule_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub post_id: i64,
    pub original_name: String,
    pub storage_ref: String,
    pub category: MediaCategory,
    pub position: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            PostStatus::Pending,
            PostStatus::InFlight,
            PostStatus::Sent,
            PostStatus::Failed,
            PostStatus::Cancelled,
        ] {
            assert_eq!(PostStatus::parse_status(s.as_str()), Some(s));
        }
        assert_eq!(PostStatus::parse_status("bogus"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!PostStatus::Pending.is_terminal());
        assert!(!PostStatus::InFlight.is_terminal());
        assert!(PostStatus::Sent.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(PostStatus::Cancelled.is_terminal());
    }

    #[test]
    fn document_is_not_groupable() {
        assert!(MediaCategory::Image.is_groupable());
        assert!(MediaCategory::Video.is_groupable());
        assert!(MediaCategory::Audio.is_groupable());
        assert!(!MediaCategory::Document.is_groupable());
    }
}
