use crate::model::{Attachment, Button};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Draft accepted by `create_post`. Targets reference `chats.id` rows owned
/// by the same user; groups reference `chat_groups.id`.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub content: String,
    pub html: bool,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub schedule_time: DateTime<Utc>,
    pub target_chat_refs: Vec<i64>,
    pub group_ids: Vec<i64>,
}

/// One group member as the resolver consumes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRecipient {
    pub chat_id: i64,
    pub language: String,
}

/// A post with everything the delivery engine needs loaded up front:
/// attachments in stored order, group members in group-then-member order,
/// and individual target chat ids.
#[derive(Debug, Clone)]
pub struct PostForDelivery {
    pub id: i64,
    pub content: String,
    pub html: bool,
    pub button: Option<Button>,
    pub attachments: Vec<Attachment>,
    pub group_members: Vec<GroupRecipient>,
    pub target_chat_ids: Vec<i64>,
}
