//! Recipient resolution: expands a post's chat-groups and individual target
//! chats into a flat, deduplicated delivery list.

use crate::db::model::PostForDelivery;
use std::collections::HashSet;

/// A resolved delivery target. `language` is set for group-sourced entries
/// and `None` for individual targets, which receive the post verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientTarget {
    pub chat_id: i64,
    pub language: Option<String>,
}

/// Expand the post's groups (in creation order, members in stored order)
/// followed by its individual targets. The dedup key is the chat id alone;
/// group entries win because groups are walked first. First-seen order is
/// preserved. An empty result is valid.
pub fn resolve(post: &PostForDelivery) -> Vec<RecipientTarget> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    for member in &post.group_members {
        if seen.insert(member.chat_id) {
            recipients.push(RecipientTarget {
                chat_id: member.chat_id,
                language: Some(member.language.clone()),
            });
        }
    }

    for &chat_id in &post.target_chat_ids {
        if seen.insert(chat_id) {
            recipients.push(RecipientTarget {
                chat_id,
                language: None,
            });
        }
    }

    recipients
}
