use super::model::{GroupRecipient, NewPost, PostForDelivery};
use crate::model::{Attachment, Button, MediaCategory, PostStatus};
use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Url;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use thiserror::Error;
use tracing::instrument;

pub type Pool = SqlitePool;

/// Validation errors surfaced synchronously at post creation; none of these
/// ever reach the delivery engine.
#[derive(Debug, Error)]
pub enum CreatePostError {
    #[error("schedule time must be in the future")]
    ScheduleInPast,
    #[error("post must target at least one chat or group")]
    NoRecipients,
    #[error("inline button requires both label and URL")]
    PartialButton,
    #[error("invalid button URL: {0}")]
    InvalidButtonUrl(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_or_create_user(pool: &Pool, username: &str) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }

    let rec = sqlx::query("INSERT INTO users (username) VALUES (?) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn upsert_chat(
    pool: &Pool,
    user_id: i64,
    chat_id: i64,
    title: &str,
    can_post: bool,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO chats (user_id, chat_id, title, can_post) VALUES (?, ?, ?, ?) \
         ON CONFLICT (user_id, chat_id) DO UPDATE SET title = excluded.title, can_post = excluded.can_post \
         RETURNING id",
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(title)
    .bind(can_post)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn create_group(pool: &Pool, user_id: i64, name: &str) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO chat_groups (user_id, name) VALUES (?, ?) RETURNING id")
        .bind(user_id)
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(rec.get("id"))
}

/// Add a chat to a group. A chat id appears at most once per group; the
/// UNIQUE constraint rejects duplicates.
#[instrument(skip_all)]
pub async fn add_group_member(
    pool: &Pool,
    group_id: i64,
    chat_id: i64,
    language: &str,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO group_members (group_id, chat_id, language) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(group_id)
    .bind(chat_id)
    .bind(language)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

/// Create a pending post with its target and group links in one transaction.
#[instrument(skip_all)]
pub async fn create_post(pool: &Pool, draft: &NewPost) -> Result<i64, CreatePostError> {
    if draft.schedule_time <= Utc::now() {
        return Err(CreatePostError::ScheduleInPast);
    }
    if draft.target_chat_refs.is_empty() && draft.group_ids.is_empty() {
        return Err(CreatePostError::NoRecipients);
    }
    match (&draft.button_text, &draft.button_url) {
        (Some(_), None) | (None, Some(_)) => return Err(CreatePostError::PartialButton),
        (Some(_), Some(url)) => {
            Url::parse(url).map_err(|_| CreatePostError::InvalidButtonUrl(url.clone()))?;
        }
        (None, None) => {}
    }

    let mut tx = pool.begin().await?;
    let post_id: i64 = sqlx::query(
        "INSERT INTO posts (user_id, content, html, button_text, button_url, status, schedule_time) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(draft.user_id)
    .bind(draft.content.as_str())
    .bind(draft.html)
    .bind(draft.button_text.as_deref())
    .bind(draft.button_url.as_deref())
    .bind(PostStatus::Pending.as_str())
    .bind(draft.schedule_time)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    for chat_ref in &draft.target_chat_refs {
        sqlx::query("INSERT INTO post_targets (post_id, chat_ref) VALUES (?, ?)")
            .bind(post_id)
            .bind(chat_ref)
            .execute(&mut *tx)
            .await?;
    }
    for group_id in &draft.group_ids {
        sqlx::query("INSERT INTO post_groups (post_id, group_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(post_id)
}

/// Append an attachment at the next position. Ordering is significant for
/// caption placement, so positions are allocated 1..N per post.
#[instrument(skip_all)]
pub async fn add_attachment(
    pool: &Pool,
    post_id: i64,
    original_name: &str,
    storage_ref: &str,
    category: MediaCategory,
) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let max_pos: Option<i64> =
        sqlx::query_scalar("SELECT MAX(position) FROM attachments WHERE post_id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
            .flatten();
    let rec = sqlx::query(
        "INSERT INTO attachments (post_id, original_name, storage_ref, category, position) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(post_id)
    .bind(original_name)
    .bind(storage_ref)
    .bind(category.as_str())
    .bind(max_pos.unwrap_or(0) + 1)
    .fetch_one(&mut *tx)
    .await?;
    let id: i64 = rec.get("id");
    tx.commit().await?;
    Ok(id)
}

/// Load a post with attachments, group members, and individual targets.
/// Returns `None` when the post has been deleted.
#[instrument(skip_all)]
pub async fn fetch_post_for_delivery(pool: &Pool, post_id: i64) -> Result<Option<PostForDelivery>> {
    let row = sqlx::query("SELECT id, content, html, button_text, button_url FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let button_text: Option<String> = row.get("button_text");
    let button_url: Option<String> = row.get("button_url");
    let button = match (button_text, button_url) {
        (Some(label), Some(url)) => Some(Button { label, url }),
        _ => None,
    };

    let attachment_rows = sqlx::query(
        "SELECT id, post_id, original_name, storage_ref, category, position \
         FROM attachments WHERE post_id = ? ORDER BY position",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    let mut attachments = Vec::with_capacity(attachment_rows.len());
    for a in attachment_rows {
        let category_str: String = a.get("category");
        let category = MediaCategory::parse_category(&category_str)
            .ok_or_else(|| anyhow!("attachment has unknown category {}", category_str))?;
        attachments.push(Attachment {
            id: a.get("id"),
            post_id: a.get("post_id"),
            original_name: a.get("original_name"),
            storage_ref: a.get("storage_ref"),
            category,
            position: a.get("position"),
        });
    }

    let group_members = sqlx::query(
        "SELECT gm.chat_id, gm.language FROM post_groups pg \
         JOIN group_members gm ON gm.group_id = pg.group_id \
         WHERE pg.post_id = ? ORDER BY pg.rowid, gm.id",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| GroupRecipient {
        chat_id: r.get("chat_id"),
        language: r.get("language"),
    })
    .collect();

    let target_chat_ids = sqlx::query_scalar(
        "SELECT c.chat_id FROM post_targets pt \
         JOIN chats c ON c.id = pt.chat_ref \
         WHERE pt.post_id = ? ORDER BY pt.rowid",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(PostForDelivery {
        id: row.get("id"),
        content: row.get("content"),
        html: row.get("html"),
        button,
        attachments,
        group_members,
        target_chat_ids,
    }))
}

/// Claim the next due pending post, flipping it to `in_flight` in a single
/// compare-and-set so a send-now trigger and the scheduled trigger cannot
/// both win.
#[instrument(skip_all)]
pub async fn claim_due_post(pool: &Pool) -> Result<Option<i64>> {
    let row = sqlx::query(
        "UPDATE posts SET status = 'in_flight' WHERE id = ( \
             SELECT id FROM posts \
             WHERE status = 'pending' AND datetime(schedule_time) <= CURRENT_TIMESTAMP \
             ORDER BY datetime(schedule_time) ASC LIMIT 1 \
         ) RETURNING id",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.get("id")))
}

/// Terminal transition `in_flight -> sent`; clears any prior error text.
/// Returns whether the write happened (false for vanished or already
/// terminal posts).
#[instrument(skip_all)]
pub async fn mark_post_sent(pool: &Pool, post_id: i64) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE posts SET status = 'sent', error_message = NULL \
         WHERE id = ? AND status = 'in_flight'",
    )
    .bind(post_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Terminal transition `in_flight -> failed` with the aggregated error text.
#[instrument(skip_all)]
pub async fn mark_post_failed(pool: &Pool, post_id: i64, error: &str) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE posts SET status = 'failed', error_message = ? \
         WHERE id = ? AND status = 'in_flight'",
    )
    .bind(error)
    .bind(post_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Cancel a still-pending post. Loses cleanly against an in-flight delivery:
/// once the worker has claimed the post this returns false.
#[instrument(skip_all)]
pub async fn cancel_post(pool: &Pool, post_id: i64) -> Result<bool> {
    let res = sqlx::query("UPDATE posts SET status = 'cancelled' WHERE id = ? AND status = 'pending'")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Pull a pending post's schedule time to now so the next worker pass
/// claims it.
#[instrument(skip_all)]
pub async fn send_post_now(pool: &Pool, post_id: i64) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE posts SET schedule_time = CURRENT_TIMESTAMP WHERE id = ? AND status = 'pending'",
    )
    .bind(post_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn post_status(pool: &Pool, post_id: i64) -> Result<Option<(PostStatus, Option<String>)>> {
    let row = sqlx::query("SELECT status, error_message FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let status_str: String = row.get("status");
    let status = PostStatus::parse_status(&status_str)
        .ok_or_else(|| anyhow!("post {} has unknown status {}", post_id, status_str))?;
    Ok(Some((status, row.get("error_message"))))
}
