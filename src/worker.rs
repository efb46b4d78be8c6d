//! Polling worker standing in for the external scheduler: claims one due
//! post at a time and runs its delivery. At-least-once, approximately on
//! time; posts are independent units of work.

use crate::db;
use crate::delivery;
use crate::storage::BlobStore;
use crate::translate::Translator;
use crate::transport::Transport;
use anyhow::Result;
use std::time::Duration;
use tracing::{info, instrument};

/// Claim and deliver the next due pending post. Returns whether a post was
/// processed so the caller can decide to sleep.
#[instrument(skip_all)]
pub async fn process_due_post(
    pool: &db::Pool,
    transport: &dyn Transport,
    translator: &dyn Translator,
    blobs: &dyn BlobStore,
    send_timeout: Duration,
) -> Result<bool> {
    if let Some(post_id) = db::claim_due_post(pool).await? {
        info!(post_id, "claimed due post");
        delivery::deliver_post(pool, transport, translator, blobs, send_timeout, post_id).await?;
        return Ok(true);
    }
    Ok(false)
}
