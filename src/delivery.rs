//! Delivery executor and status tracker.
//!
//! For a claimed post: resolve recipients, pick the send mode once, then walk
//! the recipients in a result-collecting loop so one chat's failure never
//! stops the others. The post's terminal status is written exactly once when
//! the loop finishes.

use crate::classifier;
use crate::db;
use crate::db::model::PostForDelivery;
use crate::localizer;
use crate::model::{Attachment, CaptionPlacement, SendMode};
use crate::resolver::{self, RecipientTarget};
use crate::storage::BlobStore;
use crate::translate::Translator;
use crate::transport::{MediaPart, OutboundMessage, Transport};
use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Caption placement asymmetry carried over from the reference behavior:
/// albums put the caption on the first item, document groups on the last.
pub const ALBUM_CAPTION: CaptionPlacement = CaptionPlacement::First;
pub const DOC_GROUP_CAPTION: CaptionPlacement = CaptionPlacement::Last;

/// Deliver one claimed post and record its terminal status. The post must
/// already be `in_flight`; a vanished post is a no-op.
#[instrument(skip_all)]
pub async fn deliver_post(
    pool: &db::Pool,
    transport: &dyn Transport,
    translator: &dyn Translator,
    blobs: &dyn BlobStore,
    send_timeout: Duration,
    post_id: i64,
) -> Result<()> {
    let Some(post) = db::fetch_post_for_delivery(pool, post_id).await? else {
        warn!(post_id, "post vanished before delivery");
        return Ok(());
    };

    match execute_post(&post, transport, translator, blobs, send_timeout).await {
        Ok(delivered) => {
            if db::mark_post_sent(pool, post_id).await? {
                info!(post_id, delivered, "post delivered");
            }
        }
        Err(err) => {
            let detail = format!("{err:#}");
            if db::mark_post_failed(pool, post_id, &detail).await? {
                warn!(post_id, error = %detail, "post delivery failed");
            }
        }
    }
    Ok(())
}

/// Run the sends for every resolved recipient. Returns the number of
/// successful deliveries, or an aggregated error when any recipient failed.
async fn execute_post(
    post: &PostForDelivery,
    transport: &dyn Transport,
    translator: &dyn Translator,
    blobs: &dyn BlobStore,
    send_timeout: Duration,
) -> Result<usize> {
    let recipients = resolver::resolve(post);
    if recipients.is_empty() {
        return Ok(0);
    }

    let categories: Vec<_> = post.attachments.iter().map(|a| a.category).collect();
    let mode = classifier::select_mode(&categories);

    let mut delivered = 0usize;
    let mut failures = Vec::new();
    for target in &recipients {
        let msg = localizer::localize(translator, post, target).await;
        match send_to_recipient(post, transport, blobs, send_timeout, mode, target, &msg).await {
            Ok(()) => delivered += 1,
            Err(err) => {
                warn!(chat_id = target.chat_id, ?err, "send failed for recipient");
                failures.push(format!("chat {}: {err:#}", target.chat_id));
            }
        }
    }

    if failures.is_empty() {
        Ok(delivered)
    } else {
        Err(anyhow!(
            "failed for {} of {} recipients: {}",
            failures.len(),
            recipients.len(),
            failures.join("; ")
        ))
    }
}

async fn send_to_recipient(
    post: &PostForDelivery,
    transport: &dyn Transport,
    blobs: &dyn BlobStore,
    send_timeout: Duration,
    mode: SendMode,
    target: &RecipientTarget,
    msg: &OutboundMessage,
) -> Result<()> {
    let chat_id = target.chat_id;
    match mode {
        SendMode::Text => with_timeout(send_timeout, transport.send_text(chat_id, msg)).await,
        SendMode::SingleMedia => {
            let part = load_part(blobs, &post.attachments[0]).await?;
            with_timeout(send_timeout, transport.send_single(chat_id, part, msg)).await
        }
        SendMode::MediaGroup | SendMode::DocGroup => {
            let (as_documents, placement) = match mode {
                SendMode::MediaGroup => (false, ALBUM_CAPTION),
                _ => (true, DOC_GROUP_CAPTION),
            };
            // Bytes are read fresh for every recipient; no buffer is shared
            // across sends.
            let mut parts = Vec::with_capacity(post.attachments.len());
            for attachment in &post.attachments {
                parts.push(load_part(blobs, attachment).await?);
            }
            let batched = with_timeout(
                send_timeout,
                transport.send_group(chat_id, parts, msg, as_documents, placement),
            )
            .await;
            match batched {
                Ok(()) => Ok(()),
                Err(err) => {
                    warn!(
                        chat_id,
                        ?err,
                        "batched group send failed; falling back to individual documents"
                    );
                    send_documents_fallback(post, transport, blobs, send_timeout, chat_id, msg)
                        .await
                }
            }
        }
    }
}

/// Fallback for a rejected batch: each attachment goes out as its own
/// document message, with the caption and button only on the last one.
async fn send_documents_fallback(
    post: &PostForDelivery,
    transport: &dyn Transport,
    blobs: &dyn BlobStore,
    send_timeout: Duration,
    chat_id: i64,
    msg: &OutboundMessage,
) -> Result<()> {
    let last = post.attachments.len().saturating_sub(1);
    for (i, attachment) in post.attachments.iter().enumerate() {
        let part = load_part(blobs, attachment).await?;
        let caption = (i == last).then_some(msg);
        with_timeout(send_timeout, transport.send_document(chat_id, part, caption))
            .await
            .with_context(|| format!("fallback document {} of {}", i + 1, last + 1))?;
    }
    Ok(())
}

async fn load_part(blobs: &dyn BlobStore, attachment: &Attachment) -> Result<MediaPart> {
    let bytes = blobs
        .read(&attachment.storage_ref)
        .await
        .with_context(|| format!("attachment {}", attachment.original_name))?;
    Ok(MediaPart {
        name: attachment.original_name.clone(),
        bytes,
        category: attachment.category,
    })
}

/// A hung transport call counts as that one recipient's failure, not the
/// whole job's.
async fn with_timeout<F>(limit: Duration, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(anyhow!("send timed out after {:?}", limit)),
    }
}
