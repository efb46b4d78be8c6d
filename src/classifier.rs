//! Attachment classification: per-file media category and the post-wide
//! send mode derived from the whole attachment set.

use crate::model::{MediaCategory, SendMode};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "wav", "flac", "m4a", "opus"];

/// Derive the media category from a filename extension. Files above
/// `max_inline_bytes` are degraded to documents regardless of extension.
pub fn categorize(original_name: &str, size_bytes: u64, max_inline_bytes: u64) -> MediaCategory {
    if size_bytes > max_inline_bytes {
        return MediaCategory::Document;
    }
    let ext = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Video
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Audio
    } else {
        MediaCategory::Document
    }
}

/// Pick the transport strategy for a post. Decided once per post and applied
/// uniformly to all recipients.
///
/// - no attachments: plain text message
/// - exactly one attachment: single media message, transport call selected
///   by its category (a lone document goes out as a document message)
/// - two or more, all album-capable: one batched media group
/// - anything else: batched document group
pub fn select_mode(categories: &[MediaCategory]) -> SendMode {
    match categories.len() {
        0 => SendMode::Text,
        1 => SendMode::SingleMedia,
        _ if categories.iter().all(MediaCategory::is_groupable) => SendMode::MediaGroup,
        _ => SendMode::DocGroup,
    }
}
