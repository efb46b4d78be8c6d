//! Outbound Telegram transport. The delivery executor only sees the
//! [`Transport`] trait; the teloxide-backed client lives behind it so the
//! process entry point owns client lifecycle and tests can record calls.

use crate::model::{Button, CaptionPlacement, MediaCategory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use teloxide::payloads::{
    SendAudioSetters, SendDocumentSetters, SendMessageSetters, SendPhotoSetters, SendVideoSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaAudio,
    InputMediaDocument, InputMediaPhoto, InputMediaVideo, ParseMode,
};

/// One recipient-ready message: localized text, parse-mode flag, and the
/// optional inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub html: bool,
    pub button: Option<Button>,
}

/// One attachment payload, read fresh from the blob store for each send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub name: String,
    pub bytes: Vec<u8>,
    pub category: MediaCategory,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Plain text message with optional inline button.
    async fn send_text(&self, chat_id: i64, msg: &OutboundMessage) -> Result<()>;

    /// Single media message; the transport call is selected by the part's
    /// category. Text rides along as the caption.
    async fn send_single(&self, chat_id: i64, part: MediaPart, msg: &OutboundMessage)
        -> Result<()>;

    /// Batched media group. `as_documents` forces every item to the document
    /// transport (mixed attachment sets). The caption sits on the item chosen
    /// by `placement`; the batch API has no message-level button slot.
    async fn send_group(
        &self,
        chat_id: i64,
        parts: Vec<MediaPart>,
        msg: &OutboundMessage,
        as_documents: bool,
        placement: CaptionPlacement,
    ) -> Result<()>;

    /// Individual document message, used by the media-group fallback path.
    /// `msg` is set only on the item that carries the caption and button.
    async fn send_document(
        &self,
        chat_id: i64,
        part: MediaPart,
        msg: Option<&OutboundMessage>,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn keyboard(button: &Button) -> Result<InlineKeyboardMarkup> {
    let url = Url::parse(&button.url).context("invalid button URL")?;
    Ok(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::url(button.label.clone(), url),
    ]]))
}

fn input_file(part: &MediaPart) -> InputFile {
    InputFile::memory(part.bytes.clone()).file_name(part.name.clone())
}

fn to_input_media(part: &MediaPart, caption: Option<&OutboundMessage>) -> InputMedia {
    let file = input_file(part);
    match part.category {
        MediaCategory::Image => {
            let mut media = InputMediaPhoto::new(file);
            if let Some(msg) = caption {
                media = media.caption(msg.text.clone());
                if msg.html {
                    media = media.parse_mode(ParseMode::Html);
                }
            }
            InputMedia::Photo(media)
        }
        MediaCategory::Video => {
            let mut media = InputMediaVideo::new(file);
            if let Some(msg) = caption {
                media = media.caption(msg.text.clone());
                if msg.html {
                    media = media.parse_mode(ParseMode::Html);
                }
            }
            InputMedia::Video(media)
        }
        MediaCategory::Audio => {
            let mut media = InputMediaAudio::new(file);
            if let Some(msg) = caption {
                media = media.caption(msg.text.clone());
                if msg.html {
                    media = media.parse_mode(ParseMode::Html);
                }
            }
            InputMedia::Audio(media)
        }
        MediaCategory::Document => {
            let mut media = InputMediaDocument::new(file);
            if let Some(msg) = caption {
                media = media.caption(msg.text.clone());
                if msg.html {
                    media = media.parse_mode(ParseMode::Html);
                }
            }
            InputMedia::Document(media)
        }
    }
}

fn to_document_media(part: &MediaPart, caption: Option<&OutboundMessage>) -> InputMedia {
    let mut media = InputMediaDocument::new(input_file(part));
    if let Some(msg) = caption {
        media = media.caption(msg.text.clone());
        if msg.html {
            media = media.parse_mode(ParseMode::Html);
        }
    }
    InputMedia::Document(media)
}

fn caption_index(placement: CaptionPlacement, len: usize) -> usize {
    match placement {
        CaptionPlacement::First => 0,
        CaptionPlacement::Last => len.saturating_sub(1),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, msg: &OutboundMessage) -> Result<()> {
        let mut req = self.bot.send_message(ChatId(chat_id), msg.text.clone());
        if msg.html {
            req = req.parse_mode(ParseMode::Html);
        }
        if let Some(button) = &msg.button {
            req = req.reply_markup(keyboard(button)?);
        }
        req.await.context("send_message failed")?;
        Ok(())
    }

    async fn send_single(
        &self,
        chat_id: i64,
        part: MediaPart,
        msg: &OutboundMessage,
    ) -> Result<()> {
        let chat = ChatId(chat_id);
        let file = input_file(&part);
        let markup = msg.button.as_ref().map(keyboard).transpose()?;
        match part.category {
            MediaCategory::Image => {
                let mut req = self.bot.send_photo(chat, file).caption(msg.text.clone());
                if msg.html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("send_photo failed")?;
            }
            MediaCategory::Video => {
                let mut req = self.bot.send_video(chat, file).caption(msg.text.clone());
                if msg.html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("send_video failed")?;
            }
            MediaCategory::Audio => {
                let mut req = self.bot.send_audio(chat, file).caption(msg.text.clone());
                if msg.html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("send_audio failed")?;
            }
            MediaCategory::Document => {
                let mut req = self.bot.send_document(chat, file).caption(msg.text.clone());
                if msg.html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("send_document failed")?;
            }
        }
        Ok(())
    }

    async fn send_group(
        &self,
        chat_id: i64,
        parts: Vec<MediaPart>,
        msg: &OutboundMessage,
        as_documents: bool,
        placement: CaptionPlacement,
    ) -> Result<()> {
        let caption_at = caption_index(placement, parts.len());
        let media: Vec<InputMedia> = parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let caption = (i == caption_at).then_some(msg);
                if as_documents {
                    to_document_media(part, caption)
                } else {
                    to_input_media(part, caption)
                }
            })
            .collect();
        self.bot
            .send_media_group(ChatId(chat_id), media)
            .await
            .context("send_media_group failed")?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        part: MediaPart,
        msg: Option<&OutboundMessage>,
    ) -> Result<()> {
        let mut req = self.bot.send_document(ChatId(chat_id), input_file(&part));
        if let Some(msg) = msg {
            req = req.caption(msg.text.clone());
            if msg.html {
                req = req.parse_mode(ParseMode::Html);
            }
            if let Some(button) = &msg.button {
                req = req.reply_markup(keyboard(button)?);
            }
        }
        req.await.context("send_document failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, category: MediaCategory) -> MediaPart {
        MediaPart {
            name: name.into(),
            bytes: vec![1, 2, 3],
            category,
        }
    }

    fn msg(text: &str) -> OutboundMessage {
        OutboundMessage {
            text: text.into(),
            html: true,
            button: None,
        }
    }

    #[test]
    fn caption_index_respects_placement() {
        assert_eq!(caption_index(CaptionPlacement::First, 3), 0);
        assert_eq!(caption_index(CaptionPlacement::Last, 3), 2);
        assert_eq!(caption_index(CaptionPlacement::Last, 0), 0);
    }

    #[test]
    fn input_media_matches_category() {
        let m = to_input_media(&part("a.jpg", MediaCategory::Image), None);
        assert!(matches!(m, InputMedia::Photo(_)));
        let m = to_input_media(&part("a.mp4", MediaCategory::Video), None);
        assert!(matches!(m, InputMedia::Video(_)));
        let m = to_input_media(&part("a.mp3", MediaCategory::Audio), None);
        assert!(matches!(m, InputMedia::Audio(_)));
        let m = to_input_media(&part("a.pdf", MediaCategory::Document), None);
        assert!(matches!(m, InputMedia::Document(_)));
    }

    #[test]
    fn document_media_ignores_original_category() {
        let m = to_document_media(&part("a.jpg", MediaCategory::Image), Some(&msg("cap")));
        match m {
            InputMedia::Document(doc) => {
                assert_eq!(doc.caption.as_deref(), Some("cap"));
                assert_eq!(doc.parse_mode, Some(ParseMode::Html));
            }
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn keyboard_rejects_invalid_url() {
        let button = Button {
            label: "Open".into(),
            url: "not a url".into(),
        };
        assert!(keyboard(&button).is_err());
    }
}
