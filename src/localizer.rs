//! Per-recipient content localization. Group-sourced recipients get the post
//! translated into their member language; individual targets get the post
//! verbatim. Translation failures always degrade to the original text, so a
//! recipient never loses a delivery because the translator is down.

use crate::db::model::PostForDelivery;
use crate::resolver::RecipientTarget;
use crate::translate::Translator;
use crate::transport::OutboundMessage;
use tracing::warn;

pub async fn localize(
    translator: &dyn Translator,
    post: &PostForDelivery,
    target: &RecipientTarget,
) -> OutboundMessage {
    let Some(lang) = target.language.as_deref() else {
        return OutboundMessage {
            text: post.content.clone(),
            html: post.html,
            button: post.button.clone(),
        };
    };

    let text = match translator.translate(&post.content, lang).await {
        Ok(translated) => translated,
        Err(err) => {
            warn!(?err, chat_id = target.chat_id, lang, "translation failed; using original text");
            post.content.clone()
        }
    };

    // The button URL is never translated, only its label.
    let button = match &post.button {
        Some(button) => {
            let label = match translator.translate(&button.label, lang).await {
                Ok(translated) => translated,
                Err(err) => {
                    warn!(?err, chat_id = target.chat_id, lang, "button translation failed; using original label");
                    button.label.clone()
                }
            };
            Some(crate::model::Button {
                label,
                url: button.url.clone(),
            })
        }
        None => None,
    };

    OutboundMessage {
        text,
        html: post.html,
        button,
    }
}
