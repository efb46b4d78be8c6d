use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

/// Translation capability used by the localizer. Production code talks to a
/// LibreTranslate-compatible endpoint; tests script responses.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct TranslateClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl fmt::Debug for TranslateClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslateClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TranslateClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid translation base URL")?;
        let http = Client::builder()
            .user_agent("tg-postman/0.1")
            .build()
            .context("failed to build translation HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn build_request(&self, text: &str, target_lang: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("translate")
            .context("invalid translation base URL")?;
        let body = build_translate_request(text, target_lang, self.api_key.as_deref());
        self.http
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .build()
            .context("failed to build translation request")
    }
}

#[async_trait]
impl Translator for TranslateClient {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let request = self.build_request(text, target_lang)?;
        debug!(url=%request.url(), target_lang, "sending translation request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach translation service")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from translation service: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("translation error {}: {}", status, body));
        }

        let payload: TranslateResponse =
            res.json().await.context("invalid translation response")?;
        Ok(payload.translated_text)
    }
}

/// Request payload for `POST /translate`. Source language is always detected
/// server-side.
pub fn build_translate_request(text: &str, target_lang: &str, api_key: Option<&str>) -> Value {
    let mut body = json!({
        "q": text,
        "source": "auto",
        "target": target_lang,
        "format": "text",
    });
    if let Some(key) = api_key {
        body["api_key"] = json!(key);
    }
    body
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}
