//! Optional description cleanup and series inference backed by a
//! chat-completions API. Every path here falls back to the input (or the
//! local classifier) instead of failing.

use crate::config::TextServiceConfig;
use crate::series::SeriesClassifier;
use crate::types::{is_sentinel, Product, SENTINEL};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, EnrichError>;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

const DESCRIPTION_INSTRUCTION: &str = "You clean up marketplace product descriptions. \
Remove shipping details, promotions and anything unrelated to the item itself. \
Keep only the core product details and rewrite them in 1-3 concise sentences:";

const DESCRIPTION_MAX_TOKENS: u32 = 150;
const SERIES_MAX_TOKENS: u32 = 50;

fn series_instruction(brand: &str) -> String {
    format!(
        "Identify the product series or model line in this {} product name. \
Reply with the series name only (for example \"Air Max 90\", \"Air Force 1\" or \"React Element\").",
        brand
    )
}

/// A text-generation backend: one instruction, one input, one reply.
#[async_trait]
pub trait TextService: Send + Sync {
    async fn request(&self, instruction: &str, text: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client (OpenAI, DeepSeek).
#[derive(Clone)]
pub struct ChatCompletionClient {
    http_client: reqwest::Client,
    config: TextServiceConfig,
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl ChatCompletionClient {
    pub fn new(http_client: reqwest::Client, config: TextServiceConfig) -> Self {
        Self { http_client, config }
    }
}

#[async_trait]
impl TextService for ChatCompletionClient {
    async fn request(&self, instruction: &str, text: &str, max_tokens: u32) -> Result<String> {
        if self.config.api_key.trim().is_empty() {
            return Err(EnrichError::Config("API key is empty".into()));
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{}\n{}", instruction, text),
            }],
            max_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api(format!("{}: {}", status, error_text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EnrichError::Parse("response has no message content".into()))
    }
}

#[derive(Clone)]
pub struct DescriptionEnricher {
    service: Option<Arc<dyn TextService>>,
    classifier: SeriesClassifier,
    brand: String,
}

impl DescriptionEnricher {
    pub fn new(
        service: Option<Arc<dyn TextService>>,
        classifier: SeriesClassifier,
        brand: impl Into<String>,
    ) -> Self {
        Self {
            service,
            classifier,
            brand: brand.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    /// Cleaned-up description, or `raw` untouched when no service is
    /// configured or the call fails.
    pub async fn summarize(&self, raw: &str) -> String {
        if is_sentinel(raw) {
            return SENTINEL.to_string();
        }
        let Some(service) = &self.service else {
            return raw.to_string();
        };
        match service
            .request(DESCRIPTION_INSTRUCTION, raw, DESCRIPTION_MAX_TOKENS)
            .await
        {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                debug!("Text service returned an empty description; keeping original");
                raw.to_string()
            }
            Err(e) => {
                warn!("Description cleanup failed: {}", e);
                raw.to_string()
            }
        }
    }

    /// Series label inferred by the text service, falling back to the local
    /// lexicon on absence or failure.
    pub async fn extract_series_remote(&self, name: &str) -> String {
        if is_sentinel(name) {
            return SENTINEL.to_string();
        }
        let Some(service) = &self.service else {
            return self.classifier.classify(name);
        };
        let instruction = series_instruction(&self.brand);
        match service.request(&instruction, name, SERIES_MAX_TOKENS).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => self.classifier.classify(name),
            Err(e) => {
                warn!("Remote series lookup failed: {}", e);
                self.classifier.classify(name)
            }
        }
    }

    /// Summarize every product's description with at most `concurrency`
    /// calls in flight. Output order matches input order.
    pub async fn enrich_products(
        &self,
        products: Vec<Product>,
        concurrency: usize,
    ) -> Vec<Product> {
        stream::iter(products)
            .map(|mut product| async move {
                product.description = self.summarize(&product.description).await;
                product
            })
            .buffered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Scripted {
        reply: std::result::Result<String, String>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection reset".to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextService for Scripted {
        async fn request(
            &self,
            _instruction: &str,
            _text: &str,
            _max_tokens: u32,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(EnrichError::Network)
        }
    }

    /// Upper-cases its input after a delay inversely related to length, so
    /// completion order differs from submission order.
    struct Shouting;

    #[async_trait]
    impl TextService for Shouting {
        async fn request(
            &self,
            _instruction: &str,
            text: &str,
            _max_tokens: u32,
        ) -> Result<String> {
            let delay = 50u64.saturating_sub(text.len() as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(text.to_uppercase())
        }
    }

    fn enricher(service: Option<Arc<dyn TextService>>) -> DescriptionEnricher {
        let profile = SiteProfile::ebay();
        DescriptionEnricher::new(
            service,
            SeriesClassifier::new(profile.series),
            profile.brand_token,
        )
    }

    fn product(description: &str) -> Product {
        let mut p = SiteProfile::ebay().mock_product;
        p.description = description.to_string();
        p
    }

    #[tokio::test]
    async fn test_sentinel_input_skips_service() {
        let service = Scripted::ok("should not be used");
        let e = enricher(Some(service.clone()));
        assert_eq!(e.summarize("-").await, "-");
        assert_eq!(e.summarize("").await, "-");
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_summarize_trims_reply() {
        let e = enricher(Some(Scripted::ok("  Lightweight running shoe.  \n")));
        assert_eq!(e.summarize("Nike shoe FAST SHIPPING!!").await, "Lightweight running shoe.");
    }

    #[tokio::test]
    async fn test_summarize_falls_back_to_raw() {
        let raw = "Nike Air Max 90 + free returns";
        assert_eq!(enricher(None).summarize(raw).await, raw);
        assert_eq!(enricher(Some(Scripted::failing())).summarize(raw).await, raw);
        assert_eq!(enricher(Some(Scripted::ok("   "))).summarize(raw).await, raw);
    }

    #[tokio::test]
    async fn test_remote_series() {
        let remote = enricher(Some(Scripted::ok("Air Force 1\n")));
        assert_eq!(remote.extract_series_remote("Nike AF1 Low").await, "Air Force 1");

        let failing = enricher(Some(Scripted::failing()));
        assert_eq!(failing.extract_series_remote("Nike Dunk High").await, "Dunk");

        let local = enricher(None);
        assert_eq!(local.extract_series_remote("Nike Air Max 95 OG").await, "Air Max 95");
        assert_eq!(local.extract_series_remote("-").await, "-");
    }

    #[tokio::test]
    async fn test_enrich_products_keeps_order() {
        let e = enricher(Some(Arc::new(Shouting)));
        let products = vec![product("a"), product("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"), product("-")];
        let out = e.enrich_products(products, 3).await;
        let descriptions: Vec<&str> = out.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(descriptions, vec!["A", "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", "-"]);
    }

    #[test]
    fn test_unconfigured_enricher_blocking() {
        let e = enricher(None);
        assert!(!e.is_configured());
        let out = tokio_test::block_on(e.summarize("Nike Zoom Vomero 5"));
        assert_eq!(out, "Nike Zoom Vomero 5");
    }
}
