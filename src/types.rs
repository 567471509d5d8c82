use serde::{Deserialize, Serialize};

/// Placeholder for any field that could not be found.
pub const SENTINEL: &str = "-";

pub fn is_sentinel(value: &str) -> bool {
    value.is_empty() || value == SENTINEL
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    /// Currency-formatted text as shown on the page, never parsed.
    pub price: String,
    pub shipping: String,
    pub condition: String,
    pub location: String,
    pub series: String,
    pub description: String,
    pub seller: String,
    pub item_number: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub products: Vec<Product>,
    pub current_page: u32,
    pub has_next_page: bool,
    pub next_page_url: Option<String>,
}

impl ScrapeResult {
    /// Empty-but-valid result used when a scrape fails for a non-block reason.
    pub fn empty(current_page: u32) -> Self {
        Self {
            products: Vec::new(),
            current_page,
            has_next_page: false,
            next_page_url: None,
        }
    }
}

/// Fields scraped from a single item page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    pub description: String,
    pub seller: String,
    pub item_number: String,
}

impl Default for ItemDetail {
    fn default() -> Self {
        Self {
            description: SENTINEL.to_string(),
            seller: SENTINEL.to_string(),
            item_number: SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeQuery {
    pub url: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Response envelope wrapped around every routed payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: EnvelopeStatus,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn success(body: T) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            body,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: EnvelopeStatus,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            message: message.into(),
        }
    }
}
