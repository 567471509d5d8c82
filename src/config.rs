//! Site profiles and service settings.
//!
//! A [`SiteProfile`] is plain data describing how one marketplace lays out its
//! search results. The extractor, classifier and pipeline each take what they
//! need from it at construction, so several profiles can live side by side.

use crate::types::Product;
use std::env;
use std::time::Duration;

/// Ordered selector lists for a single listing fragment.
#[derive(Debug, Clone)]
pub struct FieldSelectors {
    pub name: Vec<String>,
    pub price: Vec<String>,
    pub shipping: Vec<String>,
    pub condition: Vec<String>,
    pub location: Vec<String>,
    /// Anchor pointing at an item-detail page.
    pub item_link: String,
}

/// Selectors used on item-detail pages.
#[derive(Debug, Clone)]
pub struct DetailSelectors {
    pub description: Vec<String>,
    pub seller: Vec<String>,
    pub item_number_text: String,
    pub item_number_labels: String,
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Host substring a source URL must contain to be accepted.
    pub accepted_host: String,
    pub results_container: String,
    pub next_page: String,
    pub fields: FieldSelectors,
    pub detail: DetailSelectors,
    /// Lowercase token a text line must contain to be taken as a name.
    pub brand_token: String,
    pub currency_symbols: Vec<char>,
    pub sponsored_token: String,
    pub series: Vec<String>,
    pub page_param: String,
    pub max_products: usize,
    pub min_name_len: usize,
    pub max_name_line_len: usize,
    pub min_text_line_len: usize,
    pub description_chars: usize,
    /// Pages advertised by a degraded result.
    pub degraded_page_limit: u32,
    pub mock_product: Product,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SiteProfile {
    /// Nike listings on eBay search results.
    pub fn ebay() -> Self {
        Self {
            accepted_host: "ebay.com".to_string(),
            results_container: ".srp-results .s-item".to_string(),
            next_page: ".pagination__next, .ebayui-pagination__control--next".to_string(),
            fields: FieldSelectors {
                name: strings(&[".s-item__title", "h3", ".it-ttl", "a[href*=\"/itm/\"]"]),
                price: strings(&[".s-item__price", ".notranslate"]),
                shipping: strings(&[".s-item__shipping"]),
                condition: strings(&[".SECONDARY_INFO"]),
                location: strings(&[".s-item__location"]),
                item_link: "a[href*=\"/itm/\"]".to_string(),
            },
            detail: DetailSelectors {
                description: strings(&[
                    ".x-acc-txt-about-this-item",
                    ".notranslate",
                    ".u-flL",
                    ".item-description",
                ]),
                seller: strings(&[".x-sellercard-atf__info__about-seller", ".mbg-nw"]),
                item_number_text: ".notranslate".to_string(),
                item_number_labels: "[data-testid=\"ux-labels-values\"]".to_string(),
            },
            brand_token: "nike".to_string(),
            currency_symbols: vec!['$'],
            sponsored_token: "sponsored".to_string(),
            series: strings(&[
                "Air Max 90",
                "Air Max 95",
                "Air Max 97",
                "Air Max 270",
                "Air Force 1",
                "Air Jordan",
                "Dunk",
                "Blazer",
                "React Element",
                "Zoom",
                "Free Run",
                "Revolution",
            ]),
            page_param: "_pgn".to_string(),
            max_products: 50,
            min_name_len: 5,
            max_name_line_len: 200,
            min_text_line_len: 10,
            description_chars: 200,
            degraded_page_limit: 3,
            mock_product: Product {
                name: "Nike Air Max 90 Essential".to_string(),
                price: "$89.99".to_string(),
                shipping: "Free shipping".to_string(),
                condition: "New".to_string(),
                location: "US".to_string(),
                series: "Air Max 90".to_string(),
                description: "Classic Nike Air Max 90".to_string(),
                seller: "nike_store".to_string(),
                item_number: "123456".to_string(),
            },
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::ebay()
    }
}

/// Which chat-completions backend to use for enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextServiceConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

impl TextServiceConfig {
    pub fn deepseek(api_key: String) -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            api_key,
        }
    }

    pub fn openai(api_key: String) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub text_service: Option<TextServiceConfig>,
    pub enrich_descriptions: bool,
    pub enrich_concurrency: usize,
    pub degrade_on_block: bool,
    pub fetch_timeout: Duration,
    pub politeness_delay: Duration,
    pub politeness_jitter: Duration,
    pub cache_ttl: Duration,
    pub tls_ca_cert: Option<String>,
    pub tls_host_cert: Option<String>,
    pub tls_host_key: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            text_service: None,
            enrich_descriptions: false,
            enrich_concurrency: 4,
            degrade_on_block: true,
            fetch_timeout: Duration::from_secs(30),
            politeness_delay: Duration::from_millis(1000),
            politeness_jitter: Duration::from_millis(2000),
            cache_ttl: Duration::from_secs(300),
            tls_ca_cert: None,
            tls_host_cert: None,
            tls_host_key: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| {
        matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // DeepSeek wins when both keys are present
        let text_service = env_non_empty("DEEPSEEK_API_KEY")
            .map(TextServiceConfig::deepseek)
            .or_else(|| env_non_empty("OPENAI_API_KEY").map(TextServiceConfig::openai));

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            text_service,
            enrich_descriptions: env_flag("ENRICH_DESCRIPTIONS")
                .unwrap_or(defaults.enrich_descriptions),
            enrich_concurrency: env_parse::<usize>("ENRICH_CONCURRENCY")
                .unwrap_or(defaults.enrich_concurrency)
                .max(1),
            degrade_on_block: env_flag("DEGRADE_ON_BLOCK").unwrap_or(defaults.degrade_on_block),
            fetch_timeout: env_parse("FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            politeness_delay: env_parse("POLITENESS_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.politeness_delay),
            politeness_jitter: env_parse("POLITENESS_JITTER_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.politeness_jitter),
            cache_ttl: env_parse("SCRAPE_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            tls_ca_cert: env_non_empty("TLS_CA_CERT"),
            tls_host_cert: env_non_empty("TLS_HOST_CERT"),
            tls_host_key: env_non_empty("TLS_HOST_KEY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ebay_profile_selectors_compile() {
        let profile = SiteProfile::ebay();
        let all = profile
            .fields
            .name
            .iter()
            .chain(&profile.fields.price)
            .chain(&profile.fields.shipping)
            .chain(&profile.fields.condition)
            .chain(&profile.fields.location)
            .chain(&profile.detail.description)
            .chain(&profile.detail.seller)
            .chain([
                &profile.results_container,
                &profile.next_page,
                &profile.fields.item_link,
                &profile.detail.item_number_text,
                &profile.detail.item_number_labels,
            ]);
        for selector in all {
            assert!(scraper::Selector::parse(selector).is_ok(), "bad selector: {}", selector);
        }
    }

    #[test]
    fn test_service_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.degrade_on_block);
        assert!(!config.enrich_descriptions);
        assert!(config.text_service.is_none());
    }
}
