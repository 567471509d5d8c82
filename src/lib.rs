pub mod api;
pub mod config;
pub mod detail;
pub mod enricher;
pub mod extractor;
pub mod fetcher;
pub mod mcp;
pub mod pipeline;
pub mod series;
pub mod service;
pub mod types;

use anyhow::Context;
use config::{ServiceConfig, SiteProfile};
use detail::DetailExtractor;
use enricher::{ChatCompletionClient, DescriptionEnricher, TextService};
use fetcher::PageFetcher;
use pipeline::ListingPipeline;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub use types::*;

const CERT_DIR: &str = "/app/certificates";

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub profile: Arc<SiteProfile>,
    pub pipeline: Arc<ListingPipeline>,
    pub details: Arc<DetailExtractor>,
    pub fetcher: PageFetcher,
    pub enricher: DescriptionEnricher,
    // key: "<source url>|<page>"
    pub scrape_cache: moka::future::Cache<String, ScrapeResult>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("accepted_host", &self.profile.accepted_host)
            .field("enrichment_enabled", &self.enricher.is_configured())
            .field("degrade_on_block", &self.config.degrade_on_block)
            .finish()
    }
}

impl AppState {
    pub fn new(config: ServiceConfig, profile: SiteProfile, http_client: reqwest::Client) -> Self {
        let pipeline = ListingPipeline::new(&profile);

        let service: Option<Arc<dyn TextService>> = config.text_service.clone().map(|tc| {
            info!("Text enrichment backend: {} ({})", tc.base_url, tc.model);
            Arc::new(ChatCompletionClient::new(http_client.clone(), tc)) as Arc<dyn TextService>
        });
        let enricher = DescriptionEnricher::new(
            service,
            pipeline.classifier().clone(),
            profile.brand_token.clone(),
        );

        Self {
            fetcher: PageFetcher::new(http_client, &config),
            details: Arc::new(DetailExtractor::new(&profile)),
            scrape_cache: moka::future::Cache::builder()
                .max_capacity(1_000)
                .time_to_live(config.cache_ttl.max(std::time::Duration::from_secs(1)))
                .build(),
            pipeline: Arc::new(pipeline),
            profile: Arc::new(profile),
            enricher,
            config,
        }
    }

    pub fn cache_enabled(&self) -> bool {
        !self.config.cache_ttl.is_zero()
    }
}

pub fn build_http_client(config: &ServiceConfig) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(ca_cert_name) = &config.tls_ca_cert {
        let cert_path = Path::new(CERT_DIR).join(ca_cert_name);
        let pem = std::fs::read(&cert_path).with_context(|| {
            format!("Failed to read TLS CA certificate at {}", cert_path.display())
        })?;
        let cert = reqwest::Certificate::from_pem(&pem).with_context(|| {
            format!("Failed to parse TLS CA certificate at {}", cert_path.display())
        })?;
        info!("Loaded TLS CA certificate from {}", cert_path.display());
        builder = builder.add_root_certificate(cert);
    }

    builder.build().context("Failed to build HTTP client")
}
