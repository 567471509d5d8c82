use crate::fetcher::FetchError;
use crate::pipeline::page_url;
use crate::types::{ItemDetail, ScrapeResult};
use crate::AppState;
use tracing::{debug, error, info, warn};

fn cache_key(url: &str, page: u32) -> String {
    format!("{}|{}", url, page)
}

/// Fetch one results page and run it through the listing pipeline.
///
/// Only a block with `degrade_on_block` switched off is returned as an
/// error; every other failure is folded into the result.
pub async fn scrape_listings(
    state: &AppState,
    url: &str,
    page: u32,
) -> Result<ScrapeResult, FetchError> {
    let page = page.max(1);
    let key = cache_key(url, page);

    if state.cache_enabled() {
        if let Some(cached) = state.scrape_cache.get(&key).await {
            debug!("scrape cache hit for {}", key);
            return Ok(cached);
        }
    }

    let fetch_url = match page_url(url, state.pipeline.page_param(), page) {
        Ok(u) => u,
        Err(e) => {
            warn!("Cannot build page URL: {}", e);
            return Ok(ScrapeResult::empty(page));
        }
    };
    info!("Scraping page {} ({})", page, fetch_url);

    let html = match state.fetcher.fetch(&fetch_url).await {
        Ok(html) => html,
        Err(e) if e.is_block() => {
            if state.config.degrade_on_block {
                warn!("Source blocked the request ({}). Using mock data", e);
                return Ok(state.pipeline.degraded(page, url));
            }
            return Err(e);
        }
        Err(e) => {
            error!("Scraping error: {}", e);
            return Ok(ScrapeResult::empty(page));
        }
    };

    let mut result = state.pipeline.run(&html, page, url);

    if state.config.enrich_descriptions && state.enricher.is_configured() {
        info!("Enriching {} product descriptions", result.products.len());
        result.products = state
            .enricher
            .enrich_products(result.products, state.config.enrich_concurrency)
            .await;
    }

    if state.cache_enabled() && !result.products.is_empty() {
        state.scrape_cache.insert(key, result.clone()).await;
    }

    Ok(result)
}

/// Item-page details; all sentinels when the page cannot be fetched.
pub async fn fetch_item_detail(state: &AppState, url: &str) -> ItemDetail {
    match state.fetcher.fetch(url).await {
        Ok(html) => state.details.extract(&html),
        Err(e) => {
            warn!("Item detail fetch failed: {}", e);
            ItemDetail::default()
        }
    }
}
