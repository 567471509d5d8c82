use crate::config::SiteProfile;
use crate::extractor::{flattened_text, Extracted, FieldExtractor, PartialProduct};
use crate::series::SeriesClassifier;
use crate::types::{is_sentinel, Product, ScrapeResult, SENTINEL};
use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid selector `{0}` in site profile")]
    Selector(String),
    #[error("invalid source URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Rewrite (or append) the page-number query parameter of `source`.
pub fn page_url(source: &str, param: &str, page: u32) -> Result<String, PipelineError> {
    let mut url = Url::parse(source).map_err(|e| PipelineError::InvalidUrl {
        url: source.to_string(),
        source: e,
    })?;
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let page = page.to_string();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        let mut written = false;
        for (key, value) in &pairs {
            if key != param {
                query.append_pair(key, value);
            } else if !written {
                query.append_pair(key, &page);
                written = true;
            }
        }
        if !written {
            query.append_pair(param, &page);
        }
    }
    Ok(url.to_string())
}

/// A listing that passed the mandatory-field rule, before enrichment.
#[derive(Debug, Clone)]
struct Listing {
    name: String,
    price: String,
    shipping: String,
    condition: String,
    location: String,
    // only used for logging; never part of the output
    link: Option<String>,
}

fn value_or_sentinel(field: Option<Extracted>) -> String {
    field
        .map(|e| e.value)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// Turns a search-results page into a bounded, deduplicated product list.
pub struct ListingPipeline {
    extractor: FieldExtractor,
    classifier: SeriesClassifier,
    container: Option<Selector>,
    container_source: String,
    next_page: Option<Selector>,
    sponsored_token: String,
    page_param: String,
    max_products: usize,
    min_name_len: usize,
    description_chars: usize,
    degraded_page_limit: u32,
    mock_product: Product,
}

impl ListingPipeline {
    pub fn new(profile: &SiteProfile) -> Self {
        Self {
            extractor: FieldExtractor::new(profile),
            classifier: SeriesClassifier::new(profile.series.iter().cloned()),
            container: Selector::parse(&profile.results_container).ok(),
            container_source: profile.results_container.clone(),
            next_page: Selector::parse(&profile.next_page).ok(),
            sponsored_token: profile.sponsored_token.to_lowercase(),
            page_param: profile.page_param.clone(),
            max_products: profile.max_products,
            min_name_len: profile.min_name_len,
            description_chars: profile.description_chars,
            degraded_page_limit: profile.degraded_page_limit,
            mock_product: profile.mock_product.clone(),
        }
    }

    pub fn classifier(&self) -> &SeriesClassifier {
        &self.classifier
    }

    pub fn page_param(&self) -> &str {
        &self.page_param
    }

    /// Never fails: internal errors produce an empty result.
    pub fn run(&self, html: &str, requested_page: u32, source_url: &str) -> ScrapeResult {
        match self.try_run(html, requested_page, source_url) {
            Ok(result) => result,
            Err(e) => {
                warn!("Listing pipeline failed on page {}: {}", requested_page, e);
                ScrapeResult::empty(requested_page)
            }
        }
    }

    fn try_run(
        &self,
        html: &str,
        requested_page: u32,
        source_url: &str,
    ) -> Result<ScrapeResult, PipelineError> {
        let container = self
            .container
            .as_ref()
            .ok_or_else(|| PipelineError::Selector(self.container_source.clone()))?;
        let document = Html::parse_document(html);

        // No fallback container: zero matches means zero candidates
        let fragments: Vec<_> = document.select(container).collect();
        info!("Found {} listing fragments on page {}", fragments.len(), requested_page);

        let candidates = fragments
            .into_iter()
            .enumerate()
            .filter_map(|(index, fragment)| {
                let text = flattened_text(fragment);
                if text.contains(self.sponsored_token.as_str()) {
                    debug!("Skipping sponsored fragment {}", index + 1);
                    return None;
                }
                let partial = self.extractor.extract(fragment, &text);
                self.qualify(index, partial)
            });

        let mut listings = dedup(candidates);
        listings.truncate(self.max_products);

        let products: Vec<Product> = listings.into_iter().map(|l| self.finalize(l)).collect();

        let next_link = self
            .next_page
            .as_ref()
            .is_some_and(|sel| document.select(sel).next().is_some());
        // No page after u32::MAX
        let next_page_url = match requested_page.checked_add(1) {
            Some(next) if next_link => Some(page_url(source_url, &self.page_param, next)?),
            _ => None,
        };
        let has_next_page = next_page_url.is_some();

        info!("Returning {} products for page {}", products.len(), requested_page);
        Ok(ScrapeResult {
            products,
            current_page: requested_page,
            has_next_page,
            next_page_url,
        })
    }

    /// Mandatory-field rule: a usable name and a price.
    fn qualify(&self, index: usize, partial: PartialProduct) -> Option<Listing> {
        let (name, price) = match (&partial.name, &partial.price) {
            (Some(name), Some(price)) => (name, price),
            _ => {
                debug!(
                    "Fragment {} missing {}",
                    index + 1,
                    if partial.name.is_none() { "name" } else { "price" }
                );
                return None;
            }
        };
        let name_value = name.value.trim();
        if is_sentinel(name_value)
            || name_value.chars().count() <= self.min_name_len
            || is_sentinel(price.value.trim())
        {
            return None;
        }
        debug!(
            "Fragment {}: name via {}, price via {}",
            index + 1,
            name.provenance,
            price.provenance
        );

        Some(Listing {
            name: name_value.to_string(),
            price: price.value.trim().to_string(),
            shipping: value_or_sentinel(partial.shipping),
            condition: value_or_sentinel(partial.condition),
            location: value_or_sentinel(partial.location),
            link: partial.link,
        })
    }

    fn finalize(&self, listing: Listing) -> Product {
        if let Some(link) = &listing.link {
            debug!("Dropping item link {}", link);
        }
        Product {
            series: self.classifier.classify(&listing.name),
            description: listing.name.chars().take(self.description_chars).collect(),
            seller: SENTINEL.to_string(),
            item_number: SENTINEL.to_string(),
            name: listing.name,
            price: listing.price,
            shipping: listing.shipping,
            condition: listing.condition,
            location: listing.location,
        }
    }

    /// Fixed stand-in result served when the source blocks us.
    pub fn degraded(&self, requested_page: u32, source_url: &str) -> ScrapeResult {
        let next_page_url = requested_page
            .checked_add(1)
            .filter(|_| requested_page < self.degraded_page_limit)
            .and_then(|next| page_url(source_url, &self.page_param, next).ok());
        ScrapeResult {
            products: vec![self.mock_product.clone()],
            current_page: requested_page,
            has_next_page: next_page_url.is_some(),
            next_page_url,
        }
    }
}

/// Keep the first listing for each exact (name, price) pair.
fn dedup(listings: impl Iterator<Item = Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .filter(|l| seen.insert((l.name.clone(), l.price.clone())))
        .collect()
}
