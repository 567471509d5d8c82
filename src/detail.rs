use crate::config::SiteProfile;
use crate::types::{ItemDetail, SENTINEL};
use regex::Regex;
use scraper::{Html, Selector};

/// Pulls seller, item number and the long description off an item page.
pub struct DetailExtractor {
    description: Vec<Selector>,
    seller: Vec<Selector>,
    item_number_text: Option<Selector>,
    item_number_labels: Option<Selector>,
    item_number_label_re: Option<Regex>,
    item_number_digits_re: Option<Regex>,
}

fn compile(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

fn document_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_string()
}

impl DetailExtractor {
    pub fn new(profile: &SiteProfile) -> Self {
        let detail = &profile.detail;
        Self {
            description: compile(&detail.description),
            seller: compile(&detail.seller),
            item_number_text: Selector::parse(&detail.item_number_text).ok(),
            item_number_labels: Selector::parse(&detail.item_number_labels).ok(),
            item_number_label_re: Regex::new(r"Item number: (\d+)").ok(),
            item_number_digits_re: Regex::new(r"(\d{12,})").ok(),
        }
    }

    pub fn extract(&self, html: &str) -> ItemDetail {
        let document = Html::parse_document(html);

        let first_text = |selectors: &[Selector]| {
            selectors
                .iter()
                .map(|sel| document_text(&document, sel))
                .find(|text| !text.is_empty())
                .unwrap_or_else(|| SENTINEL.to_string())
        };

        let description = first_text(&self.description);
        let seller = first_text(&self.seller);

        let by_label = self.item_number_text.as_ref().and_then(|sel| {
            let text = document_text(&document, sel);
            self.item_number_label_re
                .as_ref()?
                .captures(&text)
                .map(|c| c[1].to_string())
        });
        let item_number = by_label
            .or_else(|| {
                self.item_number_labels.as_ref().and_then(|sel| {
                    let text = document_text(&document, sel);
                    self.item_number_digits_re
                        .as_ref()?
                        .captures(&text)
                        .map(|c| c[1].to_string())
                })
            })
            .unwrap_or_else(|| SENTINEL.to_string());

        ItemDetail {
            description,
            seller,
            item_number,
        }
    }
}
