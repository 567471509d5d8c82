//! Per-listing field extraction.
//!
//! Every field is resolved by walking an ordered chain of strategies and
//! keeping the first value that qualifies. Structural strategies read CSS
//! selectors inside the fragment; heuristic strategies mine the fragment's
//! flattened lowercase text. Each extracted value records which one produced it.

use crate::config::SiteProfile;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::fmt;
use tracing::warn;

/// Where an extracted value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Structural { selector: String },
    Heuristic { rule: &'static str },
}

impl Provenance {
    pub fn is_heuristic(&self) -> bool {
        matches!(self, Provenance::Heuristic { .. })
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Structural { selector } => write!(f, "selector `{}`", selector),
            Provenance::Heuristic { rule } => write!(f, "heuristic `{}`", rule),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub value: String,
    pub provenance: Provenance,
}

/// Raw extraction output for one fragment. `None` means every strategy missed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialProduct {
    pub name: Option<Extracted>,
    pub price: Option<Extracted>,
    pub shipping: Option<Extracted>,
    pub condition: Option<Extracted>,
    pub location: Option<Extracted>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Accept {
    /// Trimmed value must be longer than this many characters.
    LongerThan(usize),
    ContainsCurrency,
    NonEmpty,
}

#[derive(Debug)]
enum Heuristic {
    /// First text line mentioning the brand, within length bounds.
    BrandLine,
    /// Currency-prefixed numeric token.
    CurrencyToken(Regex),
    /// Fixed phrase found anywhere maps to a canonical value.
    Phrase { needle: &'static str, value: &'static str },
    /// First regex match in the text, verbatim.
    Pattern(Regex),
}

#[derive(Debug)]
enum Strategy {
    Structural { selector: Selector, source: String },
    Heuristic { rule: &'static str, heuristic: Heuristic },
}

#[derive(Debug)]
struct Chain {
    accept: Accept,
    strategies: Vec<Strategy>,
}

fn structural(selectors: &[String]) -> Vec<Strategy> {
    selectors
        .iter()
        .filter_map(|source| match Selector::parse(source) {
            Ok(selector) => Some(Strategy::Structural {
                selector,
                source: source.clone(),
            }),
            Err(e) => {
                warn!("Skipping invalid selector '{}': {}", source, e);
                None
            }
        })
        .collect()
}

fn currency_class(symbols: &[char]) -> String {
    let escaped: String = symbols
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    format!("[{}]", escaped)
}

/// Text of every element matching `selector` inside `fragment`, joined and trimmed.
fn selected_text(fragment: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text: String = fragment
        .select(selector)
        .flat_map(|el| el.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Lowercased concatenation of every text node under the fragment.
pub fn flattened_text(fragment: ElementRef<'_>) -> String {
    fragment.text().collect::<String>().to_lowercase()
}

pub struct FieldExtractor {
    name: Chain,
    price: Chain,
    shipping: Chain,
    condition: Chain,
    location: Chain,
    item_link: Option<Selector>,
    currency_symbols: Vec<char>,
    brand_token: String,
    min_text_line_len: usize,
    max_name_line_len: usize,
}

impl FieldExtractor {
    pub fn new(profile: &SiteProfile) -> Self {
        let fields = &profile.fields;
        let currency = currency_class(&profile.currency_symbols);

        let mut name = structural(&fields.name);
        name.push(Strategy::Heuristic {
            rule: "brand-line",
            heuristic: Heuristic::BrandLine,
        });

        let mut price = structural(&fields.price);
        if let Ok(re) = Regex::new(&format!(r"{}\d[\d,]*(?:\.\d+)?", currency)) {
            price.push(Strategy::Heuristic {
                rule: "currency-token",
                heuristic: Heuristic::CurrencyToken(re),
            });
        }

        let mut shipping = structural(&fields.shipping);
        shipping.push(Strategy::Heuristic {
            rule: "free-shipping-phrase",
            heuristic: Heuristic::Phrase {
                needle: "free shipping",
                value: "Free shipping",
            },
        });

        let mut condition = structural(&fields.condition);
        if let Ok(re) = Regex::new(r"(?i)(new|used|refurbished|pre-owned)") {
            condition.push(Strategy::Heuristic {
                rule: "condition-keyword",
                heuristic: Heuristic::Pattern(re),
            });
        }

        Self {
            name: Chain {
                accept: Accept::LongerThan(profile.min_name_len),
                strategies: name,
            },
            price: Chain {
                accept: Accept::ContainsCurrency,
                strategies: price,
            },
            shipping: Chain {
                accept: Accept::NonEmpty,
                strategies: shipping,
            },
            condition: Chain {
                accept: Accept::NonEmpty,
                strategies: condition,
            },
            location: Chain {
                accept: Accept::NonEmpty,
                strategies: structural(&fields.location),
            },
            item_link: Selector::parse(&fields.item_link).ok(),
            currency_symbols: profile.currency_symbols.clone(),
            brand_token: profile.brand_token.to_lowercase(),
            min_text_line_len: profile.min_text_line_len,
            max_name_line_len: profile.max_name_line_len,
        }
    }

    /// Extract every field of one listing fragment. `text` is the fragment's
    /// flattened lowercase text, computed once by the caller.
    pub fn extract(&self, fragment: ElementRef<'_>, text: &str) -> PartialProduct {
        PartialProduct {
            name: self.resolve(&self.name, fragment, text),
            price: self.resolve(&self.price, fragment, text),
            shipping: self.resolve(&self.shipping, fragment, text),
            condition: self.resolve(&self.condition, fragment, text),
            location: self.resolve(&self.location, fragment, text),
            link: self.link(fragment),
        }
    }

    fn resolve(&self, chain: &Chain, fragment: ElementRef<'_>, text: &str) -> Option<Extracted> {
        chain.strategies.iter().find_map(|strategy| {
            let (value, provenance) = match strategy {
                Strategy::Structural { selector, source } => (
                    selected_text(fragment, selector)?,
                    Provenance::Structural {
                        selector: source.clone(),
                    },
                ),
                Strategy::Heuristic { rule, heuristic } => (
                    self.mine(heuristic, text)?,
                    Provenance::Heuristic { rule: *rule },
                ),
            };
            self.accepts(chain.accept, &value)
                .then_some(Extracted { value, provenance })
        })
    }

    fn mine(&self, heuristic: &Heuristic, text: &str) -> Option<String> {
        match heuristic {
            Heuristic::BrandLine => text
                .split('\n')
                .filter(|line| line.trim().chars().count() > self.min_text_line_len)
                .find(|line| {
                    line.contains(self.brand_token.as_str())
                        && line.chars().count() < self.max_name_line_len
                })
                .map(|line| line.trim().to_string()),
            Heuristic::CurrencyToken(re) | Heuristic::Pattern(re) => {
                re.find(text).map(|m| m.as_str().to_string())
            }
            Heuristic::Phrase { needle, value } => {
                text.contains(needle).then(|| value.to_string())
            }
        }
    }

    fn accepts(&self, accept: Accept, value: &str) -> bool {
        let value = value.trim();
        match accept {
            Accept::LongerThan(min) => value.chars().count() > min,
            Accept::ContainsCurrency => value.contains(self.currency_symbols.as_slice()),
            Accept::NonEmpty => !value.is_empty(),
        }
    }

    fn link(&self, fragment: ElementRef<'_>) -> Option<String> {
        let selector = self.item_link.as_ref()?;
        fragment
            .select(selector)
            .find_map(|a| a.value().attr("href"))
            .map(str::to_string)
    }
}
