//! Markup heuristics for product fields
//!
//! Each field has an ordered selector cascade. Only the first element of each
//! selector is considered; the first one whose text passes the field's
//! validity check wins. Anything not found stays at the sentinel.

use super::{
    collapse_whitespace, truncate_chars, ExtractedBy, ExtractedFields, ExtractionError,
    FieldExtractor, SENTINEL,
};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

const NAME_SELECTORS: &[&str] = &[
    r#"h1[class*="product-title"]"#,
    r#"h1[class*="item-title"]"#,
    "h1.x-item-title",
    ".product-title",
    ".item-title",
    "#itemTitle",
    ".x-item-title__mainTitle",
    r#"h1[data-testid="x-item-title"]"#,
    "h1",
];

const PRICE_SELECTORS: &[&str] = &[
    ".x-price-primary .ux-textspans",
    r#"[class*="price"]"#,
    ".mainPrice",
    ".itemPrice",
    ".x-price-primary",
    ".x-bin-price",
    ".display-price",
    "#prcIsum",
    ".notranslate",
    ".vi-price",
    ".itemPrice .bold",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "#desc",
    ".item-desc",
    ".product-desc",
    ".description",
    ".x-item-description",
    r#"[class*="description"]"#,
    "#ds_div",
    ".d-item-description",
];

const META_DESCRIPTION: &str = r#"meta[name="description"]"#;

const MIN_NAME_CHARS: usize = 3;
const MIN_DESCRIPTION_CHARS: usize = 10;
const MAX_PRICE_CHARS: usize = 50;
const MAX_DESCRIPTION_CHARS: usize = 500;

/// Selector-cascade extractor used as the fallback strategy
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    name_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    description_selectors: Vec<Selector>,
    meta_description: Vec<Selector>,
    cents: Regex,
}

impl HeuristicExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            name_selectors: compile(NAME_SELECTORS),
            price_selectors: compile(PRICE_SELECTORS),
            description_selectors: compile(DESCRIPTION_SELECTORS),
            meta_description: compile(&[META_DESCRIPTION]),
            cents: Regex::new(r"\d+\.\d{2}")?,
        })
    }

    /// Extracts all three fields; never fails
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_harvest::crawler::{ExtractedBy, HeuristicExtractor};
    ///
    /// let extractor = HeuristicExtractor::new().unwrap();
    /// let fields = extractor.extract_fields(
    ///     r#"<h1 class="x-item-title">Nike Air Max 90</h1><span class="price">US $99.99</span>"#,
    /// );
    ///
    /// assert_eq!(fields.name, "Nike Air Max 90");
    /// assert_eq!(fields.price, "US $99.99");
    /// assert_eq!(fields.description, "-");
    /// assert_eq!(fields.extracted_by, ExtractedBy::Heuristic);
    /// ```
    pub fn extract_fields(&self, html: &str) -> ExtractedFields {
        let document = Html::parse_document(html);

        let name = first_match(&document, &self.name_selectors, accept_name);
        let price = first_match(&document, &self.price_selectors, |text| self.accept_price(text));
        let description = first_match(&document, &self.description_selectors, accept_description)
            .or_else(|| self.meta_description(&document));

        ExtractedFields {
            name: name.unwrap_or_else(|| SENTINEL.to_string()),
            price: price.unwrap_or_else(|| SENTINEL.to_string()),
            description: description.unwrap_or_else(|| SENTINEL.to_string()),
            extracted_by: ExtractedBy::Heuristic,
            error: None,
        }
    }

    /// Price text must carry a currency marker or a cents amount
    fn accept_price(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if text.contains('$') || text.contains("USD") || self.cents.is_match(text) {
            Some(truncate_chars(&collapse_whitespace(text), MAX_PRICE_CHARS))
        } else {
            None
        }
    }

    fn meta_description(&self, document: &Html) -> Option<String> {
        let selector = self.meta_description.first()?;
        let content = document
            .select(selector)
            .next()?
            .value()
            .attr("content")?
            .trim();

        if content.chars().count() > MIN_DESCRIPTION_CHARS {
            Some(truncate_chars(content, MAX_DESCRIPTION_CHARS).trim_end().to_string())
        } else {
            None
        }
    }
}

#[async_trait]
impl FieldExtractor for HeuristicExtractor {
    async fn extract(&self, html: &str) -> Result<ExtractedFields, ExtractionError> {
        Ok(self.extract_fields(html))
    }
}

fn accept_name(text: &str) -> Option<String> {
    let name = collapse_whitespace(text);
    if name.chars().count() > MIN_NAME_CHARS && name != SENTINEL {
        Some(name)
    } else {
        None
    }
}

fn accept_description(text: &str) -> Option<String> {
    let text = text.trim();
    if text.chars().count() > MIN_DESCRIPTION_CHARS {
        let capped = truncate_chars(&collapse_whitespace(text), MAX_DESCRIPTION_CHARS);
        Some(capped.trim_end().to_string())
    } else {
        None
    }
}

/// Tests the first element of each selector in order
fn first_match<F>(document: &Html, selectors: &[Selector], accept: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    selectors.iter().find_map(|selector| {
        let element = document.select(selector).next()?;
        let text = element.text().collect::<String>();
        accept(&text)
    })
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Skipping invalid field selector '{}': {:?}", s, e);
                None
            }
        })
        .collect()
}
