//! Search results parser for product and pagination links
//!
//! Marketplace markup drifts, so both product discovery and next-page
//! discovery walk an ordered list of selectors and stop at the first one
//! that produces something usable. Product strategies are never merged.

use crate::url::{resolve, ProductLink};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Product link strategies, most specific site layout last
pub const PRODUCT_SELECTORS: &[&str] = &[
    r#"a[href*="/itm/"]"#,
    ".s-item__wrapper > .s-item__link",
    ".s-item__info > a",
    ".srp-results .s-item a",
];

/// Next-page strategies in priority order
pub const NEXT_PAGE_SELECTORS: &[&str] = &[
    "a.pagination__next",
    r#"a[rel="next"]"#,
    ".pagination .pagination__next",
    ".srp-river-answer .pagination__next",
    r#"a[aria-label*="Next"]"#,
    r#"a[class*="next"]"#,
    ".pagination__next",
];

/// Substrings marking placeholder, sponsored or fabricated listings
pub const PLACEHOLDER_PATTERNS: &[&str] = &[
    "ebay.com/itm/123456",
    "ebay.com/itm/0",
    "sig=",
    "fake",
    "example",
];

/// Every product detail href contains this path segment
pub const PRODUCT_PATH_MARKER: &str = "/itm/";

/// Data-driven rules for link discovery
#[derive(Debug, Clone)]
pub struct LinkRules {
    pub product_selectors: Vec<String>,
    pub next_page_selectors: Vec<String>,
    pub placeholder_patterns: Vec<String>,
    pub product_path_marker: String,
    /// Maximum product links kept from one page
    pub cap: usize,
}

impl Default for LinkRules {
    fn default() -> Self {
        Self {
            product_selectors: to_owned(PRODUCT_SELECTORS),
            next_page_selectors: to_owned(NEXT_PAGE_SELECTORS),
            placeholder_patterns: to_owned(PLACEHOLDER_PATTERNS),
            product_path_marker: PRODUCT_PATH_MARKER.to_string(),
            cap: 15,
        }
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Links discovered on one search results page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// De-duplicated product links in document order
    pub product_urls: Vec<ProductLink>,

    /// Absolute URL of the next results page, if any
    pub next_page_url: Option<Url>,
}

/// Extracts product and pagination links from search results markup
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    base: Url,
    product_selectors: Vec<Selector>,
    next_page_selectors: Vec<Selector>,
    placeholder_patterns: Vec<String>,
    product_path_marker: String,
    cap: usize,
}

impl LinkExtractor {
    /// Creates an extractor resolving relative links against `base`
    ///
    /// Selectors that fail to parse are skipped with a warning.
    pub fn new(base: Url, rules: LinkRules) -> Self {
        Self {
            base,
            product_selectors: compile(&rules.product_selectors),
            next_page_selectors: compile(&rules.next_page_selectors),
            placeholder_patterns: rules.placeholder_patterns,
            product_path_marker: rules.product_path_marker,
            cap: rules.cap,
        }
    }

    /// Extracts product links and the next-page link
    ///
    /// Never fails: unusable markup simply yields an empty result.
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_harvest::crawler::{LinkExtractor, LinkRules};
    /// use url::Url;
    ///
    /// let extractor = LinkExtractor::new(
    ///     Url::parse("https://www.ebay.com").unwrap(),
    ///     LinkRules::default(),
    /// );
    /// let html = r#"<a href="/itm/1">One</a><a rel="next" href="/sch/i.html?_pgn=2">Next</a>"#;
    /// let links = extractor.extract_links(html);
    ///
    /// assert_eq!(links.product_urls.len(), 1);
    /// assert_eq!(
    ///     links.next_page_url.unwrap().as_str(),
    ///     "https://www.ebay.com/sch/i.html?_pgn=2"
    /// );
    /// ```
    pub fn extract_links(&self, html: &str) -> ExtractedLinks {
        let document = Html::parse_document(html);

        let product_urls = self.product_links(&document);
        let next_page_url = self.next_page(&document);

        tracing::debug!(
            "Found {} product links, next page: {}",
            product_urls.len(),
            next_page_url
                .as_ref()
                .map(Url::as_str)
                .unwrap_or("none")
        );

        ExtractedLinks {
            product_urls,
            next_page_url,
        }
    }

    /// Runs product strategies until one yields at least one link
    fn product_links(&self, document: &Html) -> Vec<ProductLink> {
        for (index, selector) in self.product_selectors.iter().enumerate() {
            let links = self.collect_products(document, selector);
            if !links.is_empty() {
                tracing::trace!("Product strategy {} matched {} links", index, links.len());
                return links;
            }
        }

        Vec::new()
    }

    fn collect_products(&self, document: &Html, selector: &Selector) -> Vec<ProductLink> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(selector) {
            if links.len() >= self.cap {
                break;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };

            if !href.contains(&self.product_path_marker) {
                continue;
            }

            let Ok(absolute) = resolve(href, &self.base) else {
                continue;
            };

            if self.is_placeholder(absolute.as_str()) {
                continue;
            }

            let Ok(link) = ProductLink::parse(href, &self.base) else {
                continue;
            };

            if seen.insert(link.clone()) {
                links.push(link);
            }
        }

        links
    }

    fn is_placeholder(&self, url: &str) -> bool {
        self.placeholder_patterns
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }

    /// First next-page strategy with a resolvable href wins
    fn next_page(&self, document: &Html) -> Option<Url> {
        self.next_page_selectors.iter().find_map(|selector| {
            let element = document.select(selector).next()?;
            let href = element.value().attr("href")?;
            resolve(href, &self.base).ok()
        })
    }
}

/// Parses selector strings, dropping the ones scraper rejects
fn compile(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Skipping invalid selector '{}': {:?}", s, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> LinkExtractor {
        LinkExtractor::new(
            Url::parse("https://www.ebay.com").unwrap(),
            LinkRules::default(),
        )
    }

    fn product_anchors(ids: std::ops::Range<u32>) -> String {
        ids.map(|id| format!(r#"<a href="/itm/{}?_trksid=p{}">Item {}</a>"#, id + 100, id, id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_twelve_products_with_next_page() {
        let html = format!(
            r#"<html><body><ul class="srp-results">{}</ul>
            <a rel="next" href="/sch/i.html?_nkw=nike&_pgn=2">Next</a></body></html>"#,
            product_anchors(1..13)
        );

        let links = extractor().extract_links(&html);

        assert_eq!(links.product_urls.len(), 12);
        assert_eq!(
            links.product_urls[0].as_str(),
            "https://www.ebay.com/itm/101"
        );
        assert_eq!(
            links.product_urls[11].as_str(),
            "https://www.ebay.com/itm/112"
        );
        assert_eq!(
            links.next_page_url.unwrap().as_str(),
            "https://www.ebay.com/sch/i.html?_nkw=nike&_pgn=2"
        );
    }

    #[test]
    fn test_duplicates_removed_after_normalization() {
        let html = r#"
            <a href="/itm/5?_trksid=a">A</a>
            <a href="https://www.ebay.com/itm/5?_trksid=b">A again</a>
            <a href="/itm/6">B</a>
        "#;

        let links = extractor().extract_links(html);
        let urls: Vec<&str> = links.product_urls.iter().map(|l| l.as_str()).collect();

        assert_eq!(
            urls,
            vec!["https://www.ebay.com/itm/5", "https://www.ebay.com/itm/6"]
        );
    }

    #[test]
    fn test_cap_limits_product_count() {
        let html = product_anchors(1..40);
        let links = extractor().extract_links(&html);
        assert_eq!(links.product_urls.len(), 15);

        let small = LinkExtractor::new(
            Url::parse("https://www.ebay.com").unwrap(),
            LinkRules {
                cap: 3,
                ..LinkRules::default()
            },
        );
        assert_eq!(small.extract_links(&html).product_urls.len(), 3);
    }

    #[test]
    fn test_placeholder_links_rejected() {
        let html = r#"
            <a href="https://www.ebay.com/itm/123456">Placeholder</a>
            <a href="/itm/0987">Zero id</a>
            <a href="/itm/777?sig=abc">Signed</a>
            <a href="/itm/fake-listing">Fake</a>
            <a href="https://example.com/itm/1">Example</a>
            <a href="/itm/42">Real</a>
        "#;

        let links = extractor().extract_links(html);

        assert_eq!(links.product_urls.len(), 1);
        assert_eq!(links.product_urls[0].as_str(), "https://www.ebay.com/itm/42");
        for link in &links.product_urls {
            for pattern in PLACEHOLDER_PATTERNS {
                assert!(!link.as_str().contains(pattern));
            }
        }
    }

    #[test]
    fn test_non_product_links_ignored() {
        let html = r#"<a href="/b/Shoes">Category</a><a href="/help">Help</a>"#;
        let links = extractor().extract_links(html);
        assert!(links.product_urls.is_empty());
        assert!(links.next_page_url.is_none());
    }

    #[test]
    fn test_first_matching_strategy_wins() {
        let rules = LinkRules {
            product_selectors: vec![".primary a".to_string(), ".secondary a".to_string()],
            ..LinkRules::default()
        };
        let extractor = LinkExtractor::new(Url::parse("https://www.ebay.com").unwrap(), rules);

        let html = r#"
            <div class="primary"><a href="/itm/1">One</a></div>
            <div class="secondary"><a href="/itm/2">Two</a></div>
        "#;

        let links = extractor.extract_links(html);
        assert_eq!(links.product_urls.len(), 1);
        assert_eq!(links.product_urls[0].as_str(), "https://www.ebay.com/itm/1");
    }

    #[test]
    fn test_later_strategy_used_when_earlier_misses() {
        let rules = LinkRules {
            product_selectors: vec![".missing a".to_string(), ".secondary a".to_string()],
            ..LinkRules::default()
        };
        let extractor = LinkExtractor::new(Url::parse("https://www.ebay.com").unwrap(), rules);

        let html = r#"<div class="secondary"><a href="/itm/2">Two</a></div>"#;

        let links = extractor.extract_links(html);
        assert_eq!(links.product_urls.len(), 1);
        assert_eq!(links.product_urls[0].as_str(), "https://www.ebay.com/itm/2");
    }

    #[test]
    fn test_strategy_with_only_rejected_links_falls_through() {
        let rules = LinkRules {
            product_selectors: vec![".ads a".to_string(), ".results a".to_string()],
            ..LinkRules::default()
        };
        let extractor = LinkExtractor::new(Url::parse("https://www.ebay.com").unwrap(), rules);

        let html = r#"
            <div class="ads"><a href="/itm/9?sig=zz">Ad</a></div>
            <div class="results"><a href="/itm/3">Three</a></div>
        "#;

        let links = extractor.extract_links(html);
        assert_eq!(links.product_urls.len(), 1);
        assert_eq!(links.product_urls[0].as_str(), "https://www.ebay.com/itm/3");
    }

    #[test]
    fn test_next_page_priority() {
        let html = r#"
            <a rel="next" href="/sch/i.html?_pgn=3">rel next</a>
            <a class="pagination__next" href="/sch/i.html?_pgn=2">Next</a>
        "#;

        let links = extractor().extract_links(html);
        assert_eq!(
            links.next_page_url.unwrap().as_str(),
            "https://www.ebay.com/sch/i.html?_pgn=2"
        );
    }

    #[test]
    fn test_next_page_without_href_skipped() {
        let html = r#"
            <a class="pagination__next">Disabled</a>
            <a aria-label="Next page" href="https://www.ebay.com/sch/i.html?_pgn=4">Next</a>
        "#;

        let links = extractor().extract_links(html);
        assert_eq!(
            links.next_page_url.unwrap().as_str(),
            "https://www.ebay.com/sch/i.html?_pgn=4"
        );
    }

    #[test]
    fn test_empty_and_malformed_input() {
        assert_eq!(extractor().extract_links(""), ExtractedLinks::default());

        let links = extractor().extract_links("<a href=\"/itm/1\"<<<div></span>");
        assert!(links.product_urls.len() <= 1);
    }

    #[test]
    fn test_invalid_selectors_skipped() {
        let rules = LinkRules {
            product_selectors: vec!["[[[".to_string(), "a".to_string()],
            ..LinkRules::default()
        };
        let extractor = LinkExtractor::new(Url::parse("https://www.ebay.com").unwrap(), rules);

        let links = extractor.extract_links(r#"<a href="/itm/8">Eight</a>"#);
        assert_eq!(links.product_urls.len(), 1);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = format!(
            r#"{}<a class="pagination__next" href="/sch/i.html?_pgn=2">Next</a>"#,
            product_anchors(1..8)
        );

        let extractor = extractor();
        let first = extractor.extract_links(&html);
        let second = extractor.extract_links(&html);

        assert_eq!(first, second);
    }
}
