//! URL handling module for Sumi-Harvest
//!
//! This module provides product link normalization and the `ProductLink`
//! value type used to de-duplicate discovered products.

mod normalize;

use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

// Re-export main functions
pub use normalize::{normalize_product_url, resolve};

/// A normalized absolute product URL
///
/// Two links are the same product when their normalized strings match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductLink(Url);

impl ProductLink {
    /// Normalizes `href` against `base` and wraps the result
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_harvest::url::ProductLink;
    /// use url::Url;
    ///
    /// let base = Url::parse("https://www.ebay.com").unwrap();
    /// let link = ProductLink::parse("/itm/42?_trksid=abc", &base).unwrap();
    /// assert_eq!(link.as_str(), "https://www.ebay.com/itm/42");
    /// ```
    pub fn parse(href: &str, base: &Url) -> crate::UrlResult<Self> {
        normalize_product_url(href, base).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for ProductLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<ProductLink> for Url {
    fn from(link: ProductLink) -> Self {
        link.0
    }
}

impl Serialize for ProductLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}
