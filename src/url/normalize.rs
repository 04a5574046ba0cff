use crate::UrlError;
use url::Url;

/// Query keys containing any of these markers are marketplace tracking noise
const TRACKING_MARKERS: &[&str] = &["_trk", "_trksid", "_from"];

/// Normalizes a product link found in search markup
///
/// # Normalization Steps
///
/// 1. Trim the href and resolve it against `base` (absolute hrefs pass through)
/// 2. Reject anything that is not HTTP or HTTPS, or has no host
/// 3. Remove fragment (everything after #)
/// 4. Remove tracking query parameters, keeping the order of the rest
/// 5. Remove empty query string (trailing ?)
///
/// # Arguments
///
/// * `href` - The raw href attribute value
/// * `base` - Site base used for relative hrefs
///
/// # Returns
///
/// * `Ok(Url)` - Normalized absolute URL
/// * `Err(UrlError)` - The href could not be resolved
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_product_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.ebay.com").unwrap();
/// let url = normalize_product_url("/itm/1234?_trksid=p1&hash=x", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.ebay.com/itm/1234?hash=x");
/// ```
pub fn normalize_product_url(href: &str, base: &Url) -> Result<Url, UrlError> {
    let mut url = resolve(href, base)?;

    url.set_fragment(None);

    if url.query().is_some() {
        let kept = filter_query_params(&url);

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept.iter());
        }
    }

    Ok(url)
}

/// Resolves an href to an absolute HTTP(S) URL without touching its query
pub fn resolve(href: &str, base: &Url) -> Result<Url, UrlError> {
    let href = href.trim();

    if href.is_empty() {
        return Err(UrlError::Parse("empty href".to_string()));
    }

    let url = base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Keeps non-tracking query parameters in their original order
fn filter_query_params(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    if TRACKING_MARKERS.iter().any(|marker| key.contains(marker)) {
        return true;
    }

    key.starts_with("utm_")
}
