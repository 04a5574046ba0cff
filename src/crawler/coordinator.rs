//! Crawler coordinator - two-phase harvest orchestration
//!
//! This module drives a crawl from a start URL to a list of records:
//! - Discovery: walk search result pages, collecting product links
//! - Enrichment: fetch every product page and extract its fields
//! - Pacing, bounded parallelism and cancellation across both phases
//! - Containing failures so the caller always gets a result

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{PageSource, ProxyFetcher};
use crate::crawler::fields::{FallbackExtractor, FieldExtractor, HeuristicExtractor, InferenceExtractor};
use crate::crawler::links::{LinkExtractor, LinkRules};
use crate::crawler::pacing::PacingGate;
use crate::crawler::record::{
    CrawlResult, ProductRecord, CRAWL_CANCELLED, FETCH_FAILED, TASK_ABORTED,
};
use crate::url::ProductLink;
use crate::HarvestError;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Pacing and parallelism knobs for a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Pause between search page fetches
    pub page_delay: Duration,

    /// Pause between product fetches within one slot
    pub item_delay: Duration,

    /// Number of enrichment slots
    pub max_concurrent_items: usize,
}

impl CrawlSettings {
    /// No pauses, one slot
    pub fn unpaced() -> Self {
        Self {
            page_delay: Duration::ZERO,
            item_delay: Duration::ZERO,
            max_concurrent_items: 1,
        }
    }
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            page_delay: Duration::from_millis(config.page_delay_ms),
            item_delay: Duration::from_millis(config.item_delay_ms),
            max_concurrent_items: config.max_concurrent_items.max(1) as usize,
        }
    }
}

/// Product links gathered during discovery
struct Discovery {
    links: Vec<ProductLink>,
    pages_scraped: u32,
}

/// Main crawl coordinator
///
/// Cheap to clone; holds no per-crawl state, so concurrent calls are safe.
#[derive(Clone)]
pub struct Coordinator {
    source: Arc<dyn PageSource>,
    links: Arc<LinkExtractor>,
    fields: Arc<dyn FieldExtractor>,
    settings: CrawlSettings,
}

impl Coordinator {
    pub fn new(
        source: Arc<dyn PageSource>,
        links: LinkExtractor,
        fields: Arc<dyn FieldExtractor>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            source,
            links: Arc::new(links),
            fields,
            settings,
        }
    }

    /// Wires the proxy fetcher and the inference/heuristic extractors
    ///
    /// # Arguments
    ///
    /// * `config` - Validated harvester configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(HarvestError)` - An HTTP client or pattern failed to build
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let source = Arc::new(ProxyFetcher::new(&config.proxy)?);

        let base = Url::parse(&config.crawler.site_base_url)?;
        let links = LinkExtractor::new(
            base,
            LinkRules {
                cap: config.crawler.product_url_cap,
                ..LinkRules::default()
            },
        );

        let inference = InferenceExtractor::new(&config.inference)?;
        if !inference.is_configured() {
            tracing::info!("No inference credential configured, using markup heuristics only");
        }
        let fields = Arc::new(FallbackExtractor::new(
            Arc::new(inference),
            Arc::new(HeuristicExtractor::new()?),
        ));

        Ok(Self::new(
            source,
            links,
            fields,
            CrawlSettings::from(&config.crawler),
        ))
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Runs a crawl to completion
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use sumi_harvest::config::load_config;
    /// use sumi_harvest::Coordinator;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = load_config(Path::new("harvest.toml"))?;
    /// let coordinator = Coordinator::from_config(&config)?;
    /// let result = coordinator.run_crawl(&config.crawler.start_url, 2).await;
    /// println!("{} of {} products named", result.named(), result.attempted());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_crawl(&self, start_url: &str, max_pages: u32) -> CrawlResult {
        self.run_crawl_with_cancellation(start_url, max_pages, CancellationToken::new())
            .await
    }

    /// Runs a crawl that stops early once `cancel` fires
    ///
    /// Every discovered URL still gets exactly one record; URLs not reached
    /// before cancellation are recorded as degraded.
    pub async fn run_crawl_with_cancellation(
        &self,
        start_url: &str,
        max_pages: u32,
        cancel: CancellationToken,
    ) -> CrawlResult {
        let started_at = Utc::now();
        tracing::info!("Starting crawl at {} (max {} pages)", start_url, max_pages);

        let discovery = {
            let this = self.clone();
            let start_url = start_url.to_string();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.discover(start_url, max_pages, cancel).await })
        };

        let discovery = match discovery.await {
            Ok(discovery) => discovery,
            Err(e) => {
                tracing::error!("Discovery aborted unexpectedly: {}", e);
                return CrawlResult::empty(started_at);
            }
        };

        tracing::info!(
            "Discovered {} product URLs from {} pages",
            discovery.links.len(),
            discovery.pages_scraped
        );

        let records = self.enrich(discovery.links, cancel.clone()).await;

        let result = CrawlResult {
            records,
            pages_scraped: discovery.pages_scraped,
            cancelled: cancel.is_cancelled(),
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Crawl finished: {} products processed, {} named, {} failed",
            result.attempted(),
            result.named(),
            result.attempted() - result.named()
        );

        result
    }

    /// Phase 1: follow search pages until budget, failure, or last page
    async fn discover(&self, start_url: String, max_pages: u32, cancel: CancellationToken) -> Discovery {
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        let mut pages_scraped = 0;
        let mut current_url = Some(start_url);
        let mut gate = PacingGate::new(self.settings.page_delay);

        while let Some(url) = current_url.take() {
            if pages_scraped >= max_pages {
                tracing::info!("Page budget of {} reached", max_pages);
                break;
            }

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                page = async {
                    gate.wait().await;
                    self.source.fetch(&url).await
                } => Some(page),
            };
            gate.complete();

            let Some(page) = page else {
                tracing::info!("Discovery cancelled before {}", url);
                break;
            };

            tracing::info!("Search page {}: {}", pages_scraped + 1, url);

            if !page.ok {
                tracing::warn!("Could not fetch search page {}, ending discovery", url);
                break;
            }

            let extracted = self.links.extract_links(&page.html);

            let mut added = 0;
            for link in extracted.product_urls {
                if seen.insert(link.clone()) {
                    links.push(link);
                    added += 1;
                }
            }

            if added == 0 {
                tracing::warn!("No new product URLs on {}", url);
            } else {
                tracing::info!("Collected {} new product URLs", added);
            }

            pages_scraped += 1;

            match extracted.next_page_url {
                Some(next) => current_url = Some(next.to_string()),
                None => tracing::info!("No next page after {}", url),
            }
        }

        Discovery {
            links,
            pages_scraped,
        }
    }

    /// Phase 2: one record per link, in discovery order
    async fn enrich(&self, links: Vec<ProductLink>, cancel: CancellationToken) -> Vec<ProductRecord> {
        let total = links.len();
        if total == 0 {
            return Vec::new();
        }

        let queue: Arc<Mutex<VecDeque<(usize, ProductLink)>>> =
            Arc::new(Mutex::new(links.iter().cloned().enumerate().collect()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let slots = self.settings.max_concurrent_items.clamp(1, total);
        let mut workers = JoinSet::new();

        for slot in 0..slots {
            let this = self.clone();
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            let tx = tx.clone();
            workers.spawn(async move { this.run_slot(slot, total, queue, cancel, tx).await });
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Enrichment slot aborted: {}", e);
            }
        }

        let mut records: Vec<Option<ProductRecord>> = vec![None; total];
        while let Ok((index, record)) = rx.try_recv() {
            records[index] = Some(record);
        }

        records
            .into_iter()
            .zip(links)
            .map(|(record, link)| {
                record.unwrap_or_else(|| {
                    let reason = if cancel.is_cancelled() {
                        CRAWL_CANCELLED
                    } else {
                        TASK_ABORTED
                    };
                    ProductRecord::degraded(link.as_str(), reason)
                })
            })
            .collect()
    }

    /// Drains the shared queue, pacing its own requests
    async fn run_slot(
        &self,
        slot: usize,
        total: usize,
        queue: Arc<Mutex<VecDeque<(usize, ProductLink)>>>,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<(usize, ProductRecord)>,
    ) {
        let mut gate = PacingGate::new(self.settings.item_delay);

        loop {
            let next = queue.lock().await.pop_front();
            let Some((index, link)) = next else {
                break;
            };

            let record = if cancel.is_cancelled() {
                ProductRecord::degraded(link.as_str(), CRAWL_CANCELLED)
            } else {
                tracing::info!("[{}/{}] slot {} processing {}", index + 1, total, slot, link);
                self.process_item(&gate, link, &cancel).await
            };
            gate.complete();

            if tx.send((index, record)).is_err() {
                tracing::warn!("Record channel closed, slot {} stopping", slot);
                break;
            }
        }
    }

    /// Paces, then runs one product in its own task
    ///
    /// A panic while handling the product only degrades that product.
    async fn process_item(
        &self,
        gate: &PacingGate,
        link: ProductLink,
        cancel: &CancellationToken,
    ) -> ProductRecord {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return ProductRecord::degraded(link.as_str(), CRAWL_CANCELLED),
            _ = gate.wait() => {}
        }

        let mut task = {
            let this = self.clone();
            let link = link.clone();
            tokio::spawn(async move { this.enrich_one(&link).await })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                task.abort();
                ProductRecord::degraded(link.as_str(), CRAWL_CANCELLED)
            }
            joined = &mut task => match joined {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!("Processing {} aborted: {}", link, e);
                    ProductRecord::degraded(link.as_str(), TASK_ABORTED)
                }
            },
        }
    }

    /// Fetches and extracts a single product
    async fn enrich_one(&self, link: &ProductLink) -> ProductRecord {
        let page = self.source.fetch(link.as_str()).await;
        if !page.ok {
            tracing::warn!("Could not fetch product page {}", link);
            return ProductRecord::degraded(link.as_str(), FETCH_FAILED);
        }

        match self.fields.extract(&page.html).await {
            Ok(fields) => {
                tracing::info!(
                    "Extracted '{}' ({}) via {:?}",
                    fields.name,
                    fields.price,
                    fields.extracted_by
                );
                ProductRecord::from_fields(link.as_str(), fields)
            }
            Err(e) => {
                tracing::warn!("Field extraction failed for {}: {}", link, e);
                ProductRecord::degraded(link.as_str(), e.to_string())
            }
        }
    }
}
