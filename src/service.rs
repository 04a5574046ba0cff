//! Single-flight harvesting service with an in-memory product store
//!
//! [`HarvestService`] wraps a [`Coordinator`] so that at most one crawl runs
//! at a time. A second `scrape` while one is active is rejected rather than
//! queued. Products from the latest successful crawl are kept in memory under
//! fresh identifiers.

use crate::crawler::{Coordinator, CrawlResult, ProductRecord};
use crate::HarvestError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A harvested product with its store identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredProduct {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: ProductRecord,
}

/// Outcome of one `scrape` call
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    /// Stored copies of the records, with their identifiers
    pub products: Vec<StoredProduct>,
    pub crawl: CrawlResult,
}

/// Clears the running flag when dropped
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct HarvestService {
    coordinator: Coordinator,
    running: AtomicBool,
    store: RwLock<Vec<StoredProduct>>,
}

impl HarvestService {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            running: AtomicBool::new(false),
            store: RwLock::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs a crawl and replaces the stored products with its records
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeReport)` - Crawl finished (possibly cancelled or empty)
    /// * `Err(HarvestError::CrawlInProgress)` - Another crawl is active
    pub async fn scrape(
        &self,
        start_url: &str,
        max_pages: u32,
        cancel: CancellationToken,
    ) -> Result<ScrapeReport, HarvestError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(HarvestError::CrawlInProgress)?;

        let result = self
            .coordinator
            .run_crawl_with_cancellation(start_url, max_pages, cancel)
            .await;

        let report = Self::report(result);

        *self.store.write().await = report.products.clone();
        tracing::info!("Stored {} products", report.products.len());

        Ok(report)
    }

    fn report(crawl: CrawlResult) -> ScrapeReport {
        let products = crawl
            .records
            .iter()
            .cloned()
            .map(|record| StoredProduct {
                id: Uuid::new_v4(),
                record,
            })
            .collect();

        ScrapeReport { products, crawl }
    }

    pub async fn products(&self) -> Vec<StoredProduct> {
        self.store.read().await.clone()
    }

    pub async fn product(&self, id: Uuid) -> Option<StoredProduct> {
        self.store.read().await.iter().find(|p| p.id == id).cloned()
    }

    /// Removes a product, returning whether it existed
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|p| p.id != id);
        store.len() != before
    }
}
