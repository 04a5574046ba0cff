//! Output module for crawl reports
//!
//! This module handles:
//! - Writing harvested records as JSON
//! - Summarizing crawl statistics

pub mod stats;

pub use stats::{print_statistics, CrawlStatistics};

use crate::HarvestError;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes records as a pretty-printed JSON array
///
/// # Arguments
///
/// * `records` - Crawl records or stored products
/// * `writer` - Destination for the JSON document
///
/// # Returns
///
/// * `Ok(())` - Records written
/// * `Err(HarvestError)` - Serialization or IO failed
pub fn write_records_json<T, W>(records: &[T], mut writer: W) -> Result<(), HarvestError>
where
    T: Serialize,
    W: Write,
{
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes records to a JSON file, replacing it if present
pub fn save_records_json<T: Serialize>(records: &[T], path: &Path) -> Result<(), HarvestError> {
    let file = File::create(path)?;
    write_records_json(records, BufWriter::new(file))?;
    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
