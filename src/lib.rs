pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod sink;

use crate::error::WriteError;
use crate::models::{Batch, ExtractionResult, Status, Target};
use crate::scrapers::{PageRenderer, PriceExtractor};
use crate::sink::{SinkWriter, TableStore};
use std::path::Path;
use tracing::{error, info, warn};

/// What happened to the batch after extraction
#[derive(Debug)]
pub enum SinkOutcome {
    Written { attempts: u32 },
    Failed(WriteError),
}

#[derive(Debug)]
pub struct RunReport {
    pub results: Batch,
    pub sink: SinkOutcome,
}

impl RunReport {
    /// True when the batch reached the sheet
    pub fn succeeded(&self) -> bool {
        !matches!(self.sink, SinkOutcome::Failed(_))
    }

    pub fn count(&self, status: Status) -> usize {
        count_status(&self.results, status)
    }
}

fn count_status(results: &[ExtractionResult], status: Status) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

/// Extract every target, optionally dump the batch as JSON, then append it to the sheet.
pub async fn run<R, S>(
    targets: &[Target],
    extractor: &PriceExtractor<R>,
    sink: &SinkWriter<S>,
    save_json: Option<&Path>,
) -> RunReport
where
    R: PageRenderer,
    S: TableStore,
{
    let results = extractor.extract(targets).await;

    info!(
        "Extraction finished: {} OK, {} Fail, {} ErrLoad, {} NoSelector",
        count_status(&results, Status::Ok),
        count_status(&results, Status::Fail),
        count_status(&results, Status::ErrLoad),
        count_status(&results, Status::NoSelector)
    );

    if let Some(path) = save_json {
        if let Err(e) = save_batch(&results, path).await {
            warn!("Could not save batch to {}: {:#}", path.display(), e);
        }
    }

    let outcome = match sink.append(&results).await {
        Ok(attempts) => SinkOutcome::Written { attempts },
        Err(e) => {
            error!("{}", e);
            SinkOutcome::Failed(e)
        }
    };

    RunReport {
        results,
        sink: outcome,
    }
}

async fn save_batch(batch: &Batch, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(batch)?;
    tokio::fs::write(path, json).await?;
    info!("💾 Saved {} rows to {}", batch.len(), path.display());
    Ok(())
}
