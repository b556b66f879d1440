use crate::config::SinkSettings;
use crate::error::{SheetError, WriteError};
use crate::models::{ExtractionResult, HEADER_ROW};
use crate::sink::traits::TableStore;
use tracing::{error, info, warn};

/// Appends a whole batch to the shared sheet, retrying with random backoff.
///
/// Many independent runs may start at the same scheduled instant and hit the
/// same sheet. The pre-write jitter spreads them out; the backoff does the
/// same after a failure. Every failure is treated as transient.
pub struct SinkWriter<S> {
    store: S,
    settings: SinkSettings,
}

impl<S: TableStore> SinkWriter<S> {
    pub fn new(store: S, settings: SinkSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist `batch` in one append call. Returns the number of attempts used.
    pub async fn append(&self, batch: &[ExtractionResult]) -> Result<u32, WriteError> {
        if batch.is_empty() {
            info!("Nothing to write");
            return Ok(0);
        }

        let rows: Vec<Vec<String>> = batch.iter().map(ExtractionResult::to_row).collect();
        let max_attempts = self.settings.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            info!(
                "Write attempt {}/{}: {} rows to tab '{}'",
                attempt,
                max_attempts,
                rows.len(),
                self.settings.sheet_tab
            );

            match self.try_append(&rows).await {
                Ok(()) => {
                    info!(
                        "Saved {} rows to tab '{}' on attempt {}",
                        rows.len(),
                        self.settings.sheet_tab,
                        attempt
                    );
                    return Ok(attempt);
                }
                Err(e) if attempt >= max_attempts => {
                    error!("Write attempt {}/{} failed: {}", attempt, max_attempts, e);
                    return Err(WriteError {
                        rows: rows.len(),
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let backoff = self.settings.retry_backoff.sample();
                    warn!(
                        "Write attempt {}/{} failed: {}; retrying in {:.1}s",
                        attempt,
                        max_attempts,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One full attempt: open, ensure the tab, jitter, append
    async fn try_append(&self, rows: &[Vec<String>]) -> Result<(), SheetError> {
        let table = self.store.open_table(&self.settings.spreadsheet_id).await?;
        let subtable = self
            .store
            .get_or_create_subtable(&table, &self.settings.sheet_tab, &HEADER_ROW)
            .await?;

        let jitter = self.settings.write_jitter.sample();
        info!("Waiting {:.1}s before writing", jitter.as_secs_f64());
        tokio::time::sleep(jitter).await;

        self.store.append_rows(&subtable, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use crate::models::Status;
    use crate::sink::traits::{SubtableHandle, TableHandle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Fails the first `failures` calls of the chosen operation, then records appends
    struct FlakyStore {
        failing_op: &'static str,
        failures: u32,
        calls: AtomicU32,
        appended: Mutex<Vec<Vec<Vec<String>>>>,
        append_times: Mutex<Vec<Instant>>,
    }

    impl FlakyStore {
        fn new(failing_op: &'static str, failures: u32) -> Self {
            Self {
                failing_op,
                failures,
                calls: AtomicU32::new(0),
                appended: Mutex::new(Vec::new()),
                append_times: Mutex::new(Vec::new()),
            }
        }

        fn gate(&self, op: &str) -> Result<(), SheetError> {
            if op != self.failing_op {
                return Ok(());
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(SheetError::Api {
                    status: 503,
                    message: "The service is currently unavailable.".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TableStore for FlakyStore {
        async fn open_table(&self, table_id: &str) -> Result<TableHandle, SheetError> {
            self.gate("open")?;
            Ok(TableHandle {
                table_id: table_id.to_string(),
                subtables: vec!["Data".to_string()],
            })
        }

        async fn get_or_create_subtable(
            &self,
            table: &TableHandle,
            name: &str,
            _header: &[&str],
        ) -> Result<SubtableHandle, SheetError> {
            self.gate("subtable")?;
            Ok(SubtableHandle {
                table_id: table.table_id.clone(),
                title: name.to_string(),
            })
        }

        async fn append_rows(
            &self,
            _subtable: &SubtableHandle,
            rows: &[Vec<String>],
        ) -> Result<(), SheetError> {
            self.append_times.lock().unwrap().push(Instant::now());
            self.gate("append")?;
            self.appended.lock().unwrap().push(rows.to_vec());
            Ok(())
        }
    }

    fn settings(max_attempts: u32) -> SinkSettings {
        SinkSettings {
            max_attempts,
            write_jitter: DelayRange::zero(),
            retry_backoff: DelayRange::zero(),
            ..SinkSettings::new("sheet-1")
        }
    }

    fn timed_settings(jitter_ms: u64, backoff_ms: u64) -> SinkSettings {
        SinkSettings {
            write_jitter: DelayRange::new(jitter_ms, jitter_ms),
            retry_backoff: DelayRange::new(backoff_ms, backoff_ms),
            ..settings(5)
        }
    }

    fn row(name: &str) -> ExtractionResult {
        ExtractionResult {
            date: "01/02/2024".to_string(),
            time: "08:00:00".to_string(),
            source_label: "TGDD".to_string(),
            name: name.to_string(),
            price: "100".to_string(),
            status: Status::Ok,
            url: format!("https://shop.example/{name}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_never_touches_the_store() {
        let writer = SinkWriter::new(FlakyStore::new("open", u32::MAX), settings(3));
        assert_eq!(writer.append(&[]).await.unwrap(), 0);
        assert_eq!(writer.store().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn append_failures_then_success_writes_once() {
        let writer = SinkWriter::new(FlakyStore::new("append", 3), settings(10));
        let batch = vec![row("a"), row("b")];

        let attempts = writer.append(&batch).await.unwrap();

        assert_eq!(attempts, 4);
        let appended = writer.store().appended.lock().unwrap();
        assert_eq!(appended.len(), 1, "exactly one successful append");
        assert_eq!(appended[0].len(), 2);
        assert_eq!(appended[0][0][3], "a");
        assert_eq!(appended[0][1][3], "b");
    }

    #[tokio::test]
    async fn open_failures_are_retried_too() {
        let writer = SinkWriter::new(FlakyStore::new("open", 2), settings(5));
        assert_eq!(writer.append(&[row("a")]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn subtable_failures_are_retried_too() {
        let writer = SinkWriter::new(FlakyStore::new("subtable", 1), settings(5));
        assert_eq!(writer.append(&[row("a")]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let writer = SinkWriter::new(FlakyStore::new("append", u32::MAX), settings(4));

        let err = writer.append(&[row("a"), row("b")]).await.unwrap_err();

        assert_eq!(err.attempts, 4);
        assert_eq!(err.rows, 2);
        assert!(matches!(err.last, SheetError::Api { status: 503, .. }));
        assert_eq!(writer.store().calls.load(Ordering::SeqCst), 4);
        assert!(writer.store().appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_attempt_budget_does_not_retry() {
        let writer = SinkWriter::new(FlakyStore::new("append", 1), settings(1));
        let err = writer.append(&[row("a")]).await.unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_jitter_before_appending() {
        let writer = SinkWriter::new(FlakyStore::new("append", 0), timed_settings(3_000, 0));
        let start = Instant::now();

        writer.append(&[row("a")]).await.unwrap();

        let times = writer.store().append_times.lock().unwrap().clone();
        assert_eq!(times.len(), 1);
        assert!(times[0] - start >= Duration::from_secs(3));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_adds_backoff_before_retry() {
        let writer = SinkWriter::new(FlakyStore::new("append", 1), timed_settings(0, 5_000));
        let start = Instant::now();

        assert_eq!(writer.append(&[row("a")]).await.unwrap(), 2);

        let times = writer.store().append_times.lock().unwrap().clone();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(5));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_is_jittered_and_failures_backed_off() {
        let writer = SinkWriter::new(FlakyStore::new("append", 1), timed_settings(3_000, 5_000));
        let start = Instant::now();

        writer.append(&[row("a")]).await.unwrap();

        let times = writer.store().append_times.lock().unwrap().clone();
        assert!(times[0] - start >= Duration::from_secs(3));
        // backoff, then a fresh jitter before the second append
        assert!(times[1] - times[0] >= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn no_backoff_after_the_last_attempt() {
        let writer = SinkWriter::new(
            FlakyStore::new("append", u32::MAX),
            SinkSettings {
                max_attempts: 2,
                ..timed_settings(0, 5_000)
            },
        );
        let start = Instant::now();

        writer.append(&[row("a")]).await.unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(10));
    }
}
