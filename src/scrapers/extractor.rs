use crate::config::ExtractorSettings;
use crate::models::{ExtractionResult, SelectorCandidate, Status, Target, UNKNOWN_PRICE};
use crate::scrapers::traits::PageRenderer;
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of trying one selector candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Matched(String),
    /// Why the candidate was skipped, for the operator log
    Missed(String),
}

/// Keep only ASCII digits: `"1.234.567đ"` -> `"1234567"`.
pub fn normalize_price(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A normalized price is usable when it has digits and is not all zeros.
///
/// A genuinely free item is rejected too; zero cannot be told apart from a
/// placeholder element here.
pub fn is_plausible_price(digits: &str) -> bool {
    !digits.is_empty() && digits.bytes().any(|b| b != b'0')
}

/// Visits targets one by one and resolves a price with ordered selector fallback
pub struct PriceExtractor<R> {
    renderer: R,
    selector_timeout: Duration,
    source_label: String,
    now: fn() -> DateTime<Local>,
}

impl<R: PageRenderer> PriceExtractor<R> {
    pub fn new(renderer: R, settings: &ExtractorSettings, source_label: impl Into<String>) -> Self {
        Self {
            renderer,
            selector_timeout: settings.selector_timeout,
            source_label: source_label.into(),
            now: Local::now,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, now: fn() -> DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// One result per target, in input order. Never fails.
    pub async fn extract(&self, targets: &[Target]) -> Vec<ExtractionResult> {
        info!(
            "Checking {} targets for {} with {}",
            targets.len(),
            self.source_label,
            self.renderer.renderer_name()
        );

        let mut results = Vec::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            let result = self.extract_one(target).await;
            info!(
                "[{}/{}] {} -> {} ({})",
                idx + 1,
                targets.len(),
                target.name,
                result.price,
                result.status
            );
            results.push(result);
        }
        results
    }

    /// Process a single target; the timestamp is taken before navigation
    pub async fn extract_one(&self, target: &Target) -> ExtractionResult {
        let started_at = (self.now)();
        let (price, status) = self.resolve(target).await;
        ExtractionResult::new(started_at, &self.source_label, target, price, status)
    }

    async fn resolve(&self, target: &Target) -> (String, Status) {
        if let Err(e) = self.renderer.navigate(&target.url).await {
            warn!("Failed to load {} ({}): {:#}", target.name, target.url, e);
            return (UNKNOWN_PRICE.to_string(), Status::ErrLoad);
        }

        if target.candidates.is_empty() {
            warn!("No selectors configured for {}", target.name);
            return (UNKNOWN_PRICE.to_string(), Status::NoSelector);
        }

        for (idx, candidate) in target.candidates.iter().enumerate() {
            match self.try_candidate(candidate).await {
                Attempt::Matched(price) => {
                    debug!(
                        "{}: selector #{} ({} '{}') matched",
                        target.name,
                        idx + 1,
                        candidate.kind,
                        candidate.selector
                    );
                    return (price, Status::Ok);
                }
                Attempt::Missed(reason) => {
                    info!(
                        "{}: selector #{} ({} '{}') missed: {}",
                        target.name,
                        idx + 1,
                        candidate.kind,
                        candidate.selector,
                        reason
                    );
                }
            }
        }

        let tried: Vec<&str> = target
            .candidates
            .iter()
            .map(|c| c.selector.as_str())
            .collect();
        warn!(
            "All {} selectors missed for {} (tried: {})",
            tried.len(),
            target.name,
            tried.join(" | ")
        );
        (UNKNOWN_PRICE.to_string(), Status::Fail)
    }

    async fn try_candidate(&self, candidate: &SelectorCandidate) -> Attempt {
        let text = match self
            .renderer
            .visible_text(candidate, self.selector_timeout)
            .await
        {
            Ok(Some(text)) => text,
            Ok(None) => {
                return Attempt::Missed(format!(
                    "no element within {:.1}s",
                    self.selector_timeout.as_secs_f64()
                ))
            }
            Err(e) => return Attempt::Missed(format!("query failed: {e:#}")),
        };

        let digits = normalize_price(&text);
        if is_plausible_price(&digits) {
            Attempt::Matched(digits)
        } else {
            Attempt::Missed(format!("text {:?} has no non-zero price", text.trim()))
        }
    }
}
