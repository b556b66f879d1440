//! Runtime settings, read from environment variables.
//!
//! Everything tunable lives here and is handed to the extractor, the browser
//! and the sink writer at construction. Nothing reads the environment after
//! startup.

use crate::error::ConfigError;
use rand::Rng;
use std::time::Duration;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Inclusive millisecond range a random delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// No delay at all
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Draw a delay uniformly from the range
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Parse `LOW-HIGH` (or a single number for a fixed delay)
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (low, high) = match raw.split_once('-') {
            Some((low, high)) => (low.trim(), high.trim()),
            None => (raw, raw),
        };
        let min_ms = low.parse::<u64>().map_err(|e| format!("'{low}': {e}"))?;
        let max_ms = high.parse::<u64>().map_err(|e| format!("'{high}': {e}"))?;
        if min_ms > max_ms {
            return Err(format!("lower bound {min_ms} exceeds upper bound {max_ms}"));
        }
        Ok(Self { min_ms, max_ms })
    }
}

/// Headless Chrome launch and navigation settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub user_agent: String,
    pub navigation_timeout: Duration,
    /// Pause after navigation so client-side rendering can start
    pub page_settle: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(30),
            page_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Polling budget for each selector candidate
    pub selector_timeout: Duration,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            selector_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Where rows go and how hard to try
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub spreadsheet_id: String,
    pub sheet_tab: String,
    pub max_attempts: u32,
    /// Delay before each write attempt
    pub write_jitter: DelayRange,
    /// Extra delay after a failed attempt
    pub retry_backoff: DelayRange,
}

impl SinkSettings {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_tab: "Data".to_string(),
            max_attempts: 10,
            write_jitter: DelayRange::new(1_000, 8_000),
            retry_backoff: DelayRange::new(5_000, 15_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub extractor: ExtractorSettings,
    pub sink: SinkSettings,
    pub sheets: SheetsSettings,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read the process environment without touching `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        build_settings(|key| std::env::var(key))
    }
}

/// Core parsing, decoupled from the real environment so tests can pass a map.
fn build_settings<F>(lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_range = |var: &str, default: &str| -> Result<DelayRange, ConfigError> {
        DelayRange::parse(&or_default(var, default)).map_err(|reason| invalid(var, reason))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("'{other}' is not a boolean"))),
        }
    };

    let spreadsheet_id = require("PRICE_SCOUT_SPREADSHEET_ID")?;
    let token = require("PRICE_SCOUT_SHEETS_TOKEN")?;

    let max_attempts = parse_u64("PRICE_SCOUT_WRITE_ATTEMPTS", "10")?;
    let max_attempts = u32::try_from(max_attempts)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| invalid("PRICE_SCOUT_WRITE_ATTEMPTS", "must be between 1 and u32::MAX".to_string()))?;

    let sheet_tab = or_default("PRICE_SCOUT_SHEET_TAB", "Data");
    if sheet_tab.trim().is_empty() {
        return Err(invalid("PRICE_SCOUT_SHEET_TAB", "must not be empty".to_string()));
    }

    let sink = SinkSettings {
        spreadsheet_id,
        sheet_tab,
        max_attempts,
        write_jitter: parse_range("PRICE_SCOUT_WRITE_JITTER_MS", "1000-8000")?,
        retry_backoff: parse_range("PRICE_SCOUT_RETRY_BACKOFF_MS", "5000-15000")?,
    };

    let browser = BrowserSettings {
        headless: parse_bool("PRICE_SCOUT_HEADLESS", "true")?,
        user_agent: or_default("PRICE_SCOUT_USER_AGENT", DEFAULT_USER_AGENT),
        navigation_timeout: Duration::from_secs(parse_u64(
            "PRICE_SCOUT_NAVIGATION_TIMEOUT_SECS",
            "30",
        )?),
        page_settle: Duration::from_millis(parse_u64("PRICE_SCOUT_PAGE_SETTLE_MS", "2000")?),
    };

    let extractor = ExtractorSettings {
        selector_timeout: Duration::from_millis(parse_u64(
            "PRICE_SCOUT_SELECTOR_TIMEOUT_MS",
            "5000",
        )?),
    };

    let sheets = SheetsSettings {
        base_url: or_default("PRICE_SCOUT_SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL),
        token,
    };

    Ok(Settings {
        browser,
        extractor,
        sink,
        sheets,
    })
}
