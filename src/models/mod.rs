use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column titles written once when the sheet tab is created
pub const HEADER_ROW: [&str; 7] = ["Date", "Time", "Source", "Product", "Price", "Status", "URL"];

/// Price written when no candidate produced a usable value
pub const UNKNOWN_PRICE: &str = "0";

/// How a selector candidate is resolved against the page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    XPath,
}

impl SelectorKind {
    /// Anything starting with `/`, `(` or `..` is XPath, the rest is CSS.
    pub fn classify(selector: &str) -> Self {
        if selector.starts_with('/') || selector.starts_with('(') || selector.starts_with("..") {
            SelectorKind::XPath
        } else {
            SelectorKind::Css
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Css => f.write_str("css"),
            SelectorKind::XPath => f.write_str("xpath"),
        }
    }
}

/// One locator believed to point at the price element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorCandidate {
    pub selector: String,
    pub kind: SelectorKind,
}

impl SelectorCandidate {
    pub fn new(selector: impl Into<String>, kind: SelectorKind) -> Self {
        Self {
            selector: selector.into(),
            kind,
        }
    }

    /// Build a candidate whose kind is inferred from the selector text
    pub fn auto(selector: impl Into<String>) -> Self {
        let selector = selector.into();
        let kind = SelectorKind::classify(&selector);
        Self { selector, kind }
    }
}

/// A product page to check, with its ordered selector fallbacks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub url: String,
    pub candidates: Vec<SelectorCandidate>,
}

/// Outcome of processing one target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    Fail,
    ErrLoad,
    NoSelector,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Fail => "Fail",
            Status::ErrLoad => "ErrLoad",
            Status::NoSelector => "NoSelector",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output row. Produced for every target, whatever happened to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResult {
    /// `DD/MM/YYYY`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    pub source_label: String,
    pub name: String,
    /// Digits only, `"0"` when unknown
    pub price: String,
    pub status: Status,
    pub url: String,
}

impl ExtractionResult {
    pub fn new(
        started_at: DateTime<Local>,
        source_label: &str,
        target: &Target,
        price: String,
        status: Status,
    ) -> Self {
        Self {
            date: started_at.format("%d/%m/%Y").to_string(),
            time: started_at.format("%H:%M:%S").to_string(),
            source_label: source_label.to_string(),
            name: target.name.clone(),
            price,
            status,
            url: target.url.clone(),
        }
    }

    /// Row cells in sheet column order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.source_label.clone(),
            self.name.clone(),
            self.price.clone(),
            self.status.as_str().to_string(),
            self.url.clone(),
        ]
    }
}

/// All results of one run, appended to the sheet in a single call
pub type Batch = Vec<ExtractionResult>;
