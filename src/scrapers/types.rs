use crate::error::ConfigError;
use crate::models::{SelectorCandidate, SelectorKind, Target};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// One entry of a target file as written by operators.
///
/// Two shapes are accepted: the legacy `selector` + `type` pair and the newer
/// ordered `selectors` list. Both may appear on the same entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub url: String,
    /// Legacy single selector
    #[serde(default)]
    pub selector: Option<String>,
    /// Legacy selector kind, `css` (default) or `xpath`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Ordered candidates, kind inferred per entry
    #[serde(default)]
    pub selectors: Vec<String>,
}

impl TargetSpec {
    /// Normalize into a [`Target`] with an ordered candidate list
    pub fn into_target(self, index: usize) -> Result<Target, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            index,
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.url.trim().is_empty() {
            return Err(invalid("url is empty"));
        }

        let mut candidates: Vec<SelectorCandidate> = self
            .selectors
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(SelectorCandidate::auto)
            .collect();

        if let Some(legacy) = self.selector.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let kind = match self.kind.as_deref().map(str::trim) {
                None | Some("") => SelectorKind::Css,
                Some(k) if k.eq_ignore_ascii_case("css") => SelectorKind::Css,
                Some(k) if k.eq_ignore_ascii_case("xpath") => SelectorKind::XPath,
                Some(_) => return Err(invalid("type must be \"css\" or \"xpath\"")),
            };
            if !candidates.iter().any(|c| c.selector == legacy) {
                candidates.push(SelectorCandidate::new(legacy, kind));
            }
        }

        for candidate in &candidates {
            if candidate.kind == SelectorKind::Css && Selector::parse(&candidate.selector).is_err() {
                warn!(
                    "Target '{}': CSS selector '{}' does not parse, keeping it anyway",
                    self.name, candidate.selector
                );
            }
        }

        Ok(Target {
            name: self.name.trim().to_string(),
            url: self.url.trim().to_string(),
            candidates,
        })
    }
}

/// Parse a target file body
pub fn parse_targets(json: &str, path: &Path) -> Result<Vec<Target>, ConfigError> {
    let specs: Vec<TargetSpec> =
        serde_json::from_str(json).map_err(|source| ConfigError::TargetParse {
            path: path.to_path_buf(),
            source,
        })?;

    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| spec.into_target(index))
        .collect()
}

/// Read and normalize the target file at `path`
pub fn load_targets(path: &Path) -> Result<Vec<Target>, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::TargetFile {
        path: path.to_path_buf(),
        source,
    })?;
    let targets = parse_targets(&json, path)?;
    debug!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Uppercased file stem, e.g. `configs/tgdd.json` -> `TGDD`
pub fn source_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}
