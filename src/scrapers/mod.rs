pub mod browser;
pub mod extractor;
pub mod traits;
pub mod types;

pub use browser::ChromeRenderer;
pub use extractor::{normalize_price, PriceExtractor};
pub use traits::PageRenderer;
pub use types::{load_targets, source_label, TargetSpec};
