pub mod sheets;
pub mod traits;
pub mod writer;

pub use sheets::SheetsClient;
pub use traits::{SubtableHandle, TableHandle, TableStore};
pub use writer::SinkWriter;
