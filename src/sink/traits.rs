use crate::error::SheetError;
use async_trait::async_trait;
use std::sync::Arc;

/// An opened spreadsheet and the tab titles it had when opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    pub table_id: String,
    pub subtables: Vec<String>,
}

/// A tab rows can be appended to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtableHandle {
    pub table_id: String,
    pub title: String,
}

/// Append-only remote table the sink writer persists batches into
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn open_table(&self, table_id: &str) -> Result<TableHandle, SheetError>;

    /// Return the tab called `name`, creating it with `header` as its first row
    /// when missing. Losing a creation race to another writer is not an error,
    /// and the header is written only by whoever actually created the tab.
    async fn get_or_create_subtable(
        &self,
        table: &TableHandle,
        name: &str,
        header: &[&str],
    ) -> Result<SubtableHandle, SheetError>;

    /// Append `rows` after the last row of the tab, as one contiguous block
    async fn append_rows(
        &self,
        subtable: &SubtableHandle,
        rows: &[Vec<String>],
    ) -> Result<(), SheetError>;
}

#[async_trait]
impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    async fn open_table(&self, table_id: &str) -> Result<TableHandle, SheetError> {
        (**self).open_table(table_id).await
    }

    async fn get_or_create_subtable(
        &self,
        table: &TableHandle,
        name: &str,
        header: &[&str],
    ) -> Result<SubtableHandle, SheetError> {
        (**self).get_or_create_subtable(table, name, header).await
    }

    async fn append_rows(
        &self,
        subtable: &SubtableHandle,
        rows: &[Vec<String>],
    ) -> Result<(), SheetError> {
        (**self).append_rows(subtable, rows).await
    }
}
