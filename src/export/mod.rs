//! Spreadsheet export: row layout, sinks and the exporter.

pub mod exporter;
pub mod row;
pub mod sheets;

pub use exporter::{Exporter, ReconcileReport, spawn_reconcile_task};
pub use row::{COLUMN_COUNT, HEADER, to_row};
pub use sheets::{ExportSink, GoogleSheetsSink, HeaderStatus};
