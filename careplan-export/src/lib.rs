pub mod format;
pub mod query;
pub mod render;
pub mod summary;

pub use format::{export_filename, ExportFormat};
pub use query::{DateRange, ExportParams};
pub use render::{render, render_csv, render_xlsx, EXPORT_COLUMNS};
pub use summary::{CarePlanDump, DumpedCarePlan, ExportStats};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid format '{0}'. Use 'csv' or 'xlsx'")]
    InvalidFormat(String),
    #[error("Invalid {field} format. Use YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
    #[error("CSV export failed: {0}")]
    Csv(String),
    #[error("Spreadsheet export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
