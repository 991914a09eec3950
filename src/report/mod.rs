//! Analytics derived from research results, and their export formats.

pub mod analytics;
pub mod export;

pub use analytics::Analytics;
pub use export::{ExportDocument, ExportFormat};
