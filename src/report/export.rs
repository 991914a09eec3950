//! Export of research results as JSON or CSV documents.
//!
//! JSON is the full-fidelity format: metadata, the complete result payload
//! and its analytics, and it deserializes back into an [`ExportDocument`].
//! CSV is a lossy sources table for spreadsheets; it carries no report text
//! or citations, and there is no CSV at all for a result without sources.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analytics::Analytics;
use crate::task::types::{ResultPayload, Source};

/// Version of the JSON export layout.
pub const FORMAT_VERSION: &str = "1.0";

pub const CSV_HEADER: &str = "Title,URL,Relevance Score,Date,Snippet";

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub query: String,
    pub exported_at: DateTime<Utc>,
    pub format_version: String,
    pub generator: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub result: ResultPayload,
    pub analytics: Analytics,
}

/// Assemble the structured export document.
pub fn build_document(
    payload: &ResultPayload,
    analytics: &Analytics,
    query: &str,
    exported_at: DateTime<Utc>,
) -> ExportDocument {
    ExportDocument {
        metadata: ExportMetadata {
            query: query.to_string(),
            exported_at,
            format_version: FORMAT_VERSION.to_string(),
            generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        },
        result: payload.clone(),
        analytics: analytics.clone(),
    }
}

/// Pretty-printed JSON export stamped with the current time.
pub fn to_json(
    payload: &ResultPayload,
    analytics: &Analytics,
    query: &str,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&build_document(payload, analytics, query, Utc::now()))
}

/// Quote a field, doubling any embedded quotes.
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Sources table as CSV, or `None` when there is nothing to export.
pub fn to_csv(sources: &[Source]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }

    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for source in sources {
        let row = [
            csv_field(&source.title),
            csv_field(&source.url),
            csv_field(&format!("{:.2}", source.relevance_score)),
            csv_field(source.date.as_deref().unwrap_or("")),
            csv_field(&source.snippet),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    Some(out)
}

/// Filesystem-safe slug of the query, at most 40 characters.
fn slugify(query: &str) -> String {
    let mut slug = String::new();
    for c in query.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "research".to_string()
    } else {
        slug.to_string()
    }
}

/// File name such as `research-ai-in-diagnostics-20260301-120000.json`.
pub fn export_filename(query: &str, format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "research-{}-{}.{}",
        slugify(query),
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// Write an export into `dir`. Returns `Ok(None)` when the format has nothing
/// to write (CSV of a result without sources).
pub fn write_export(
    dir: &Path,
    payload: &ResultPayload,
    analytics: &Analytics,
    query: &str,
    format: ExportFormat,
) -> anyhow::Result<Option<PathBuf>> {
    let now = Utc::now();
    let contents = match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(&build_document(payload, analytics, query, now))
                .context("Failed to serialize export document")?
        }
        ExportFormat::Csv => match to_csv(&payload.sources_used) {
            Some(csv) => csv,
            None => {
                tracing::info!(task_id = %payload.task_id, "No sources to export as CSV");
                return Ok(None);
            }
        },
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(export_filename(query, format, now));
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write export {}", path.display()))?;
    tracing::info!(path = %path.display(), "Exported research result");
    Ok(Some(path))
}
