//! Derived metrics over a completed research result.
//!
//! Every function here is pure and total: empty input yields zero-valued
//! output, never a panic. The same figures feed both the results view and the
//! export documents, so they are computed in exactly one place.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::task::types::{Citation, ResultPayload, Source};

pub const HIGH_QUALITY_THRESHOLD: f64 = 0.8;
pub const MEDIUM_QUALITY_THRESHOLD: f64 = 0.5;

/// Clamp a score into [0, 1], mapping NaN to 0.
fn clamp_score(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// Mean relevance as a whole percentage; 0 when there are no sources.
pub fn average_relevance(sources: &[Source]) -> u32 {
    if sources.is_empty() {
        return 0;
    }
    let sum: f64 = sources.iter().map(|s| clamp_score(s.relevance_score)).sum();
    let mean = sum / sources.len() as f64;
    (mean * 100.0).round() as u32
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl QualityDistribution {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Partition sources by relevance. The three counts always sum to
/// `sources.len()`.
pub fn quality_distribution(sources: &[Source]) -> QualityDistribution {
    sources
        .iter()
        .fold(QualityDistribution::default(), |mut dist, source| {
            let score = clamp_score(source.relevance_score);
            if score >= HIGH_QUALITY_THRESHOLD {
                dist.high += 1;
            } else if score >= MEDIUM_QUALITY_THRESHOLD {
                dist.medium += 1;
            } else {
                dist.low += 1;
            }
            dist
        })
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationStats {
    pub total: usize,
    /// Distinct citations, keyed by URL, or by title when the URL is blank.
    pub unique: usize,
    /// The citation cited most often; `None` if nothing was cited at all.
    pub most_cited: Option<Citation>,
}

pub fn citation_stats(citations: &[Citation]) -> CitationStats {
    let unique = citations
        .iter()
        .map(|c| {
            let url = c.url.trim();
            if url.is_empty() { c.title.trim() } else { url }
        })
        .collect::<HashSet<_>>()
        .len();

    // Earliest citation wins a tie.
    let most_cited = citations
        .iter()
        .filter(|c| c.times_cited > 0)
        .fold(None::<&Citation>, |best, c| match best {
            Some(b) if b.times_cited >= c.times_cited => Some(b),
            _ => Some(c),
        })
        .cloned();

    CitationStats {
        total: citations.len(),
        unique,
        most_cited,
    }
}

/// Format a count with a k/M suffix from 1,000 / 1,000,000 upwards.
pub fn format_count(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Character count of the report, formatted for display.
pub fn report_length(report: &str) -> String {
    format_count(report.chars().count())
}

/// Rounded to whole seconds and shown as `1h 2m 3s`, `2m 34s` or `42s`.
/// Negative or non-finite input reads as `0s`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }
    let whole = seconds.round() as u64;
    let (h, rest) = (whole / 3600, whole % 3600);
    let (m, s) = (rest / 60, rest % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s}s"),
        _ => format!("{h}h {m}m {s}s"),
    }
}

/// All derived figures for one result, as shown and exported.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub average_relevance: u32,
    pub quality: QualityDistribution,
    pub citations: CitationStats,
    pub source_count: usize,
    pub report_characters: usize,
    pub report_length: String,
    pub total_tokens: u64,
    pub execution_time_seconds: f64,
    pub execution_time: String,
    pub agent_count: u32,
}

impl Analytics {
    pub fn from_payload(payload: &ResultPayload) -> Self {
        Self {
            average_relevance: average_relevance(&payload.sources_used),
            quality: quality_distribution(&payload.sources_used),
            citations: citation_stats(&payload.citations),
            source_count: payload.sources_used.len(),
            report_characters: payload.report.chars().count(),
            report_length: report_length(&payload.report),
            total_tokens: payload.total_tokens_used,
            execution_time_seconds: payload.execution_time_seconds,
            execution_time: format_duration(payload.execution_time_seconds),
            agent_count: payload.agent_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(score: f64) -> Source {
        Source {
            title: format!("Source {score}"),
            url: format!("https://example.org/{score}"),
            snippet: String::new(),
            relevance_score: score,
            date: None,
        }
    }

    fn citation(index: u32, title: &str, url: &str, times: u32) -> Citation {
        Citation {
            index,
            title: title.to_string(),
            url: url.to_string(),
            times_cited: times,
        }
    }

    #[test]
    fn average_relevance_of_two_sources() {
        assert_eq!(average_relevance(&[source(0.9), source(0.5)]), 70);
    }

    #[test]
    fn average_relevance_empty_is_zero() {
        assert_eq!(average_relevance(&[]), 0);
    }

    #[test]
    fn average_relevance_ignores_out_of_range_scores() {
        assert_eq!(average_relevance(&[source(1.7), source(f64::NAN)]), 50);
    }

    #[test]
    fn quality_buckets_use_inclusive_lower_bounds() {
        let dist = quality_distribution(&[
            source(0.8),
            source(0.95),
            source(0.5),
            source(0.79),
            source(0.49),
            source(0.0),
        ]);
        assert_eq!(dist, QualityDistribution { high: 2, medium: 2, low: 2 });
    }

    #[test]
    fn quality_counts_sum_to_source_count() {
        for n in 0..20 {
            let sources: Vec<Source> = (0..n).map(|i| source(i as f64 / 19.0)).collect();
            assert_eq!(quality_distribution(&sources).total(), sources.len());
        }
    }

    #[test]
    fn citation_stats_counts_unique_keys() {
        let stats = citation_stats(&[
            citation(1, "A", "https://a.example", 2),
            citation(2, "A again", "https://a.example", 1),
            citation(3, "No URL", "", 0),
            citation(4, "No URL", "  ", 0),
        ]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.unique, 2);
        assert_eq!(stats.most_cited.map(|c| c.index), Some(1));
    }

    #[test]
    fn most_cited_is_none_when_all_zero() {
        let stats = citation_stats(&[citation(1, "A", "u", 0), citation(2, "B", "v", 0)]);
        assert!(stats.most_cited.is_none());
    }

    #[test]
    fn most_cited_tie_keeps_earliest() {
        let stats = citation_stats(&[
            citation(1, "A", "u", 3),
            citation(2, "B", "v", 5),
            citation(3, "C", "w", 5),
        ]);
        assert_eq!(stats.most_cited.map(|c| c.index), Some(2));
    }

    #[test]
    fn citation_stats_empty() {
        assert_eq!(citation_stats(&[]), CitationStats::default());
    }

    #[test]
    fn report_length_suffixes() {
        assert_eq!(report_length(""), "0");
        assert_eq!(report_length(&"x".repeat(999)), "999");
        assert_eq!(report_length(&"x".repeat(1_000)), "1.0k");
        assert_eq!(report_length(&"x".repeat(12_345)), "12.3k");
        assert_eq!(format_count(2_500_000), "2.5M");
    }

    #[test]
    fn report_length_counts_characters_not_bytes() {
        assert_eq!(report_length("héllo"), "5");
    }

    #[test]
    fn format_duration_rounds_into_next_unit() {
        assert_eq!(format_duration(3599.6), "1h 0m 0s");
        assert_eq!(format_duration(59.5), "1m 0s");
    }

    #[test]
    fn format_duration_drops_fractions() {
        assert_eq!(format_duration(7322.2), "2h 2m 2s");
        assert_eq!(format_duration(0.4), "0s");
    }

    #[test]
    fn format_duration_non_positive_or_non_finite_is_zero() {
        assert_eq!(format_duration(-90.0), "0s");
        assert_eq!(format_duration(f64::NAN), "0s");
        assert_eq!(format_duration(f64::INFINITY), "0s");
    }

    #[test]
    fn analytics_from_empty_payload() {
        let payload: ResultPayload = serde_json::from_str(
            r#"{"task_id":"t","created_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let analytics = Analytics::from_payload(&payload);
        assert_eq!(analytics.average_relevance, 0);
        assert_eq!(analytics.quality.total(), 0);
        assert_eq!(analytics.citations.total, 0);
        assert_eq!(analytics.report_length, "0");
        assert_eq!(analytics.execution_time, "0s");
    }
}
