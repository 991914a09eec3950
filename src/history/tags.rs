//! Tag inference from query text against a fixed vocabulary.
//!
//! Each vocabulary entry is a tag plus a case-insensitive, word-bounded
//! keyword pattern. All patterns are compiled once into a `RegexSet`; the set
//! reports matches by index, so tags come out in vocabulary order no matter
//! which keyword matched first or how many times.

use std::sync::LazyLock;

use regex::RegexSet;

/// Maximum number of tags attached to a record.
pub const MAX_TAGS: usize = 3;

/// Returns the controlled vocabulary as (tag, pattern) pairs, in priority order.
pub fn default_vocabulary() -> Vec<(String, String)> {
    vec![
        (
            "AI".into(),
            r"(?i)\b(ai|artificial intelligence|machine learning|deep learning|neural|llms?|gpt|nlp)\b".into(),
        ),
        (
            "Healthcare".into(),
            r"(?i)\b(health|healthcare|medical|medicine|diagnos\w*|clinical|patients?|diseases?|hospitals?)\b".into(),
        ),
        (
            "Climate".into(),
            r"(?i)\b(climate|carbon|emissions?|warming|sustainab\w*)\b".into(),
        ),
        (
            "Energy".into(),
            r"(?i)\b(energy|renewables?|solar|wind power|batter(y|ies)|nuclear|grid)\b".into(),
        ),
        (
            "Finance".into(),
            r"(?i)\b(financ\w*|bank\w*|markets?|invest\w*|crypto\w*|econom\w*)\b".into(),
        ),
        (
            "Technology".into(),
            r"(?i)\b(technolog\w*|software|computing|quantum|blockchain|robot\w*|internet)\b".into(),
        ),
        (
            "Science".into(),
            r"(?i)\b(science|scientific|physics|chemistry|biology|genetic\w*|genom\w*)\b".into(),
        ),
        (
            "Education".into(),
            r"(?i)\b(education|schools?|students?|teaching|universit(y|ies))\b".into(),
        ),
        (
            "Security".into(),
            r"(?i)\b(security|cyber\w*|privacy|encryption|threats?)\b".into(),
        ),
        (
            "Policy".into(),
            r"(?i)\b(polic(y|ies)|regulations?|laws?|government|ethic(s|al))\b".into(),
        ),
    ]
}

/// Matches query text against a vocabulary.
pub struct TagMatcher {
    patterns: RegexSet,
    tags: Vec<String>,
}

impl TagMatcher {
    /// Create a matcher from (tag, pattern) pairs. Order is priority order.
    pub fn new(vocabulary: &[(String, String)]) -> Result<Self, regex::Error> {
        let (tags, patterns): (Vec<_>, Vec<_>) = vocabulary.iter().cloned().unzip();
        Ok(Self {
            patterns: RegexSet::new(&patterns)?,
            tags,
        })
    }

    pub fn from_defaults() -> Result<Self, regex::Error> {
        Self::new(&default_vocabulary())
    }

    /// Up to [`MAX_TAGS`] matching tags, in vocabulary order.
    pub fn infer(&self, query: &str) -> Vec<String> {
        self.patterns
            .matches(query)
            .into_iter()
            .take(MAX_TAGS)
            .map(|i| self.tags[i].clone())
            .collect()
    }
}

static DEFAULT_MATCHER: LazyLock<TagMatcher> = LazyLock::new(|| {
    TagMatcher::from_defaults().expect("default tag vocabulary must compile")
});

/// Infer tags for a query using the default vocabulary.
pub fn infer_tags(query: &str) -> Vec<String> {
    DEFAULT_MATCHER.infer(query)
}
