use serde::Deserialize;

/// One entry of `notmuch search --format=json --output=summary`.
/// Only the date fields feed verification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThreadSummary {
    pub thread: String,
    pub timestamp: Option<i64>,
    pub date_relative: Option<String>,
    pub matched: i64,
    pub total: i64,
    pub authors: String,
    pub subject: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    OldestFirst,
    NewestFirst,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::OldestFirst => "oldest-first",
            SortOrder::NewestFirst => "newest-first",
        }
    }
}
