use namedrop_common::mcp_api::MentionResult;

/// Substituted for any field the model did not emit.
pub const PLACEHOLDER: &str = "N/A";

/// One news mention recovered from the model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Generated at parse time; unique, not stable across parses.
    pub id: String,
    pub title: String,
    /// Source domain or publication name
    pub source: String,
    /// Relative date as written by the model, e.g. "2 hours ago"
    pub date: String,
    pub link: String,
    pub snippet: String,
    pub summary: Option<String>,
    pub relevance: Option<String>,
    /// Whether summary/relevance have been produced for this record.
    pub is_analyzed: bool,
}

impl From<SearchResult> for MentionResult {
    fn from(r: SearchResult) -> Self {
        MentionResult {
            id: r.id,
            title: r.title,
            source: r.source,
            date: r.date,
            link: r.link,
            snippet: r.snippet,
            summary: r.summary,
            relevance: r.relevance,
            is_analyzed: r.is_analyzed,
        }
    }
}
