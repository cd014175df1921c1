use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchMentionsParams {
    /// Company URL or domain to look up, e.g. "stripe.com".
    pub company_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MentionResult {
    pub id: String,
    pub title: String,
    pub source: String,
    pub date: String,
    pub link: String,
    pub snippet: String,
    /// One-sentence summary of the event.
    pub summary: Option<String>,
    /// Why the mention matters to a B2B founder or sales team.
    pub relevance: Option<String>,
    pub is_analyzed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Idle,
    Searching,
    Results,
    Empty,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchStateResponse {
    pub status: SearchStatus,
    /// The company URL of the latest search, absent before the first search.
    pub query: Option<String>,
    /// User-facing message for the empty and error states.
    pub message: Option<String>,
    pub results: Vec<MentionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderedMentionsResponse {
    pub text: String,
}
