/// Application controller: one search at a time over a single state container.
///
/// Every `begin` issues a ticket with a monotonically increasing sequence
/// number. Only the outcome carrying the latest ticket may change the state,
/// so a slow response to an older query can never overwrite a newer one.
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use namedrop_common::mcp_api::SearchStatus;

use crate::config::FailurePolicy;
use crate::error::{AppError, SearchError};
use crate::gateway::SearchGateway;
use crate::model::SearchResult;

pub const MSG_EMPTY_AMBIGUOUS: &str =
    "No recent mentions found or the search timed out. Please try again.";
pub const MSG_CONFIGURATION: &str =
    "An error occurred while searching. Please check your API key and try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Searching { query: String },
    Results { query: String, results: Vec<SearchResult> },
    Empty { query: String, message: String },
    Error { query: String, message: String },
}

impl SearchState {
    pub fn status(&self) -> SearchStatus {
        match self {
            SearchState::Idle => SearchStatus::Idle,
            SearchState::Searching { .. } => SearchStatus::Searching,
            SearchState::Results { .. } => SearchStatus::Results,
            SearchState::Empty { .. } => SearchStatus::Empty,
            SearchState::Error { .. } => SearchStatus::Error,
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            SearchState::Idle => None,
            SearchState::Searching { query }
            | SearchState::Results { query, .. }
            | SearchState::Empty { query, .. }
            | SearchState::Error { query, .. } => Some(query.as_str()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            SearchState::Empty { message, .. } | SearchState::Error { message, .. } => {
                Some(message.as_str())
            }
            _ => None,
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        match self {
            SearchState::Results { results, .. } => results.as_slice(),
            _ => &[],
        }
    }
}

/// Proof that a search was started; carries the sequence number it was
/// issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    seq: u64,
    query: String,
}

impl SearchTicket {
    pub fn query(&self) -> &str {
        &self.query
    }
}

struct Inner {
    state: SearchState,
    latest_seq: u64,
}

#[derive(Clone)]
pub struct SearchController {
    gateway: Arc<SearchGateway>,
    inner: Arc<RwLock<Inner>>,
}

impl SearchController {
    pub fn new(gateway: Arc<SearchGateway>) -> Self {
        Self {
            gateway,
            inner: Arc::new(RwLock::new(Inner {
                state: SearchState::Idle,
                latest_seq: 0,
            })),
        }
    }

    pub async fn state(&self) -> SearchState {
        self.inner.read().await.state.clone()
    }

    /// Enter `Searching` for a new query, discarding prior results and error.
    ///
    /// A query that trims to empty is rejected and leaves the state untouched.
    pub async fn begin(&self, raw_query: &str) -> Result<SearchTicket, AppError> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(AppError::EmptyQuery);
        }

        let mut inner = self.inner.write().await;
        inner.latest_seq += 1;
        inner.state = SearchState::Searching {
            query: query.to_string(),
        };
        debug!(seq = inner.latest_seq, query, "search started");

        Ok(SearchTicket {
            seq: inner.latest_seq,
            query: query.to_string(),
        })
    }

    /// Apply a gateway outcome. Returns `false` when the ticket has been
    /// superseded by a newer search; the outcome is then dropped.
    pub async fn complete(
        &self,
        ticket: &SearchTicket,
        outcome: Result<Vec<SearchResult>, SearchError>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if ticket.seq != inner.latest_seq {
            debug!(
                seq = ticket.seq,
                latest = inner.latest_seq,
                query = %ticket.query,
                "discarding stale search response"
            );
            return false;
        }

        let query = ticket.query.clone();
        inner.state = match outcome {
            Ok(results) if results.is_empty() => SearchState::Empty {
                message: self.empty_message(&query),
                query,
            },
            Ok(results) => SearchState::Results { query, results },
            Err(err) => SearchState::Error {
                message: error_message(&err),
                query,
            },
        };
        info!(
            seq = ticket.seq,
            status = ?inner.state.status(),
            results = inner.state.results().len(),
            "search settled"
        );
        true
    }

    /// Run one search end to end and return the state it leaves behind.
    ///
    /// If a newer search started meanwhile, the returned snapshot reflects
    /// that newer search rather than this one.
    pub async fn search(&self, raw_query: &str) -> Result<SearchState, AppError> {
        let ticket = self.begin(raw_query).await?;
        let outcome = self.gateway.search(ticket.query()).await;
        self.complete(&ticket, outcome).await;
        Ok(self.state().await)
    }

    fn empty_message(&self, query: &str) -> String {
        match self.gateway.policy() {
            // Under masking an empty set may also mean the search failed.
            FailurePolicy::Mask => MSG_EMPTY_AMBIGUOUS.to_string(),
            FailurePolicy::Propagate => format!("No recent mentions found for \"{query}\"."),
        }
    }
}

fn error_message(err: &SearchError) -> String {
    match err {
        SearchError::Configuration(_) => MSG_CONFIGURATION.to_string(),
        SearchError::Upstream(reason) => format!("The search failed ({reason}). Please try again."),
    }
}
