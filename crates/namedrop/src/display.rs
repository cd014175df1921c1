//! Markdown rendering of the controller state. Presentation only.

use crate::controller::SearchState;
use crate::model::SearchResult;

const IDLE_HINT: &str = "Enter a company URL (e.g. stripe.com) to start monitoring real-time mentions.";

pub fn render_state(state: &SearchState) -> String {
    match state {
        SearchState::Idle => format!("{IDLE_HINT}\n"),
        SearchState::Searching { query } => format!("Scanning mentions of \"{query}\"...\n"),
        SearchState::Empty { message, .. } => format!("> {message}\n"),
        SearchState::Error { message, .. } => format!("> **Error:** {message}\n"),
        SearchState::Results { query, results } => {
            let mut out = format!("## Mentions of \"{query}\" ({})\n", results.len());
            for result in results {
                out.push('\n');
                out.push_str(&render_card(result));
            }
            out
        }
    }
}

pub fn render_card(result: &SearchResult) -> String {
    let mut out = format!(
        "### {}\n_{} · {}_\n\n> \"{}\"\n\n",
        result.title, result.source, result.date, result.snippet
    );

    if result.is_analyzed {
        if let Some(summary) = &result.summary {
            out.push_str(&format!("**Summary:** {summary}\n"));
        }
        if let Some(relevance) = &result.relevance {
            out.push_str(&format!("**Why it matters (B2B):** {relevance}\n"));
        }
    } else {
        out.push_str("_Analyzing relevance..._\n");
    }

    out.push_str(&format!("[Read Full Article]({})\n", result.link));
    out
}
