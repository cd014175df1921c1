/// Parser for the model's delimited reply format.
///
/// The reply is free text containing zero or more blocks of the form:
///
/// ```text
/// [[[
/// Title: ...
/// Source: ...
/// Date: ...
/// Link: ...
/// Snippet: ...
/// Summary: ...
/// Relevance: ...
/// ]]]
/// ```
///
/// Each field is read from a line starting with `Name:` (leading spaces or tabs
/// allowed); the value is the rest of that physical line, trimmed. Multi-line
/// values are not supported: anything after the first line break belongs to no
/// field. Fields not found resolve to [`PLACEHOLDER`]. A block whose title
/// resolves to the placeholder is dropped; the parser never fails. An opener
/// that is never closed is ignored and does not absorb the next block.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::{SearchResult, PLACEHOLDER};

pub const BLOCK_OPEN: &str = "[[[";
pub const BLOCK_CLOSE: &str = "]]]";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Source,
    Date,
    Link,
    Snippet,
    Summary,
    Relevance,
}

impl Field {
    const ALL: [Field; 7] = [
        Field::Title,
        Field::Source,
        Field::Date,
        Field::Link,
        Field::Snippet,
        Field::Summary,
        Field::Relevance,
    ];

    fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Source => "Source",
            Field::Date => "Date",
            Field::Link => "Link",
            Field::Snippet => "Snippet",
            Field::Summary => "Summary",
            Field::Relevance => "Relevance",
        }
    }
}

struct FieldExtractor {
    patterns: Vec<(Field, Regex)>,
}

impl FieldExtractor {
    fn new() -> Self {
        let patterns = Field::ALL
            .iter()
            .map(|&field| {
                let pattern = format!(r"(?m)^[ \t]*{}:(.*)$", regex::escape(field.label()));
                (field, Regex::new(&pattern).expect("valid regex"))
            })
            .collect();
        Self { patterns }
    }

    /// First occurrence of `field` in the block, or the placeholder when the
    /// line is absent or its value is blank.
    fn get(&self, block: &str, field: Field) -> String {
        self.patterns
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, re)| re.captures(block))
            .map(|caps| caps[1].trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

/// Extract every well-formed mention block from `text`, in block order.
pub fn parse_search_results(text: &str) -> Vec<SearchResult> {
    let block_re = Regex::new(r"(?s)\[\[\[(.*?)\]\]\]").expect("valid regex");
    let fields = FieldExtractor::new();

    let mut results = Vec::new();
    for (index, caps) in block_re.captures_iter(text).enumerate() {
        // An opener with no closer of its own belongs to no block; only the
        // text after the innermost opener is the candidate.
        let captured = &caps[1];
        let block = match captured.rfind(BLOCK_OPEN) {
            Some(pos) => {
                debug!(block_index = index, "discarding unterminated block opener");
                &captured[pos + BLOCK_OPEN.len()..]
            }
            None => captured,
        };

        let title = fields.get(block, Field::Title);
        if title == PLACEHOLDER {
            debug!(block_index = index, "mention block has no title, skipping");
            continue;
        }

        results.push(SearchResult {
            id: new_result_id(),
            title,
            source: fields.get(block, Field::Source),
            date: fields.get(block, Field::Date),
            link: fields.get(block, Field::Link),
            snippet: fields.get(block, Field::Snippet),
            summary: Some(fields.get(block, Field::Summary)),
            relevance: Some(fields.get(block, Field::Relevance)),
            // Summary and relevance are generated inline with the mention.
            is_analyzed: true,
        });
    }

    results
}

fn new_result_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(pid.to_le_bytes());
    h.update(counter.to_le_bytes());
    let digest = h.finalize();
    format!("gen-{}", hex_lower(&digest[..16]))
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
