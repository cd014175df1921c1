use std::str::FromStr;

use namedrop_common::gemini::GeminiClientConfig;

use crate::error::AppError;

const DEFAULT_MAX_RESULTS: usize = 6;

/// What the gateway does when the upstream call fails or returns no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Surface the failure as `SearchError::Upstream`.
    #[default]
    Propagate,
    /// Log the failure and report an empty result set.
    Mask,
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(FailurePolicy::Propagate),
            "mask" => Ok(FailurePolicy::Mask),
            other => Err(AppError::Config(format!(
                "SEARCH_FAILURE_POLICY must be \"propagate\" or \"mask\", got {other:?}"
            ))),
        }
    }
}

/// Application configuration loaded explicitly from environment variables.
///
/// The Gemini API key is optional here: without it the server still starts,
/// and every search fails with a configuration error before touching the
/// network.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiClientConfig,
    pub failure_policy: FailurePolicy,
    /// Upper bound on mentions requested in the prompt.
    pub max_results: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `GEMINI_API_KEY` / `API_KEY`, `GEMINI_BASE_URL`, `GEMINI_MODEL`,
    ///   `GEMINI_TIMEOUT_SECS`, `GEMINI_MAX_ERROR_BODY_BYTES`
    /// - `SEARCH_FAILURE_POLICY`: `propagate` (default) or `mask`
    /// - `SEARCH_MAX_RESULTS`: positive integer (default 6)
    pub fn from_env() -> Result<Self, AppError> {
        let failure_policy = match std::env::var("SEARCH_FAILURE_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => FailurePolicy::default(),
        };

        let max_results = match std::env::var("SEARCH_MAX_RESULTS") {
            Ok(raw) => parse_max_results(&raw)?,
            Err(_) => DEFAULT_MAX_RESULTS,
        };

        Ok(Self {
            gemini: GeminiClientConfig::from_env(),
            failure_policy,
            max_results,
        })
    }
}

fn parse_max_results(raw: &str) -> Result<usize, AppError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            AppError::Config(format!(
                "SEARCH_MAX_RESULTS must be a positive integer, got {raw:?}"
            ))
        })
}
