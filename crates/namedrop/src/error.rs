use namedrop_common::gemini::GeminiClientError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Gemini(#[from] GeminiClientError),

    #[error("config error: {0}")]
    Config(String),

    #[error("company URL must not be empty")]
    EmptyQuery,
}

/// Failure contract of a single mention search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// No credential configured; raised before any network attempt.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<GeminiClientError> for SearchError {
    fn from(err: GeminiClientError) -> Self {
        match err {
            GeminiClientError::MissingApiKey => SearchError::Configuration(err.to_string()),
            other => SearchError::Upstream(other.to_string()),
        }
    }
}
