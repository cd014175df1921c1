/// Search gateway: turns a company URL into mention records.
///
/// Builds the fixed prompt, asks a grounded generator for a reply, and hands
/// the reply text to the parser. The generator sits behind [`GroundedSearch`]
/// so the Gemini client can be swapped for a fake.
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use namedrop_common::gemini::{GeminiClient, GeminiClientError, GenerateContentRequest};

use crate::config::FailurePolicy;
use crate::error::SearchError;
use crate::model::SearchResult;
use crate::parser::{parse_search_results, BLOCK_CLOSE, BLOCK_OPEN};

/// Low temperature keeps repeated searches close to each other.
pub const SEARCH_TEMPERATURE: f32 = 0.2;

/// Reply of a search-grounded generation call.
#[derive(Debug, Clone, Default)]
pub struct GroundedReply {
    pub text: String,
    /// Source URIs the upstream grounded on; diagnostic only.
    pub sources: Vec<String>,
    pub search_queries: Vec<String>,
    pub finish_reason: Option<String>,
    pub total_tokens: Option<u64>,
}

pub trait GroundedSearch: Send + Sync {
    fn generate_grounded<'a>(
        &'a self,
        prompt: &'a str,
        temperature: f32,
    ) -> BoxFuture<'a, Result<GroundedReply, GeminiClientError>>;
}

impl GroundedSearch for GeminiClient {
    fn generate_grounded<'a>(
        &'a self,
        prompt: &'a str,
        temperature: f32,
    ) -> BoxFuture<'a, Result<GroundedReply, GeminiClientError>> {
        Box::pin(async move {
            let request = GenerateContentRequest::grounded_prompt(prompt, temperature);
            let response = self.generate_content(&request).await?;
            let sources = response
                .grounding_sources()
                .into_iter()
                .map(|s| s.uri)
                .collect();
            Ok(GroundedReply {
                text: response.text(),
                sources,
                search_queries: response.web_search_queries().to_vec(),
                finish_reason: response.finish_reason().map(str::to_string),
                total_tokens: response.total_tokens(),
            })
        })
    }
}

pub struct SearchGateway {
    backend: Arc<dyn GroundedSearch>,
    policy: FailurePolicy,
    max_results: usize,
}

impl SearchGateway {
    pub fn new(backend: Arc<dyn GroundedSearch>, policy: FailurePolicy, max_results: usize) -> Self {
        Self {
            backend,
            policy,
            max_results,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run one grounded search for `company_url`.
    ///
    /// A missing credential is always a `SearchError::Configuration`. Upstream
    /// failures and empty replies follow the configured [`FailurePolicy`].
    pub async fn search(&self, company_url: &str) -> Result<Vec<SearchResult>, SearchError> {
        let prompt = build_prompt(company_url, self.max_results);

        let reply = match self
            .backend
            .generate_grounded(&prompt, SEARCH_TEMPERATURE)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                let err = SearchError::from(e);
                if matches!(err, SearchError::Configuration(_)) {
                    warn!(company_url, error = %err, "search rejected: missing credential");
                    return Err(err);
                }
                return self.fail(company_url, err);
            }
        };

        debug!(
            company_url,
            sources = ?reply.sources,
            search_queries = ?reply.search_queries,
            total_tokens = ?reply.total_tokens,
            "grounding diagnostics"
        );

        if reply.text.trim().is_empty() {
            warn!(
                company_url,
                finish_reason = reply.finish_reason.as_deref().unwrap_or("unknown"),
                "upstream reply has no text"
            );
            return self.fail(
                company_url,
                SearchError::Upstream("upstream returned no text".to_string()),
            );
        }

        let results = parse_search_results(&reply.text);
        info!(company_url, results = results.len(), "search complete");
        Ok(results)
    }

    fn fail(&self, company_url: &str, err: SearchError) -> Result<Vec<SearchResult>, SearchError> {
        error!(company_url, error = %err, policy = ?self.policy, "mention search failed");
        match self.policy {
            FailurePolicy::Propagate => Err(err),
            FailurePolicy::Mask => Ok(Vec::new()),
        }
    }
}

/// The prompt doubles as the contract for the block format the parser reads.
pub fn build_prompt(company_url: &str, max_results: usize) -> String {
    format!(
        "Perform a Google Search to find {max_results} recent news articles, blog posts, or press releases \
regarding the company associated with this URL: \"{company_url}\".
Focus on the latest business developments, product launches, partnerships, or controversies.
Return at most {max_results} distinct results.

For each distinct search result, structure the output strictly as follows:

{BLOCK_OPEN}
Title: [Article Title]
Source: [Source Domain or Publication Name]
Date: [Relative date, e.g., 2 hours ago, 1 day ago]
Link: [Direct URL to the article]
Snippet: [A brief excerpt or quote from the source]
Summary: [A 1-sentence summary of the event]
Relevance: [Why this matters to a B2B founder or sales team]
{BLOCK_CLOSE}

Keep every field on a single line.
If you find fewer than {max_results}, list as many as you found.
Ensure the \"Link\" is the actual URL found in the search grounding."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use namedrop_common::gemini::{GeminiClientConfig, StatusCode};

    use super::*;

    enum Script {
        Reply(&'static str),
        MissingKey,
        Upstream,
    }

    struct FakeBackend {
        script: Script,
        calls: AtomicUsize,
        last_prompt: std::sync::Mutex<Option<String>>,
    }

    impl FakeBackend {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
                last_prompt: std::sync::Mutex::new(None),
            })
        }
    }

    impl GroundedSearch for FakeBackend {
        fn generate_grounded<'a>(
            &'a self,
            prompt: &'a str,
            temperature: f32,
        ) -> BoxFuture<'a, Result<GroundedReply, GeminiClientError>> {
            Box::pin(async move {
                assert!((temperature - SEARCH_TEMPERATURE).abs() < f32::EPSILON);
                self.calls.fetch_add(1, Ordering::SeqCst);
                *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
                match self.script {
                    Script::Reply(text) => Ok(GroundedReply {
                        text: text.to_string(),
                        sources: vec!["https://example.com/a".to_string()],
                        ..Default::default()
                    }),
                    Script::MissingKey => Err(GeminiClientError::MissingApiKey),
                    Script::Upstream => Err(GeminiClientError::Upstream {
                        status: StatusCode::SERVICE_UNAVAILABLE,
                        message: "overloaded".to_string(),
                    }),
                }
            })
        }
    }

    const TWO_BLOCKS: &str = "[[[\nTitle: A\nLink: https://a\n]]]\n[[[\nTitle: B\n]]]";

    #[test]
    fn test_prompt_embeds_url_limit_and_format() {
        let prompt = build_prompt("stripe.com", 6);
        assert!(prompt.contains("\"stripe.com\""));
        assert!(prompt.contains("at most 6 distinct"));
        assert!(prompt.contains("[[[\nTitle: "));
        assert!(prompt.contains("\n]]]"));
        for field in ["Source:", "Date:", "Link:", "Snippet:", "Summary:", "Relevance:"] {
            assert!(prompt.contains(field), "prompt should mention {field}");
        }
    }

    #[tokio::test]
    async fn test_search_parses_reply() {
        let backend = FakeBackend::new(Script::Reply(TWO_BLOCKS));
        let gateway = SearchGateway::new(backend.clone(), FailurePolicy::Propagate, 6);

        let results = gateway.search("acme.io").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "A");
        assert_eq!(results[1].title, "B");

        let prompt = backend.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("acme.io"));
    }

    #[tokio::test]
    async fn test_reply_without_blocks_is_empty_success() {
        let backend = FakeBackend::new(Script::Reply("No news found for this company."));
        let gateway = SearchGateway::new(backend, FailurePolicy::Propagate, 6);
        assert_eq!(gateway.search("acme.io").await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error_under_both_policies() {
        for policy in [FailurePolicy::Propagate, FailurePolicy::Mask] {
            let gateway = SearchGateway::new(FakeBackend::new(Script::MissingKey), policy, 6);
            let err = gateway.search("acme.io").await.unwrap_err();
            assert!(matches!(err, SearchError::Configuration(_)), "policy {policy:?}");
        }
    }

    #[tokio::test]
    async fn test_real_client_without_key_fails_before_network() {
        let client = GeminiClient::new(GeminiClientConfig {
            base_url: "http://127.0.0.1:9/v1beta".to_string(),
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            default_timeout: Duration::from_secs(1),
            max_error_body_bytes: 1024,
        })
        .unwrap();
        let gateway = SearchGateway::new(Arc::new(client), FailurePolicy::Mask, 6);

        let err = gateway.search("acme.io").await.unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let backend = FakeBackend::new(Script::Upstream);
        let gateway = SearchGateway::new(backend.clone(), FailurePolicy::Propagate, 6);

        let err = gateway.search("acme.io").await.unwrap_err();
        match err {
            SearchError::Upstream(reason) => assert!(reason.contains("overloaded")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_masked_as_empty() {
        let gateway = SearchGateway::new(FakeBackend::new(Script::Upstream), FailurePolicy::Mask, 6);
        assert_eq!(gateway.search("acme.io").await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_blank_reply_follows_policy() {
        let gateway = SearchGateway::new(FakeBackend::new(Script::Reply("  \n")), FailurePolicy::Propagate, 6);
        assert!(matches!(
            gateway.search("acme.io").await,
            Err(SearchError::Upstream(_))
        ));

        let gateway = SearchGateway::new(FakeBackend::new(Script::Reply("")), FailurePolicy::Mask, 6);
        assert_eq!(gateway.search("acme.io").await, Ok(vec![]));
    }
}
