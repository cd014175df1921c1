/// MCP server exposing company-mention search.
///
/// Tools:
/// - `search_mentions`: run one grounded search for a company URL
/// - `get_search_state`: current controller snapshot
/// - `render_mentions`: current snapshot rendered as Markdown cards
use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};

use namedrop_common::mcp_api::{
    MentionResult, RenderedMentionsResponse, SearchMentionsParams, SearchStateResponse,
};

use crate::controller::{SearchController, SearchState};
use crate::display::render_state;

#[derive(Clone)]
pub struct NameDropServer {
    controller: SearchController,
    tool_router: ToolRouter<NameDropServer>,
}

impl NameDropServer {
    pub fn new(controller: SearchController) -> Self {
        Self {
            controller,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_response(state: SearchState) -> SearchStateResponse {
    let status = state.status();
    let query = state.query().map(str::to_string);
    let message = state.message().map(str::to_string);
    let results = match state {
        SearchState::Results { results, .. } => {
            results.into_iter().map(MentionResult::from).collect()
        }
        _ => Vec::new(),
    };
    SearchStateResponse {
        status,
        query,
        message,
        results,
    }
}

#[tool_router]
impl NameDropServer {
    #[tool(description = "Find recent news mentions of the company behind a URL (e.g. \"stripe.com\") using Gemini with Google Search grounding. Returns up to six mentions with source, date, link, snippet, a one-line summary and why it matters for B2B outreach.")]
    async fn search_mentions(
        &self,
        Parameters(params): Parameters<SearchMentionsParams>,
    ) -> Result<Json<SearchStateResponse>, String> {
        let state = self
            .controller
            .search(&params.company_url)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(to_response(state)))
    }

    #[tool(description = "Get the state of the latest mention search (idle, searching, results, empty or error) with its results.")]
    async fn get_search_state(&self) -> Result<Json<SearchStateResponse>, String> {
        Ok(Json(to_response(self.controller.state().await)))
    }

    #[tool(description = "Render the latest mention search as Markdown cards.")]
    async fn render_mentions(&self) -> Result<Json<RenderedMentionsResponse>, String> {
        let state = self.controller.state().await;
        Ok(Json(RenderedMentionsResponse {
            text: render_state(&state),
        }))
    }
}

#[tool_handler]
impl ServerHandler for NameDropServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "namedrop".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Company mention tracker. Call search_mentions with a company URL or domain; \
one search runs at a time and a newer search supersedes an older one. Use get_search_state or \
render_mentions to read the latest outcome. An empty result may mean no recent coverage."
                    .to_string(),
            ),
        }
    }
}
