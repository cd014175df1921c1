pub mod gemini;
pub mod mcp_api;
