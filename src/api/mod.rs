// HTTP surface: browser login flow and tool calls

pub mod auth;
pub mod tools;

pub use auth::{create_auth_router, AuthAppState};
pub use tools::{create_tool_router, ToolAppState, ToolResult};
