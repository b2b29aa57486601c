//! Registries for tools and agents.
//!
//! Tool definitions are plain serializable schemas; the code that runs a
//! tool lives in a parallel handler map keyed by the same name. Agents are
//! caller identities that must be active before they may execute anything.

pub mod agents;
pub mod tools;

pub use agents::AgentRegistry;
pub use tools::{FnHandler, ToolError, ToolHandler, ToolRegistry};
