//! Agent loop and prompt.
//!
//! - `core` - bounded request loop with hooks
//! - `prompt` - system prompt and the default hooks

pub mod core;
pub mod prompt;

pub use core::{run_loop, AgentHooks, AgentLoopConfig, CommandStats, TurnResult};
pub use prompt::SiteHooks;
