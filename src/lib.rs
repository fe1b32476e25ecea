//! sitesmith: a terminal agent that turns requests into edits on small
//! static web projects.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod history;
pub mod llm;
pub mod metrics;
pub mod project;
pub mod repl;
pub mod session;
pub mod tool_display;
pub mod tools;
pub mod workspace;
