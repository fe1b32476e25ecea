//! Per-session state threaded through the agent loop.

use crate::config::Target;
use crate::events::{Event, EventBus};
use crate::history::ConversationHistory;
use crate::project::{ProjectContext, ProjectRules};
use crate::tools::ToolContext;
use std::sync::Arc;

pub struct Context {
    pub session_id: String,
    pub target: Target,
    pub history: ConversationHistory,
    pub project: ProjectContext,
    pub rules: ProjectRules,
    pub tools: ToolContext,
    pub bus: Arc<EventBus>,
    /// Requests handled so far, including the one in flight
    pub request_count: u32,
}

impl Context {
    pub fn new(target: Target, tools: ToolContext, rules: ProjectRules) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            target,
            history: ConversationHistory::new(),
            project: ProjectContext::new(),
            rules,
            tools,
            bus: EventBus::new(),
            request_count: 0,
        }
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn emit(&self, event: Event) {
        self.bus.emit_sync(event);
    }
}
