//! Typed event stream for the agent loop.
//!
//! Events are structured and serializable so listeners can log them,
//! render them, or ship them elsewhere.
//!
//! ## Event Categories
//!
//! - **Session**: session start and end
//! - **Run**: one user request through the agent loop
//! - **Model**: model calls (usage, errors)
//! - **Tool**: tool invocation and results
//! - **Project**: active project changes
//!
//! ## Usage
//!
//! ```ignore
//! use sitesmith::events::{EventBus, Event};
//!
//! let bus = EventBus::new();
//! bus.subscribe(|event| {
//!     println!("[{}] {:?}", event.subsystem, event.event_type);
//! });
//! bus.emit_sync(Event::project_changed("s1", None, "counter-app"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonically increasing sequence counter for event ordering
static EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    EVENT_SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Session,
    Run,
    Model,
    Tool,
    Project,
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Subsystem::Session => "session",
            Subsystem::Run => "run",
            Subsystem::Model => "model",
            Subsystem::Tool => "tool",
            Subsystem::Project => "project",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    // Session events
    SessionCreated {
        session_id: String,
        workspace: String,
    },
    SessionEnded {
        session_id: String,
        total_requests: u32,
    },

    // Run events
    RunAttempt {
        session_id: String,
        request_number: u32,
        iteration: u32,
    },
    RunComplete {
        session_id: String,
        request_number: u32,
        iterations: u32,
        tool_uses: u32,
        tokens_used: u64,
    },
    RunBudgetExceeded {
        session_id: String,
        request_number: u32,
        max_iterations: u32,
    },

    // Model events
    ModelUsage {
        backend: String,
        model: String,
        input_tokens: u64,
        output_tokens: u64,
        duration_ms: u64,
    },
    ModelError {
        backend: String,
        model: String,
        error_message: String,
    },

    // Tool events
    ToolInvoked {
        session_id: String,
        tool_name: String,
        tool_call_id: String,
        args_preview: String,
    },
    ToolCompleted {
        session_id: String,
        tool_name: String,
        tool_call_id: String,
        success: bool,
        duration_ms: u64,
    },

    // Project events
    ProjectChanged {
        session_id: String,
        previous: Option<String>,
        current: String,
    },
}

/// A single event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number for ordering
    pub seq: u64,
    /// Timestamp in milliseconds since epoch
    pub timestamp_ms: u64,
    pub subsystem: Subsystem,
    #[serde(flatten)]
    pub event_type: EventType,
}

impl Event {
    pub fn new(subsystem: Subsystem, event_type: EventType) -> Self {
        Self {
            seq: next_sequence(),
            timestamp_ms: timestamp_ms(),
            subsystem,
            event_type,
        }
    }

    pub fn session_created(session_id: &str, workspace: &str) -> Self {
        Self::new(
            Subsystem::Session,
            EventType::SessionCreated {
                session_id: session_id.to_string(),
                workspace: workspace.to_string(),
            },
        )
    }

    pub fn session_ended(session_id: &str, total_requests: u32) -> Self {
        Self::new(
            Subsystem::Session,
            EventType::SessionEnded {
                session_id: session_id.to_string(),
                total_requests,
            },
        )
    }

    pub fn run_attempt(session_id: &str, request_number: u32, iteration: u32) -> Self {
        Self::new(
            Subsystem::Run,
            EventType::RunAttempt {
                session_id: session_id.to_string(),
                request_number,
                iteration,
            },
        )
    }

    pub fn run_complete(
        session_id: &str,
        request_number: u32,
        iterations: u32,
        tool_uses: u32,
        tokens_used: u64,
    ) -> Self {
        Self::new(
            Subsystem::Run,
            EventType::RunComplete {
                session_id: session_id.to_string(),
                request_number,
                iterations,
                tool_uses,
                tokens_used,
            },
        )
    }

    pub fn run_budget_exceeded(session_id: &str, request_number: u32, max_iterations: u32) -> Self {
        Self::new(
            Subsystem::Run,
            EventType::RunBudgetExceeded {
                session_id: session_id.to_string(),
                request_number,
                max_iterations,
            },
        )
    }

    pub fn model_usage(
        backend: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        duration_ms: u64,
    ) -> Self {
        Self::new(
            Subsystem::Model,
            EventType::ModelUsage {
                backend: backend.to_string(),
                model: model.to_string(),
                input_tokens,
                output_tokens,
                duration_ms,
            },
        )
    }

    pub fn model_error(backend: &str, model: &str, error_message: &str) -> Self {
        Self::new(
            Subsystem::Model,
            EventType::ModelError {
                backend: backend.to_string(),
                model: model.to_string(),
                error_message: error_message.to_string(),
            },
        )
    }

    pub fn tool_invoked(
        session_id: &str,
        tool_name: &str,
        tool_call_id: &str,
        args_preview: &str,
    ) -> Self {
        Self::new(
            Subsystem::Tool,
            EventType::ToolInvoked {
                session_id: session_id.to_string(),
                tool_name: tool_name.to_string(),
                tool_call_id: tool_call_id.to_string(),
                args_preview: args_preview.to_string(),
            },
        )
    }

    pub fn tool_completed(
        session_id: &str,
        tool_name: &str,
        tool_call_id: &str,
        success: bool,
        duration_ms: u64,
    ) -> Self {
        Self::new(
            Subsystem::Tool,
            EventType::ToolCompleted {
                session_id: session_id.to_string(),
                tool_name: tool_name.to_string(),
                tool_call_id: tool_call_id.to_string(),
                success,
                duration_ms,
            },
        )
    }

    pub fn project_changed(session_id: &str, previous: Option<&str>, current: &str) -> Self {
        Self::new(
            Subsystem::Project,
            EventType::ProjectChanged {
                session_id: session_id.to_string(),
                previous: previous.map(String::from),
                current: current.to_string(),
            },
        )
    }
}

/// Event listener callback type
pub type EventListener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Event bus for pub/sub event distribution
pub struct EventBus {
    listeners: RwLock<Vec<EventListener>>,
    /// Filter by subsystem (None = all)
    subsystem_filters: RwLock<HashMap<usize, Vec<Subsystem>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to all events
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let id = listeners.len();
        listeners.push(Arc::new(listener));
        id
    }

    /// Subscribe to specific subsystems only
    pub fn subscribe_filtered<F>(&self, subsystems: Vec<Subsystem>, listener: F) -> usize
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.subscribe(listener);
        let mut filters = self
            .subsystem_filters
            .write()
            .unwrap_or_else(|e| e.into_inner());
        filters.insert(id, subsystems);
        id
    }

    /// Deliver an event to every matching listener on the calling thread.
    pub fn emit_sync(&self, event: Event) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        let filters = self
            .subsystem_filters
            .read()
            .unwrap_or_else(|e| e.into_inner());

        for (id, listener) in listeners.iter().enumerate() {
            if let Some(allowed) = filters.get(&id) {
                if !allowed.contains(&event.subsystem) {
                    continue;
                }
            }

            // A panicking listener must not take the agent loop down with it
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(&event);
            }));
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            subsystem_filters: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_event_sequence() {
        let e1 = Event::run_attempt("s", 1, 1);
        let e2 = Event::run_attempt("s", 1, 2);
        assert!(e2.seq > e1.seq);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::tool_invoked("session-1", "writeFile", "call-1", "path=a/index.html");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_invoked\""));
        assert!(json.contains("\"subsystem\":\"tool\""));
        assert!(json.contains("session-1"));
    }

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        bus.subscribe(move |_event| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_sync(Event::session_created("s1", "/tmp"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subsystem_filter() {
        let bus = EventBus::new();
        let tool_counter = Arc::new(AtomicUsize::new(0));
        let project_counter = Arc::new(AtomicUsize::new(0));

        let tc = Arc::clone(&tool_counter);
        bus.subscribe_filtered(vec![Subsystem::Tool], move |_| {
            tc.fetch_add(1, Ordering::SeqCst);
        });

        let pc = Arc::clone(&project_counter);
        bus.subscribe_filtered(vec![Subsystem::Project], move |_| {
            pc.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_sync(Event::tool_invoked("s1", "readFile", "c1", "preview"));
        bus.emit_sync(Event::project_changed("s1", None, "site"));
        bus.emit_sync(Event::project_changed("s1", Some("site"), "blog"));

        assert_eq!(tool_counter.load(Ordering::SeqCst), 1);
        assert_eq!(project_counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(|_| panic!("listener failure"));
        let c = Arc::clone(&counter);
        bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_sync(Event::session_ended("s1", 0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
