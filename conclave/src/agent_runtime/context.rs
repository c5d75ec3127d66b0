use crate::domain::Id;
use crate::llm::ChatMessage;

/// Everything `process_streaming` needs beyond the new message itself.
/// `task_context` is populated only for orchestrator-driven runs (parent
/// task outputs).
#[derive(Debug, Clone)]
pub struct RunContext {
    pub conversation: Vec<ChatMessage>,
    pub invoking_name: String,
    pub channel_id: Id,
    pub task_context: Option<String>,
}

/// Default conversation window size.
pub const DEFAULT_WINDOW: usize = 10;

impl RunContext {
    pub fn new(invoking_name: impl Into<String>, channel_id: Id) -> Self {
        Self { conversation: Vec::new(), invoking_name: invoking_name.into(), channel_id, task_context: None }
    }

    pub fn with_task_context(mut self, task_context: impl Into<String>) -> Self {
        self.task_context = Some(task_context.into());
        self
    }
}
