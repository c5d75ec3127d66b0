use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Planning,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// `true` once the workflow can no longer transition: a workflow in a
    /// terminal state is immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTaskStatus {
    Pending,
    Ready,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl Default for WorkflowTaskStatus {
    fn default() -> Self {
        WorkflowTaskStatus::Pending
    }
}

/// One node of the task DAG. `parent_ids` must form an acyclic graph;
/// `status` is monotonic along `pending -> ready -> in_progress ->
/// {completed|failed|skipped}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: Id,
    pub workflow_id: Id,
    pub description: String,
    pub assigned_agent_id: Id,
    pub order_index: usize,
    pub parent_ids: Vec<Id>,
    pub status: WorkflowTaskStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowTask {
    pub fn new(workflow_id: Id, description: impl Into<String>, assigned_agent_id: Id, order_index: usize) -> Self {
        Self {
            id: Id::new(),
            workflow_id,
            description: description.into(),
            assigned_agent_id,
            order_index,
            parent_ids: Vec::new(),
            status: WorkflowTaskStatus::Pending,
            output: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// A unit of multi-task work over a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Id,
    pub description: String,
    pub orchestrator_agent_id: Id,
    pub channel_id: Id,
    pub status: WorkflowStatus,
    pub tasks: Vec<WorkflowTask>,
    pub results: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(description: impl Into<String>, orchestrator_agent_id: Id, channel_id: Id) -> Self {
        Self {
            id: Id::new(),
            description: description.into(),
            orchestrator_agent_id,
            channel_id,
            status: WorkflowStatus::Planning,
            tasks: Vec::new(),
            results: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn task(&self, id: Id) -> Option<&WorkflowTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn progress_percentage(&self) -> u8 {
        if self.tasks.is_empty() {
            return 0;
        }
        let done = self.tasks.iter().filter(|t| t.status == WorkflowTaskStatus::Completed).count();
        ((done as f64 / self.tasks.len() as f64) * 100.0).round() as u8
    }

    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == WorkflowTaskStatus::Completed)
    }

    pub fn has_fatal_failure(&self) -> bool {
        self.tasks.iter().any(|t| t.status == WorkflowTaskStatus::Failed)
    }
}

/// `parent_ids` form an acyclic graph: no task may (transitively) depend on
/// itself. Used at parse time before a workflow is persisted.
pub fn is_acyclic(tasks: &[WorkflowTask]) -> bool {
    let by_id: HashMap<Id, &WorkflowTask> = tasks.iter().map(|t| (t.id, t)).collect();
    let mut visiting = HashSet::new();
    let mut done = HashSet::new();

    fn visit(
        id: Id,
        by_id: &HashMap<Id, &WorkflowTask>,
        visiting: &mut HashSet<Id>,
        done: &mut HashSet<Id>,
    ) -> bool {
        if done.contains(&id) {
            return true;
        }
        if !visiting.insert(id) {
            return false;
        }
        if let Some(task) = by_id.get(&id) {
            for parent in &task.parent_ids {
                if !visit(*parent, by_id, visiting, done) {
                    return false;
                }
            }
        }
        visiting.remove(&id);
        done.insert(id);
        true
    }

    tasks.iter().all(|t| visit(t.id, &by_id, &mut visiting, &mut done))
}

/// A task is `ready` iff every parent is `completed`. Only considers tasks
/// currently `pending`, matching the monotonic
/// transition order.
pub fn ready_task_ids(tasks: &[WorkflowTask]) -> Vec<Id> {
    let completed: HashSet<Id> =
        tasks.iter().filter(|t| t.status == WorkflowTaskStatus::Completed).map(|t| t.id).collect();
    tasks
        .iter()
        .filter(|t| t.status == WorkflowTaskStatus::Pending)
        .filter(|t| t.parent_ids.iter().all(|p| completed.contains(p)))
        .map(|t| t.id)
        .collect()
}

/// Every task that (transitively) depends on `failed_id`, so the caller can
/// mark them `skipped` (skipped only arises when an ancestor has status
/// failed).
pub fn descendants_of(tasks: &[WorkflowTask], failed_id: Id) -> Vec<Id> {
    let mut children_of: HashMap<Id, Vec<Id>> = HashMap::new();
    for task in tasks {
        for parent in &task.parent_ids {
            children_of.entry(*parent).or_default().push(task.id);
        }
    }
    let mut out = Vec::new();
    let mut stack = children_of.get(&failed_id).cloned().unwrap_or_default();
    let mut seen: HashSet<Id> = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(children) = children_of.get(&id) {
            stack.extend(children.iter().copied());
        }
    }
    out
}
