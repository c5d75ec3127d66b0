use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use crate::agent_runtime::{AgentRuntime, RunContext};
use crate::domain::{
    descendants_of, ready_task_ids, Agent, Id, Workflow, WorkflowStatus, WorkflowTask, WorkflowTaskStatus,
};
use crate::error::ConclaveError;
use crate::events::EventHub;
use crate::llm::LlmResolver;
use crate::store::Store;

use super::plan_parser::parse_plan;

const PLAN_SYSTEM_PROMPT: &str = "You are a planning coordinator. Break the request into a numbered list of \
tasks, one per line, in the form `Task N: @agent_handle - Description` with an optional trailing \
`(depends on Task i, Task j)`. Only use agent handles from the participant list. Do not include anything else.";

/// Outcome of one spawned task execution, fed back into the scheduling loop.
struct TaskOutcome {
    task_id: Id,
    result: Result<String, String>,
}

/// Drives a [`Workflow`] from a free-text request to completion: obtains a
/// plan from the orchestrator agent, then schedules the resulting DAG,
/// running each ready task through [`AgentRuntime`] with per-agent FIFO
/// serialization and cross-agent concurrency.
pub struct WorkflowOrchestrator {
    store: Arc<dyn Store>,
    events: Arc<EventHub>,
    runtime: Arc<AgentRuntime>,
    llm: Arc<dyn LlmResolver>,
    cancel_flags: DashMap<Id, Arc<AtomicBool>>,
    agent_locks: DashMap<Id, Arc<AsyncMutex<()>>>,
}

impl WorkflowOrchestrator {
    pub fn new(store: Arc<dyn Store>, events: Arc<EventHub>, runtime: Arc<AgentRuntime>, llm: Arc<dyn LlmResolver>) -> Self {
        Self { store, events, runtime, llm, cancel_flags: DashMap::new(), agent_locks: DashMap::new() }
    }

    /// Synchronous — the caller waits for the plan before being able to call
    /// [`start`](Self::start). `participants` is the agent roster the plan
    /// may assign tasks to; `orchestrator_agent` drives the planning turn
    /// itself.
    pub async fn plan(
        &self,
        orchestrator_agent: &Agent,
        participants: &[Agent],
        channel_id: Id,
        request_text: &str,
    ) -> Result<Workflow, ConclaveError> {
        let mut workflow = Workflow::new(request_text, orchestrator_agent.id, channel_id);
        self.store.create_workflow(workflow.clone()).await?;
        self.events.broadcast("workflow:created", serde_json::to_value(&workflow).unwrap_or(json!({})), true, false).await?;
        self.events.broadcast("workflow:planning", json!({"workflow_id": workflow.id}), true, false).await?;

        let roster = participants.iter().map(|a| format!("{} ({})", a.handle, a.persona.role)).collect::<Vec<_>>().join("\n");
        let prompt = format!("Participants:\n{roster}\n\nRequest:\n{request_text}");

        let (llm, params) = self.llm.resolve(orchestrator_agent);
        let mut planner = orchestrator_agent.clone();
        planner.config.system_prompt = PLAN_SYSTEM_PROMPT.to_string();
        planner.config.tool_allow_list.clear();
        let context = RunContext::new(orchestrator_agent.handle.clone(), channel_id);
        let cancel = Arc::new(AtomicBool::new(false));

        let plan_result = self.runtime.process(&planner, &prompt, context, llm, params, cancel).await;
        let plan_text = match plan_result {
            Ok(result) => result.text,
            Err(err) => {
                self.fail_workflow(&mut workflow, err.class().to_string()).await?;
                return Err(err);
            }
        };

        let tasks = match parse_plan(&plan_text, participants, workflow.id) {
            Ok(tasks) => tasks,
            Err(err) => {
                self.fail_workflow(&mut workflow, err.to_string()).await?;
                return Err(err);
            }
        };

        workflow.tasks = tasks;
        self.store.update_workflow(workflow.clone()).await?;
        self.events
            .broadcast("workflow:plan_ready", json!({"workflow_id": workflow.id, "task_count": workflow.tasks.len()}), true, false)
            .await?;
        Ok(workflow)
    }

    async fn fail_workflow(&self, workflow: &mut Workflow, error: String) -> Result<(), ConclaveError> {
        workflow.status = WorkflowStatus::Failed;
        workflow.error = Some(error.clone());
        workflow.completed_at = Some(chrono::Utc::now());
        self.store.update_workflow(workflow.clone()).await?;
        self.events.broadcast("workflow:failed", json!({"workflow_id": workflow.id, "error": error}), true, false).await?;
        Ok(())
    }

    /// Transitions `planning -> executing` and returns immediately.
    /// Execution runs in the background;
    /// progress is observable through [`status`](Self::status) or the event
    /// hub.
    pub async fn start(self: &Arc<Self>, workflow_id: Id) -> Result<(), ConclaveError> {
        let mut workflow = self.store.get_workflow(workflow_id).await?.ok_or_else(|| ConclaveError::not_found_workflow(workflow_id))?;
        if workflow.status != WorkflowStatus::Planning {
            return Err(ConclaveError::InvalidState(format!("workflow {workflow_id} is not in planning state")));
        }

        workflow.status = WorkflowStatus::Executing;
        workflow.started_at = Some(chrono::Utc::now());
        self.store.update_workflow(workflow.clone()).await?;
        self.events.broadcast("workflow:started", json!({"workflow_id": workflow_id}), true, false).await?;

        self.cancel_flags.insert(workflow_id, Arc::new(AtomicBool::new(false)));

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = this.run_execution_loop(workflow_id).await {
                tracing::error!(%workflow_id, %err, "workflow execution loop failed");
            }
        });
        Ok(())
    }

    /// Idempotent. A workflow still planning (no tasks running) is
    /// cancelled immediately; an executing
    /// workflow has its cooperative flag set and transitions to `cancelled`
    /// once its in-progress tasks settle.
    pub async fn cancel(&self, workflow_id: Id) -> Result<(), ConclaveError> {
        let mut workflow = self.store.get_workflow(workflow_id).await?.ok_or_else(|| ConclaveError::not_found_workflow(workflow_id))?;
        if workflow.status.is_terminal() {
            return Ok(());
        }

        if let Some(flag) = self.cancel_flags.get(&workflow_id) {
            flag.store(true, Ordering::Relaxed);
        }

        if workflow.status == WorkflowStatus::Planning {
            workflow.status = WorkflowStatus::Cancelled;
            workflow.completed_at = Some(chrono::Utc::now());
            self.store.update_workflow(workflow.clone()).await?;
            self.events.broadcast("workflow:cancelled", json!({"workflow_id": workflow_id}), true, false).await?;
        }
        Ok(())
    }

    pub async fn status(&self, workflow_id: Id) -> Result<Workflow, ConclaveError> {
        self.store.get_workflow(workflow_id).await?.ok_or_else(|| ConclaveError::not_found_workflow(workflow_id))
    }

    fn cancelled(&self, workflow_id: Id) -> bool {
        self.cancel_flags.get(&workflow_id).map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
    }

    /// The live cancellation flag for a workflow, shared with every task
    /// currently executing under it, so a `cancel()` call while a task is
    /// mid-stream is observed by that task's `AgentRuntime::process` call.
    fn cancel_flag(&self, workflow_id: Id) -> Arc<AtomicBool> {
        self.cancel_flags.entry(workflow_id).or_insert_with(|| Arc::new(AtomicBool::new(false))).clone()
    }

    fn agent_lock(&self, agent_id: Id) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.agent_locks.entry(agent_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }

    /// The scheduling loop: repeatedly launches every currently-ready task,
    /// waits for the next one to finish, applies its outcome, and re-derives
    /// readiness, until the DAG is quiescent.
    async fn run_execution_loop(self: Arc<Self>, workflow_id: Id) -> Result<(), ConclaveError> {
        let mut in_flight = FuturesUnordered::new();
        let mut launched = std::collections::HashSet::new();

        loop {
            let mut workflow = self.store.get_workflow(workflow_id).await?.ok_or_else(|| ConclaveError::not_found_workflow(workflow_id))?;
            if workflow.status != WorkflowStatus::Executing {
                return Ok(());
            }

            let cancel_requested = self.cancelled(workflow_id);
            if !cancel_requested {
                let mut newly_started = Vec::new();
                for task_id in ready_task_ids(&workflow.tasks) {
                    if !launched.insert(task_id) {
                        continue;
                    }
                    if let Some(task) = workflow.tasks.iter_mut().find(|t| t.id == task_id) {
                        task.status = WorkflowTaskStatus::InProgress;
                        task.started_at = Some(chrono::Utc::now());
                    }
                    let task = workflow.task(task_id).cloned().unwrap();
                    newly_started.push(task_id);
                    in_flight.push(self.clone().execute_task(workflow_id, task));
                }
                self.store.update_workflow(workflow.clone()).await?;
                for task_id in newly_started {
                    self.events.broadcast("workflow:task_started", json!({"workflow_id": workflow_id, "task_id": task_id}), true, false).await?;
                }
            }

            if in_flight.is_empty() {
                return self.finalize(workflow_id, cancel_requested).await;
            }

            if let Some(outcome) = in_flight.next().await {
                self.apply_outcome(workflow_id, outcome).await?;
            }
        }
    }

    /// Runs one task: acquires the assigned agent's serial lock (a single
    /// agent never executes two tasks at once), then drives it with parent
    /// outputs folded in as task context.
    async fn execute_task(self: Arc<Self>, workflow_id: Id, task: WorkflowTask) -> TaskOutcome {
        let outcome = self.execute_task_inner(workflow_id, &task).await;
        TaskOutcome { task_id: task.id, result: outcome }
    }

    async fn execute_task_inner(&self, workflow_id: Id, task: &WorkflowTask) -> Result<String, String> {
        let agent = self
            .store
            .get_agent(task.assigned_agent_id)
            .await
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "assigned agent no longer exists".to_string())?;

        let lock = self.agent_lock(task.assigned_agent_id);
        let _guard = lock.lock().await;

        let workflow = self
            .store
            .get_workflow(workflow_id)
            .await
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "workflow no longer exists".to_string())?;
        let outputs: Vec<String> = task
            .parent_ids
            .iter()
            .filter_map(|parent_id| workflow.task(*parent_id).and_then(|t| t.output.clone()))
            .collect();
        let task_context = if outputs.is_empty() { None } else { Some(outputs.join("\n\n")) };

        let mut context = RunContext::new(agent.handle.clone(), workflow.channel_id);
        if let Some(task_context) = task_context {
            context = context.with_task_context(task_context);
        }

        let (llm, params) = self.llm.resolve(&agent);
        let cancel = self.cancel_flag(workflow_id);
        self.runtime
            .process(&agent, &task.description, context, llm, params, cancel)
            .await
            .map(|result| result.text)
            .map_err(|err| err.class().to_string())
    }

    /// Applies a finished task's outcome and, on failure, marks every
    /// descendant `skipped` (skipped only arises when an ancestor has
    /// status failed).
    async fn apply_outcome(&self, workflow_id: Id, outcome: TaskOutcome) -> Result<(), ConclaveError> {
        let mut workflow = self.store.get_workflow(workflow_id).await?.ok_or_else(|| ConclaveError::not_found_workflow(workflow_id))?;

        let (status, output, error) = match outcome.result {
            Ok(text) => (WorkflowTaskStatus::Completed, Some(text), None),
            Err(err) => (WorkflowTaskStatus::Failed, None, Some(err)),
        };

        if let Some(task) = workflow.tasks.iter_mut().find(|t| t.id == outcome.task_id) {
            task.status = status;
            task.output = output;
            task.error = error;
            task.completed_at = Some(chrono::Utc::now());
        }

        if status == WorkflowTaskStatus::Failed {
            for descendant_id in descendants_of(&workflow.tasks, outcome.task_id) {
                if let Some(task) = workflow.tasks.iter_mut().find(|t| t.id == descendant_id) {
                    if task.status == WorkflowTaskStatus::Pending {
                        task.status = WorkflowTaskStatus::Skipped;
                    }
                }
            }
        }

        self.store.update_workflow(workflow.clone()).await?;
        let task_event = if status == WorkflowTaskStatus::Completed { "workflow:task_completed" } else { "workflow:task_failed" };
        self.events.broadcast(task_event, json!({"workflow_id": workflow_id, "task_id": outcome.task_id}), true, false).await?;
        self.events
            .broadcast("workflow:progress", json!({"workflow_id": workflow_id, "percentage": workflow.progress_percentage()}), true, true)
            .await?;
        Ok(())
    }

    /// Called once no task is in flight and none is ready: decide the
    /// workflow's terminal state.
    async fn finalize(&self, workflow_id: Id, cancel_requested: bool) -> Result<(), ConclaveError> {
        let mut workflow = self.store.get_workflow(workflow_id).await?.ok_or_else(|| ConclaveError::not_found_workflow(workflow_id))?;
        if workflow.status != WorkflowStatus::Executing {
            return Ok(());
        }

        let event_name;
        if cancel_requested {
            for task in workflow.tasks.iter_mut() {
                if matches!(task.status, WorkflowTaskStatus::Pending | WorkflowTaskStatus::Ready) {
                    task.status = WorkflowTaskStatus::Skipped;
                }
            }
            workflow.status = WorkflowStatus::Cancelled;
            event_name = "workflow:cancelled";
        } else if workflow.is_complete() {
            workflow.status = WorkflowStatus::Completed;
            workflow.results = Some(json!({
                "tasks": workflow.tasks.iter().map(|t| json!({"task_id": t.id, "output": t.output})).collect::<Vec<_>>()
            }));
            event_name = "workflow:completed";
        } else if workflow.has_fatal_failure() {
            workflow.status = WorkflowStatus::Failed;
            workflow.error = Some("one or more tasks failed".to_string());
            event_name = "workflow:failed";
        } else {
            // No task ready, none running, not complete, no failure: a
            // dependency cycle slipped past parse-time validation. Treat as
            // a failure rather than spinning forever.
            workflow.status = WorkflowStatus::Failed;
            workflow.error = Some("workflow stalled: no task became ready".to_string());
            event_name = "workflow:failed";
        }

        workflow.completed_at = Some(chrono::Utc::now());
        self.store.update_workflow(workflow.clone()).await?;
        self.events.broadcast(event_name, json!({"workflow_id": workflow_id}), true, false).await?;
        self.cancel_flags.remove(&workflow_id);
        Ok(())
    }
}
