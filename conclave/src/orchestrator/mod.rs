//! Breaks a free-text request into a task DAG and schedules it across agents.

mod orchestrator;
mod plan_parser;

pub use orchestrator::WorkflowOrchestrator;
pub use plan_parser::parse_plan;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::agent_runtime::AgentRuntime;
    use crate::domain::{Agent, AgentConfig, AgentKind, AgentPersona, Channel, WorkflowStatus, WorkflowTaskStatus};
    use crate::events::EventHub;
    use crate::llm::{FixedLlmResolver, GenerateParams, MockLlmGateway, ToolCallCapability};
    use crate::memory::{InMemoryMemoryStore, MockEmbedder};
    use crate::store::{InMemoryStore, Store};
    use crate::tools::ToolExecutor;

    use super::*;

    fn agent(handle: &str, kind: AgentKind) -> Agent {
        Agent::new(handle, kind, AgentPersona::default(), AgentConfig { system_prompt: format!("You are {handle}."), ..AgentConfig::default() })
    }

    async fn orchestrator_with(text: &str) -> (Arc<WorkflowOrchestrator>, Arc<InMemoryStore>, crate::domain::Id) {
        let store = Arc::new(InMemoryStore::new());
        let memory = Arc::new(InMemoryMemoryStore::new(Arc::new(MockEmbedder::new(16))));
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(ToolExecutor::new(dir.path().to_path_buf()));
        let events = Arc::new(EventHub::new());
        let runtime = Arc::new(AgentRuntime::new(store.clone(), memory, tools, events.clone()));

        let channel = Channel::new("general");
        let channel_id = channel.id;
        store.create_channel(channel).await.unwrap();

        let llm = Arc::new(MockLlmGateway::with_text(ToolCallCapability::Native, text));
        let params = GenerateParams { provider: "openai-class".into(), model: "gpt-4".into(), temperature: 0.2, max_tokens: 512 };
        let resolver = Arc::new(FixedLlmResolver::new(llm, params));

        (Arc::new(WorkflowOrchestrator::new(store.clone(), events, runtime, resolver)), store, channel_id)
    }

    #[tokio::test]
    async fn plan_parses_the_orchestrator_agents_response() {
        let (orchestrator, store, channel_id) = orchestrator_with("Task 1: @backend - Build the endpoint").await;
        let orchestrator_agent = agent("@orchestrator", AgentKind::Orchestrator);
        let backend = agent("@backend", AgentKind::Backend);
        store.create_agent(orchestrator_agent.clone()).await.unwrap();
        store.create_agent(backend.clone()).await.unwrap();

        let workflow = orchestrator.plan(&orchestrator_agent, &[backend], channel_id, "add an endpoint").await.unwrap();
        assert_eq!(workflow.tasks.len(), 1);
        assert_eq!(workflow.status, WorkflowStatus::Planning);
    }

    #[tokio::test]
    async fn plan_with_unparseable_text_fails_the_workflow() {
        let (orchestrator, store, channel_id) = orchestrator_with("I am not sure what to do").await;
        let orchestrator_agent = agent("@orchestrator", AgentKind::Orchestrator);
        let backend = agent("@backend", AgentKind::Backend);
        store.create_agent(orchestrator_agent.clone()).await.unwrap();

        let result = orchestrator.plan(&orchestrator_agent, &[backend], channel_id, "add an endpoint").await;
        assert!(result.is_err());

        let workflows = store.list_workflows(channel_id).await.unwrap();
        assert_eq!(workflows[0].status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn start_runs_a_single_task_workflow_to_completion() {
        let (orchestrator, store, channel_id) = orchestrator_with("Task 1: @backend - Build the endpoint").await;
        let orchestrator_agent = agent("@orchestrator", AgentKind::Orchestrator);
        let backend = agent("@backend", AgentKind::Backend);
        store.create_agent(orchestrator_agent.clone()).await.unwrap();
        store.create_agent(backend.clone()).await.unwrap();

        let workflow = orchestrator.plan(&orchestrator_agent, &[backend], channel_id, "add an endpoint").await.unwrap();
        orchestrator.start(workflow.id).await.unwrap();

        for _ in 0..50 {
            let current = orchestrator.status(workflow.id).await.unwrap();
            if current.status.is_terminal() {
                assert_eq!(current.status, WorkflowStatus::Completed);
                assert_eq!(current.tasks[0].status, WorkflowTaskStatus::Completed);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("workflow never reached a terminal state");
    }

    #[tokio::test]
    async fn a_failed_task_skips_its_descendants() {
        let text = "Task 1: @backend - Build the endpoint\nTask 2: @qa - Test it (depends on Task 1)";
        let (orchestrator, store, channel_id) = orchestrator_with(text).await;
        let orchestrator_agent = agent("@orchestrator", AgentKind::Orchestrator);
        let backend = agent("@backend", AgentKind::Backend);
        let qa = agent("@qa", AgentKind::Reviewer);
        store.create_agent(orchestrator_agent.clone()).await.unwrap();
        store.create_agent(backend.clone()).await.unwrap();
        store.create_agent(qa.clone()).await.unwrap();

        let workflow = orchestrator.plan(&orchestrator_agent, &[backend, qa], channel_id, "add an endpoint").await.unwrap();

        // Swap the resolver's gateway for one that fails every call, to
        // exercise the failure/skip path deterministically.
        let failing_llm = Arc::new(MockLlmGateway::new(ToolCallCapability::Native));
        let params = GenerateParams { provider: "openai-class".into(), model: "gpt-4".into(), temperature: 0.2, max_tokens: 512 };
        let resolver = Arc::new(FixedLlmResolver::new(failing_llm, params));
        let failing_orchestrator = Arc::new(WorkflowOrchestrator::new(
            store.clone(),
            Arc::new(EventHub::new()),
            Arc::new(AgentRuntime::new(store.clone(), Arc::new(InMemoryMemoryStore::new(Arc::new(MockEmbedder::new(16)))), Arc::new(ToolExecutor::new(tempfile::tempdir().unwrap().path().to_path_buf())), Arc::new(EventHub::new()))),
            resolver,
        ));
        failing_orchestrator.start(workflow.id).await.unwrap();

        for _ in 0..50 {
            let current = failing_orchestrator.status(workflow.id).await.unwrap();
            if current.status.is_terminal() {
                assert_eq!(current.status, WorkflowStatus::Failed);
                assert_eq!(current.tasks[0].status, WorkflowTaskStatus::Failed);
                assert_eq!(current.tasks[1].status, WorkflowTaskStatus::Skipped);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("workflow never reached a terminal state");
    }

    #[tokio::test]
    async fn cancel_during_planning_is_immediate() {
        let (orchestrator, store, channel_id) = orchestrator_with("Task 1: @backend - Build the endpoint").await;
        let orchestrator_agent = agent("@orchestrator", AgentKind::Orchestrator);
        let backend = agent("@backend", AgentKind::Backend);
        store.create_agent(orchestrator_agent.clone()).await.unwrap();
        store.create_agent(backend.clone()).await.unwrap();

        let workflow = orchestrator.plan(&orchestrator_agent, &[backend], channel_id, "add an endpoint").await.unwrap();
        orchestrator.cancel(workflow.id).await.unwrap();

        let current = orchestrator.status(workflow.id).await.unwrap();
        assert_eq!(current.status, WorkflowStatus::Cancelled);
    }
}
