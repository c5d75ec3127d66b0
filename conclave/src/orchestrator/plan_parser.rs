use std::collections::{HashMap, HashSet};

use crate::domain::{is_acyclic, Agent, Id, WorkflowTask};
use crate::error::ConclaveError;

/// One recognized line of a plan: `Task N: @agent_handle - Description
/// (depends on Task i, Task j)`. `ordinal` establishes `order_index` but is
/// never used as the task id.
#[derive(Debug, Clone, PartialEq)]
struct ParsedTask {
    ordinal: u32,
    agent_handle: String,
    description: String,
    parent_ordinals: Vec<u32>,
}

/// Line-tolerant: a line that doesn't match the task grammar is ignored
/// (the orchestrator agent often emits prose). The safer interpretation of
/// an ambiguous line is to skip it rather than guess a task out of it.
fn parse_lines(text: &str) -> Vec<ParsedTask> {
    let mut tasks = Vec::new();
    for line in text.lines() {
        if let Some(task) = parse_line(line.trim()) {
            tasks.push(task);
        }
    }
    tasks
}

fn parse_line(line: &str) -> Option<ParsedTask> {
    let rest = line.strip_prefix("Task")?.trim_start();
    let colon_idx = rest.find(':')?;
    let ordinal: u32 = rest[..colon_idx].trim().parse().ok()?;

    let rest = rest[colon_idx + 1..].trim();
    let at_idx = rest.find('@')?;
    let rest = &rest[at_idx..];
    let dash_idx = rest.find(" - ")?;
    let agent_handle = rest[..dash_idx].trim().to_string();
    let mut description = rest[dash_idx + 3..].trim().to_string();
    if agent_handle.len() <= 1 || description.is_empty() {
        return None;
    }

    let parent_ordinals = extract_dependencies(&mut description);
    Some(ParsedTask { ordinal, agent_handle, description, parent_ordinals })
}

/// Strips a trailing `(depends on Task i, Task j, ...)` clause from
/// `description` in place and returns the referenced ordinals.
fn extract_dependencies(description: &mut String) -> Vec<u32> {
    let trimmed_end = description.trim_end();
    if !trimmed_end.ends_with(')') {
        return Vec::new();
    }
    let Some(paren_start) = trimmed_end.rfind('(') else { return Vec::new() };
    let inner = &trimmed_end[paren_start + 1..trimmed_end.len() - 1];
    let lower = inner.to_lowercase();
    let Some(after) = lower.find("depends on") else { return Vec::new() };

    let deps_str = &inner[after + "depends on".len()..];
    let ordinals: Vec<u32> = deps_str
        .split(',')
        .filter_map(|part| {
            let digits: String = part.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect();

    *description = trimmed_end[..paren_start].trim_end().to_string();
    ordinals
}

/// Parse a free-text plan into fresh [`WorkflowTask`]s. Agent handles are
/// matched case-insensitively against `agents`.
pub fn parse_plan(text: &str, agents: &[Agent], workflow_id: Id) -> Result<Vec<WorkflowTask>, ConclaveError> {
    let parsed = parse_lines(text);
    if parsed.is_empty() {
        return Err(ConclaveError::EmptyPlan);
    }

    let mut seen_ordinals = HashSet::new();
    for task in &parsed {
        if !seen_ordinals.insert(task.ordinal) {
            return Err(ConclaveError::DuplicateTask(task.ordinal.to_string()));
        }
    }

    let agents_by_handle: HashMap<String, Id> = agents.iter().filter(|a| a.active).map(|a| (a.handle.to_lowercase(), a.id)).collect();
    let ordinal_to_id: HashMap<u32, Id> = parsed.iter().map(|t| (t.ordinal, Id::new())).collect();

    let mut tasks = Vec::with_capacity(parsed.len());
    for task in &parsed {
        let agent_id = *agents_by_handle
            .get(&task.agent_handle.to_lowercase())
            .ok_or_else(|| ConclaveError::UnknownAgent(task.agent_handle.clone()))?;

        let mut parent_ids = Vec::with_capacity(task.parent_ordinals.len());
        for dep in &task.parent_ordinals {
            if *dep == task.ordinal {
                return Err(ConclaveError::CyclicPlan);
            }
            let parent_id = *ordinal_to_id.get(dep).ok_or_else(|| ConclaveError::UnknownDependency(dep.to_string()))?;
            parent_ids.push(parent_id);
        }

        let mut workflow_task = WorkflowTask::new(workflow_id, task.description.clone(), agent_id, task.ordinal as usize);
        workflow_task.id = ordinal_to_id[&task.ordinal];
        workflow_task.parent_ids = parent_ids;
        tasks.push(workflow_task);
    }

    if !is_acyclic(&tasks) {
        return Err(ConclaveError::CyclicPlan);
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentConfig, AgentKind, AgentPersona};

    fn agent(handle: &str) -> Agent {
        Agent::new(handle, AgentKind::Backend, AgentPersona::default(), AgentConfig::default())
    }

    #[test]
    fn parses_a_simple_linear_plan() {
        let agents = vec![agent("@backend"), agent("@qa")];
        let text = "Task 1: @backend - Create model\nTask 2: @qa - Test it (depends on Task 1)";
        let tasks = parse_plan(text, &agents, Id::new()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].parent_ids, vec![tasks[0].id]);
    }

    #[test]
    fn ignores_prose_lines_between_tasks() {
        let agents = vec![agent("@backend")];
        let text = "Here is my plan:\nTask 1: @backend - Do the work\nThanks!";
        let tasks = parse_plan(text, &agents, Id::new()).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn agent_handles_match_case_insensitively() {
        let agents = vec![agent("@Backend")];
        let tasks = parse_plan("Task 1: @backend - Do the work", &agents, Id::new()).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn zero_recognized_tasks_is_an_empty_plan() {
        let agents = vec![agent("@backend")];
        assert!(matches!(parse_plan("just some prose", &agents, Id::new()), Err(ConclaveError::EmptyPlan)));
    }

    #[test]
    fn unknown_agent_handle_fails() {
        let agents = vec![agent("@backend")];
        let result = parse_plan("Task 1: @ghost - Do something", &agents, Id::new());
        assert!(matches!(result, Err(ConclaveError::UnknownAgent(_))));
    }

    #[test]
    fn dependency_on_missing_ordinal_fails() {
        let agents = vec![agent("@backend")];
        let result = parse_plan("Task 1: @backend - Do it (depends on Task 9)", &agents, Id::new());
        assert!(matches!(result, Err(ConclaveError::UnknownDependency(_))));
    }

    #[test]
    fn self_dependency_is_cyclic() {
        let agents = vec![agent("@backend")];
        let result = parse_plan("Task 1: @backend - Do it (depends on Task 1)", &agents, Id::new());
        assert!(matches!(result, Err(ConclaveError::CyclicPlan)));
    }

    #[test]
    fn duplicate_ordinals_fail() {
        let agents = vec![agent("@backend")];
        let text = "Task 1: @backend - First\nTask 1: @backend - Second";
        assert!(matches!(parse_plan(text, &agents, Id::new()), Err(ConclaveError::DuplicateTask(_))));
    }

    #[test]
    fn multiple_dependencies_are_all_resolved() {
        let agents = vec![agent("@frontend"), agent("@qa")];
        let text = "Task 1: @frontend - Add dark mode\nTask 2: @frontend - Add ARIA labels\nTask 3: @qa - Full regression (depends on Task 1, Task 2)";
        let tasks = parse_plan(text, &agents, Id::new()).unwrap();
        let task3 = tasks.iter().find(|t| t.description.contains("regression")).unwrap();
        assert_eq!(task3.parent_ids.len(), 2);
    }
}
