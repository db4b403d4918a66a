use crate::registry::{AgentHandle, AgentLease, Unavailable};
use crate::types::{Task, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// How a capability tag is compared with a task type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// The task type contains the tag (case-sensitive). `"CODING"` matches
    /// `"CODING"` and `"CODING_HOTFIX"`; it can also match unrelated types
    /// that happen to embed the tag.
    #[default]
    Substring,
    /// The task type equals the tag.
    Exact,
}

impl MatchPolicy {
    pub fn matches(self, capability: &str, task_type: &str) -> bool {
        match self {
            MatchPolicy::Substring => task_type.contains(capability),
            MatchPolicy::Exact => task_type == capability,
        }
    }
}

/// Outcome of one matching pass over the candidates.
#[derive(Debug)]
pub enum Assignment {
    /// The task now belongs to the leased agent.
    Assigned(AgentLease),
    /// A capable agent exists but a dispatch from this orchestrator holds it.
    Held,
    /// No capable agent is idle.
    NoCapableAgent,
}

impl Assignment {
    pub fn into_lease(self) -> Option<AgentLease> {
        match self {
            Assignment::Assigned(lease) => Some(lease),
            Assignment::Held | Assignment::NoCapableAgent => None,
        }
    }
}

/// Owns the status of dispatched tasks and matches tasks to agents.
///
/// Task ids are unique across running workflows: a workflow claims its
/// subtask ids before dispatching and releases them with [`forget`](Self::forget).
#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: HashMap<String, Task>,
    claimed: HashSet<String>,
    policy: MatchPolicy,
    unknown_updates: u64,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MatchPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Whether any of the agent's tags matches the task type, ignoring availability.
    pub fn is_capable(&self, candidate: &AgentHandle, task: &Task) -> bool {
        candidate
            .capabilities()
            .iter()
            .any(|cap| self.policy.matches(cap, &task.task_type))
    }

    /// Reserve the first idle, capable candidate for `task`.
    ///
    /// On success the task is marked `IN_PROGRESS`, assigned to the agent and
    /// recorded. Otherwise nothing is mutated, and the outcome says whether a
    /// capable agent was held by another dispatch during this same pass.
    pub fn assign_task(&mut self, task: &mut Task, candidates: &[AgentHandle]) -> Assignment {
        let mut held = false;
        for candidate in candidates {
            if !self.is_capable(candidate, task) {
                continue;
            }
            match candidate.try_reserve() {
                Ok(lease) => {
                    task.assigned_to = Some(lease.id().to_string());
                    task.status = TaskStatus::InProgress;
                    self.tasks.insert(task.id.clone(), task.clone());

                    debug!(task_id = %task.id, agent_id = %lease.id(), "Task assigned");
                    return Assignment::Assigned(lease);
                }
                Err(Unavailable::Reserved) => held = true,
                Err(Unavailable::NotIdle) => {}
            }
        }
        if held {
            Assignment::Held
        } else {
            Assignment::NoCapableAgent
        }
    }

    /// Claim the ids of a workflow's subtasks.
    ///
    /// Fails with the first id a running workflow already claimed, in which
    /// case nothing is claimed.
    pub fn claim(&mut self, tasks: &[Task]) -> Result<(), String> {
        if let Some(taken) = tasks.iter().find(|t| self.claimed.contains(&t.id)) {
            return Err(taken.id.clone());
        }
        self.claimed.extend(tasks.iter().map(|t| t.id.clone()));
        Ok(())
    }

    /// Overwrite the status of a tracked task.
    ///
    /// Updates for ids this manager never assigned are tolerated: they are
    /// logged, counted and otherwise ignored. Returns whether the task was tracked.
    pub fn update_task_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => {
                self.unknown_updates += 1;
                warn!(
                    task_id = %task_id,
                    status = %status,
                    "Status update for untracked task ignored"
                );
                false
            }
        }
    }

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// Number of status updates that targeted untracked ids.
    pub fn unknown_update_count(&self) -> u64 {
        self.unknown_updates
    }

    pub fn tracked_count(&self) -> usize {
        self.tasks.len()
    }

    /// Drop the given tasks and their claims once their workflow has finished.
    pub fn forget<'a>(&mut self, task_ids: impl IntoIterator<Item = &'a str>) {
        for id in task_ids {
            self.tasks.remove(id);
            self.claimed.remove(id);
        }
    }
}
