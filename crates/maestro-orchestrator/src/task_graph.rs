use crate::error::WorkflowError;
use crate::types::{Task, TaskStatus};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Dispatched,
    Finished(TaskStatus),
}

#[derive(Debug)]
struct Node {
    position: usize,
    priority: i32,
    dependencies: Vec<String>,
    state: NodeState,
}

/// Dependency graph over the subtasks of one workflow.
///
/// Only scheduling state lives here; the tasks themselves stay with the
/// workflow result and the task manager.
#[derive(Debug)]
pub struct TaskGraph {
    nodes: HashMap<String, Node>,
    order: Vec<String>,
    completed: HashSet<String>,
}

impl TaskGraph {
    /// Build and validate the graph.
    ///
    /// Fails on duplicate ids, dependencies outside the set, and cycles.
    pub fn build(tasks: &[Task]) -> Result<Self, WorkflowError> {
        let mut nodes = HashMap::with_capacity(tasks.len());
        let mut order = Vec::with_capacity(tasks.len());

        for (position, task) in tasks.iter().enumerate() {
            let node = Node {
                position,
                priority: task.priority,
                dependencies: task.dependencies.clone(),
                state: NodeState::Pending,
            };
            if nodes.insert(task.id.clone(), node).is_some() {
                return Err(WorkflowError::InvalidGraph {
                    reason: format!("duplicate task id '{}'", task.id),
                });
            }
            order.push(task.id.clone());
        }

        for id in &order {
            let node = &nodes[id];
            if let Some(missing) = node.dependencies.iter().find(|d| !nodes.contains_key(*d)) {
                return Err(WorkflowError::InvalidGraph {
                    reason: format!("task '{id}' depends on unknown task '{missing}'"),
                });
            }
        }

        let graph = Self {
            nodes,
            order,
            completed: HashSet::new(),
        };
        if let Some(id) = graph.find_cycle() {
            return Err(WorkflowError::InvalidGraph {
                reason: format!("dependency cycle through task '{id}'"),
            });
        }
        Ok(graph)
    }

    /// Pending tasks whose dependencies have all completed, most urgent first
    /// (lowest priority value, then decomposition order).
    pub fn ready(&self) -> Vec<String> {
        let mut ready: Vec<(&String, &Node)> = self
            .order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|node| (id, node)))
            .filter(|(_, node)| node.state == NodeState::Pending)
            .filter(|(_, node)| node.dependencies.iter().all(|d| self.completed.contains(d)))
            .collect();
        ready.sort_by_key(|(_, node)| (node.priority, node.position));
        ready.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn mark_dispatched(&mut self, task_id: &str) -> bool {
        match self.nodes.get_mut(task_id) {
            Some(node) if node.state == NodeState::Pending => {
                node.state = NodeState::Dispatched;
                true
            }
            _ => false,
        }
    }

    /// Record the final status reported for a dispatched task.
    pub fn mark_finished(&mut self, task_id: &str, status: TaskStatus) -> bool {
        let Some(node) = self.nodes.get_mut(task_id) else {
            return false;
        };
        node.state = NodeState::Finished(status);
        if status == TaskStatus::Completed {
            self.completed.insert(task_id.to_string());
        }
        true
    }

    /// Tasks never dispatched, in decomposition order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| {
                self.nodes
                    .get(*id)
                    .is_some_and(|node| node.state == NodeState::Pending)
            })
            .cloned()
            .collect()
    }

    /// Pending tasks that can never become ready because some upstream task
    /// finished without completing.
    pub fn blocked(&self) -> Vec<String> {
        let mut memo = HashMap::new();
        let mut blocked = Vec::new();
        for id in &self.order {
            if self.is_blocked(id, &mut memo) {
                blocked.push(id.clone());
            }
        }
        blocked
    }

    fn is_blocked<'a>(&'a self, id: &'a str, memo: &mut HashMap<&'a str, bool>) -> bool {
        if let Some(&known) = memo.get(id) {
            return known;
        }
        let blocked = match self.nodes.get(id) {
            Some(node) if node.state == NodeState::Pending => {
                node.dependencies.iter().any(|dep| match self.nodes.get(dep.as_str()) {
                    Some(upstream) => match upstream.state {
                        NodeState::Finished(status) => status != TaskStatus::Completed,
                        NodeState::Pending => self.is_blocked(dep, memo),
                        NodeState::Dispatched => false,
                    },
                    None => true,
                })
            }
            _ => false,
        };
        memo.insert(id, blocked);
        blocked
    }

    /// Every task has been dispatched and has reported back.
    pub fn is_done(&self) -> bool {
        self.nodes
            .values()
            .all(|node| matches!(node.state, NodeState::Finished(_)))
    }

    fn find_cycle(&self) -> Option<&str> {
        let mut visited = HashMap::new();
        for id in &self.order {
            if self.dfs_cycle(id, &mut visited) {
                return Some(id);
            }
        }
        None
    }

    fn dfs_cycle<'a>(&'a self, id: &'a str, visited: &mut HashMap<&'a str, u8>) -> bool {
        match visited.get(id) {
            Some(1) => return true,  // back edge
            Some(2) => return false, // finished
            _ => {}
        }
        visited.insert(id, 1);
        if let Some(node) = self.nodes.get(id) {
            for dep in &node.dependencies {
                if self.dfs_cycle(dep, visited) {
                    return true;
                }
            }
        }
        visited.insert(id, 2);
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, "X", id).with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    fn pipeline() -> Vec<Task> {
        vec![
            task("planning", &[]),
            task("implementation", &["planning"]),
            task("review", &["implementation"]),
            task("testing", &["implementation"]),
        ]
    }

    #[test]
    fn test_empty_graph() {
        let graph = TaskGraph::build(&[]).unwrap();
        assert!(graph.pending_ids().is_empty());
        assert!(graph.is_done());
        assert!(graph.ready().is_empty());
    }

    #[test]
    fn test_ready_follows_dependencies() {
        let mut graph = TaskGraph::build(&pipeline()).unwrap();
        assert_eq!(graph.ready(), vec!["planning"]);

        graph.mark_dispatched("planning");
        assert!(graph.ready().is_empty());
        assert!(!graph.mark_dispatched("planning"));

        graph.mark_finished("planning", TaskStatus::Completed);
        assert_eq!(graph.ready(), vec!["implementation"]);

        graph.mark_dispatched("implementation");
        graph.mark_finished("implementation", TaskStatus::Completed);
        // Review and testing only share the implementation edge.
        assert_eq!(graph.ready(), vec!["review", "testing"]);
    }

    #[test]
    fn test_ready_orders_by_priority_then_position() {
        let tasks = vec![
            task("a", &[]).with_priority(5),
            task("b", &[]).with_priority(1),
            task("c", &[]).with_priority(5),
        ];
        let graph = TaskGraph::build(&tasks).unwrap();
        assert_eq!(graph.ready(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_out_of_order_input_still_respects_edges() {
        let tasks = vec![
            task("review", &["implementation"]),
            task("implementation", &["planning"]),
            task("planning", &[]),
        ];
        let graph = TaskGraph::build(&tasks).unwrap();
        assert_eq!(graph.ready(), vec!["planning"]);
        assert!(graph.pending_ids().contains(&"review".to_string()));
    }

    #[test]
    fn test_failed_dependency_blocks_dependents() {
        let mut graph = TaskGraph::build(&pipeline()).unwrap();
        graph.mark_dispatched("planning");
        graph.mark_finished("planning", TaskStatus::Failed);

        assert!(graph.ready().is_empty());
        assert!(!graph.is_done());
        assert_eq!(
            graph.pending_ids(),
            vec!["implementation", "review", "testing"]
        );
        assert_eq!(graph.blocked(), graph.pending_ids());
    }

    #[test]
    fn test_blocked_only_below_failure() {
        let tasks = vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &[]),
            task("d", &["c"]),
        ];
        let mut graph = TaskGraph::build(&tasks).unwrap();
        assert!(graph.blocked().is_empty());

        graph.mark_dispatched("a");
        graph.mark_dispatched("c");
        graph.mark_finished("a", TaskStatus::Failed);
        assert_eq!(graph.blocked(), vec!["b"]);
        // "d" still waits on an in-flight task.
        assert_eq!(graph.pending_ids(), vec!["b", "d"]);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = TaskGraph::build(&[task("review", &["ghost"])]).unwrap_err();
        assert_eq!(err.kind(), "invalid_graph");
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = TaskGraph::build(&[task("a", &[]), task("a", &[])]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_cycle_detection() {
        let tasks = vec![task("a", &["c"]), task("b", &["a"]), task("c", &["b"])];
        let err = TaskGraph::build(&tasks).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        assert!(TaskGraph::build(&[task("a", &["a"])]).is_err());
    }

    #[test]
    fn test_mark_dispatched_only_from_pending() {
        let mut graph = TaskGraph::build(&pipeline()).unwrap();
        assert!(graph.mark_dispatched("planning"));
        assert!(!graph.mark_dispatched("planning"));
        assert!(!graph.mark_dispatched("ghost"));
    }

    #[test]
    fn test_is_done() {
        let mut graph = TaskGraph::build(&[task("only", &[])]).unwrap();
        assert!(!graph.is_done());
        graph.mark_dispatched("only");
        assert!(!graph.is_done());
        graph.mark_finished("only", TaskStatus::Failed);
        assert!(graph.is_done());
    }
}
