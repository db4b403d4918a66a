use crate::agent::Agent;
use crate::types::AgentStatus;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A registered agent plus the orchestrator-side reservation flag.
///
/// Cloning is cheap; clones share the same reservation.
#[derive(Clone)]
pub struct AgentHandle {
    agent: Arc<dyn Agent>,
    reserved: Arc<AtomicBool>,
    released: Arc<watch::Sender<u64>>,
}

impl AgentHandle {
    pub fn id(&self) -> &str {
        self.agent.id()
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn capabilities(&self) -> &[String] {
        self.agent.capabilities()
    }

    /// Whether a dispatch from this orchestrator currently holds the agent.
    pub fn is_reserved(&self) -> bool {
        self.reserved.load(Ordering::Acquire)
    }

    /// Atomically claim the agent if it is available.
    ///
    /// Two concurrent callers can never both receive a lease for the same agent.
    pub fn try_reserve(&self) -> Result<AgentLease, Unavailable> {
        // Flag before status: a lease released in between still reads as held,
        // and its release wakes whoever waits on it.
        let held = self.is_reserved();
        if self.agent.status() != AgentStatus::Idle {
            return Err(if held {
                Unavailable::Reserved
            } else {
                Unavailable::NotIdle
            });
        }
        self.reserved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Unavailable::Reserved)?;
        Ok(AgentLease {
            handle: self.clone(),
        })
    }
}

/// Why [`AgentHandle::try_reserve`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// A dispatch from this orchestrator holds the agent.
    Reserved,
    /// The agent reports itself busy or in error.
    NotIdle,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id())
            .field("agent_type", &self.agent.agent_type())
            .field("status", &self.agent.status())
            .field("reserved", &self.is_reserved())
            .finish()
    }
}

/// Exclusive claim on an agent for the duration of one dispatch.
///
/// Dropping the lease frees the agent and wakes workflows waiting for one.
#[derive(Debug)]
pub struct AgentLease {
    handle: AgentHandle,
}

impl AgentLease {
    pub fn id(&self) -> &str {
        self.handle.id()
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        self.handle.agent()
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        self.handle.reserved.store(false, Ordering::Release);
        self.handle
            .released
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// The agent pool owned by one orchestrator.
///
/// Agents keep their registration order; re-registering an id replaces the
/// entry in place. Reservation flags are keyed by agent id and outlive the
/// entry, so a lease taken from an older snapshot still excludes the agent
/// after it is re-registered.
pub struct AgentRegistry {
    pool: RwLock<Pool>,
    released: Arc<watch::Sender<u64>>,
}

#[derive(Default)]
struct Pool {
    agents: Vec<AgentHandle>,
    reservations: HashMap<String, Arc<AtomicBool>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        let (released, _) = watch::channel(0);
        Self {
            pool: RwLock::new(Pool::default()),
            released: Arc::new(released),
        }
    }

    /// Insert or overwrite by id. Returns the agent that was replaced.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let mut pool = self.pool.write();
        let reserved = Arc::clone(pool.reservations.entry(agent.id().to_string()).or_default());
        let handle = AgentHandle {
            agent,
            reserved,
            released: Arc::clone(&self.released),
        };
        match pool.agents.iter_mut().find(|h| h.id() == handle.id()) {
            Some(slot) => Some(std::mem::replace(slot, handle).agent),
            None => {
                pool.agents.push(handle);
                None
            }
        }
    }

    /// Remove by id. Returns the removed agent, if any.
    pub fn remove(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        let mut pool = self.pool.write();
        let index = pool.agents.iter().position(|h| h.id() == agent_id)?;
        Some(pool.agents.remove(index).agent)
    }

    /// Snapshot of the current pool in registration order.
    pub fn candidates(&self) -> Vec<AgentHandle> {
        self.pool.read().agents.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.pool
            .read()
            .agents
            .iter()
            .map(|h| h.id().to_string())
            .collect()
    }

    /// Receiver that changes every time any lease is released.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.released.subscribe()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::StubAgent;

    #[test]
    fn test_register_keeps_order_and_overwrites_in_place() {
        let registry = AgentRegistry::new();
        registry.register(StubAgent::arc("a", &["PLANNING"]));
        registry.register(StubAgent::arc("b", &["CODING"]));
        registry.register(StubAgent::arc("c", &["REVIEW"]));

        let replaced = registry.register(StubAgent::arc("b", &["TESTING"]));
        assert!(replaced.is_some());
        assert_eq!(registry.ids(), vec!["a", "b", "c"]);
        assert_eq!(
            registry.candidates()[1].capabilities(),
            &["TESTING".to_string()]
        );
    }

    #[test]
    fn test_remove() {
        let registry = AgentRegistry::new();
        registry.register(StubAgent::arc("a", &["PLANNING"]));
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn test_lease_is_exclusive_and_released_on_drop() {
        let registry = AgentRegistry::new();
        registry.register(StubAgent::arc("a", &["CODING"]));
        let handle = registry.candidates().remove(0);

        let lease = handle.try_reserve().unwrap();
        assert!(handle.is_reserved());
        assert_eq!(handle.try_reserve().unwrap_err(), Unavailable::Reserved);

        drop(lease);
        assert!(!handle.is_reserved());
        assert!(handle.try_reserve().is_ok());
    }

    #[test]
    fn test_busy_agent_cannot_be_reserved() {
        let registry = AgentRegistry::new();
        registry.register(StubAgent::with_status("a", &["CODING"], AgentStatus::Busy));
        let handle = registry.candidates().remove(0);
        assert_eq!(handle.try_reserve().unwrap_err(), Unavailable::NotIdle);
        assert!(!handle.is_reserved());
    }

    #[tokio::test]
    async fn test_release_notifies_subscribers() {
        let registry = AgentRegistry::new();
        registry.register(StubAgent::arc("a", &["CODING"]));
        let mut rx = registry.subscribe();
        rx.borrow_and_update();

        let lease = registry.candidates()[0].try_reserve().unwrap();
        drop(lease);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_removal() {
        let registry = AgentRegistry::new();
        registry.register(StubAgent::arc("a", &["CODING"]));
        let snapshot = registry.candidates();
        registry.remove("a");
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].try_reserve().is_ok());
    }

    #[test]
    fn test_reregistered_agent_stays_reserved() {
        let registry = AgentRegistry::new();
        let agent = StubAgent::arc("solo", &["CODING"]);
        registry.register(Arc::clone(&agent));
        let lease = registry.candidates()[0].try_reserve().unwrap();

        registry.register(Arc::clone(&agent));
        let fresh = registry.candidates().remove(0);
        assert!(fresh.is_reserved());
        assert!(fresh.try_reserve().is_err());

        drop(lease);
        assert!(fresh.try_reserve().is_ok());
    }

    #[test]
    fn test_removed_and_readded_agent_stays_reserved() {
        let registry = AgentRegistry::new();
        let agent = StubAgent::arc("solo", &["CODING"]);
        registry.register(Arc::clone(&agent));
        let _lease = registry.candidates()[0].try_reserve().unwrap();

        registry.remove("solo");
        registry.register(agent);
        assert!(registry.candidates()[0].try_reserve().is_err());
    }
}
