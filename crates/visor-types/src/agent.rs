//! Agent identity and registry types.
//!
//! An `Agent` is an immutable remote persona: an opaque id, a display name,
//! and the two menu resources shown for it (normal mode and active mode).
//! Agents are built once at process start from the static configuration
//! registry; they are never mutated or deleted afterwards.

use serde::{Deserialize, Serialize};

/// A configured remote AI persona.
///
/// The `id` is the opaque identifier the remote system expects when a run
/// is created against a thread. Menu fields name the menu resources the
/// navigation layer renders for this agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    /// Menu resource shown while browsing this agent outside active mode.
    pub menu: String,
    /// Menu resource shown while a session with this agent is live.
    pub active_menu: String,
}

/// Immutable lookup table of configured agents.
///
/// Built once at startup; iteration order is the configuration order, which
/// is also the display order in the agent list menu.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    /// Build a registry from an ordered list of agents.
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Look up an agent by its opaque id.
    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Agent at a display position (agent list menus select by index).
    pub fn by_index(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    /// Iterate agents in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
