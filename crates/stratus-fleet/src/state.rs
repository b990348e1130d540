use std::collections::HashMap;

use stratus_common::{Node, NodeType, TypePolicy};

/// Mutable fleet state. Owned by the controller behind a single mutex; every
/// read and mutation from the monitor tasks goes through that one lock.
pub(crate) struct FleetState {
    pub active: HashMap<String, Node>,
    pub target_count: usize,
    pub policy: TypePolicy,
    pub keep_running: bool,
}

impl FleetState {
    pub fn new(target_count: usize, policy: TypePolicy, keep_running: bool) -> Self {
        Self {
            active: HashMap::new(),
            target_count,
            policy,
            keep_running,
        }
    }

    /// Nodes missing from the target. `active.len() == target_count` is the
    /// goal, not an invariant; the deficit is what reconciliation launches.
    pub fn deficit(&self) -> usize {
        self.target_count.saturating_sub(self.active.len())
    }

    /// Launch index for the next node. Continuing from the current fleet
    /// size keeps an alternating policy balanced across replacements.
    pub fn next_type(&self) -> NodeType {
        self.policy.type_for_index(self.active.len())
    }

    pub fn insert(&mut self, node: Node) {
        self.active.insert(node.id.clone(), node);
    }

    pub fn remove(&mut self, id: &str) -> Option<Node> {
        self.active.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }
}
