use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tier of a provisioned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Fast,
    Large,
}

impl NodeType {
    /// Workload type string the provisioning API expects at launch.
    pub fn as_workload_type(&self) -> &'static str {
        match self {
            NodeType::Fast => "ollama_webui:fast",
            NodeType::Large => "ollama_webui:large",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Fast => write!(f, "fast"),
            NodeType::Large => write!(f, "large"),
        }
    }
}

/// Rule mapping a launch index to a node type.
///
/// The mapping is a pure function of the index, so a replacement launched
/// after a partial failure lands on the same type an uninterrupted launch
/// would have produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePolicy {
    Fixed(NodeType),
    Alternate,
}

impl TypePolicy {
    pub fn type_for_index(&self, index: usize) -> NodeType {
        match self {
            TypePolicy::Fixed(t) => *t,
            TypePolicy::Alternate => {
                if index % 2 == 0 {
                    NodeType::Fast
                } else {
                    NodeType::Large
                }
            }
        }
    }
}

impl fmt::Display for TypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePolicy::Fixed(t) => write!(f, "{t}"),
            TypePolicy::Alternate => write!(f, "alternate"),
        }
    }
}

/// One provisioned compute node tracked by the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Provider-assigned workload id.
    pub id: String,
    /// Provider-assigned address used for direct health probes.
    pub hostname: String,
    pub node_type: NodeType,
    pub launched_at: DateTime<Utc>,
    /// End of the fixed lease window set at launch; never renewed here.
    pub expires_at: DateTime<Utc>,
    /// Failed health-check cycles since the last success.
    pub consecutive_failures: u32,
}
