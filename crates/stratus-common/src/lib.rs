pub mod error;
pub mod node;

pub use error::ProviderError;
pub use node::{Node, NodeType, TypePolicy};
