use clap::{Parser, ValueEnum};

use stratus_common::{NodeType, TypePolicy};

#[derive(Debug, Parser)]
#[command(name = "stratus")]
#[command(about = "Fleet manager for ephemeral GPU workload nodes", long_about = None)]
pub struct Args {
    /// Number of nodes to keep in the fleet
    #[arg(long, default_value_t = 1)]
    pub nodes: usize,

    /// Node type to launch
    #[arg(long = "type", value_enum, default_value = "alternate")]
    pub node_type: TypeArg,

    /// Health poll interval in seconds
    #[arg(long, env = "STRATUS_POLL", default_value_t = 30)]
    pub poll: u64,

    /// Relaunch nodes when they fail or expire
    #[arg(long)]
    pub keep_running: bool,

    /// Leave nodes running after exit
    #[arg(long)]
    pub no_rm: bool,

    /// Provisioning API base URL
    #[arg(
        long,
        env = "STRATUS_API_URL",
        default_value = "https://api.comput3.ai/api/v0"
    )]
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Fast,
    Large,
    Alternate,
}

impl TypeArg {
    pub fn to_policy(self) -> TypePolicy {
        match self {
            TypeArg::Fast => TypePolicy::Fixed(NodeType::Fast),
            TypeArg::Large => TypePolicy::Fixed(NodeType::Large),
            TypeArg::Alternate => TypePolicy::Alternate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_arg_maps_to_policy() {
        assert_eq!(TypeArg::Fast.to_policy(), TypePolicy::Fixed(NodeType::Fast));
        assert_eq!(TypeArg::Large.to_policy(), TypePolicy::Fixed(NodeType::Large));
        assert_eq!(TypeArg::Alternate.to_policy(), TypePolicy::Alternate);
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["stratus"]);
        assert_eq!(args.nodes, 1);
        assert_eq!(args.node_type, TypeArg::Alternate);
        assert!(!args.keep_running);
        assert!(!args.no_rm);
    }
}
