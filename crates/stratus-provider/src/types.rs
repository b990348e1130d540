use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stratus_common::{NodeType, ProviderError};

/// Outcome of a direct liveness probe. Network errors and timeouts are
/// folded into `Unhealthy`; the probe never fails out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
}

/// Successful launch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchedWorkload {
    pub id: String,
    pub hostname: String,
    pub node_type: NodeType,
    pub expires_at: DateTime<Utc>,
}

/// Successful stop response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopReceipt {
    pub stopped_at: DateTime<Utc>,
    pub refund_amount: f64,
}

/// One entry of the provider's running-workloads listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadInfo {
    pub id: String,
    pub hostname: String,
    pub workload_type: Option<String>,
}

/// Client boundary to the provisioning service.
///
/// `list_running` surfaces errors distinctly from an empty listing: an empty
/// vec means "nothing is running", an `Err` means "could not confirm".
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn launch(
        &self,
        node_type: NodeType,
        expires_at: DateTime<Utc>,
    ) -> Result<LaunchedWorkload, ProviderError>;

    async fn stop(&self, id: &str) -> Result<StopReceipt, ProviderError>;

    async fn list_running(&self) -> Result<Vec<WorkloadInfo>, ProviderError>;

    async fn health_check(&self, hostname: &str) -> HealthVerdict;
}
