use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::controller::FleetController;

/// Grace period when joining each monitor task.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Drives graceful termination: flip the shutdown signal, join every monitor
/// under a bounded timeout, then stop the fleet unless the operator asked to
/// leave it running.
pub struct ShutdownCoordinator {
    controller: Arc<FleetController>,
    keep_nodes: bool,
}

impl ShutdownCoordinator {
    pub fn new(controller: Arc<FleetController>, keep_nodes: bool) -> Self {
        Self {
            controller,
            keep_nodes,
        }
    }

    pub async fn run(self) {
        info!("shutting down fleet monitoring");
        self.controller.signal_shutdown();

        for (node_id, handle) in self.controller.take_monitors().await {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => info!(node_id = %node_id, "monitor finished"),
                Ok(Err(e)) => warn!(node_id = %node_id, error = %e, "monitor task failed"),
                Err(_) => warn!(node_id = %node_id, "monitor did not stop in time, abandoning"),
            }
        }

        if self.keep_nodes {
            info!("leaving fleet nodes running");
        } else {
            self.controller.stop_all().await;
        }
    }
}
