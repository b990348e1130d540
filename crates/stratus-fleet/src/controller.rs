use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use stratus_common::{Node, NodeType, TypePolicy};
use stratus_provider::Provider;

use crate::monitor::monitor_node;
use crate::state::FleetState;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub target_count: usize,
    pub policy: TypePolicy,
    /// Relaunch nodes that die or expire. When false the fleet only shrinks.
    pub keep_running: bool,
    pub poll_interval: Duration,
    /// Pause after each initial launch so the node can boot before the next
    /// request. Pacing only, not a correctness requirement.
    pub boot_delay: Duration,
    /// Pause between replacement launches during a reconcile pass.
    pub replace_delay: Duration,
    /// Lease window requested at launch; the engine never renews it.
    pub lease: chrono::Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            target_count: 1,
            policy: TypePolicy::Alternate,
            keep_running: false,
            poll_interval: Duration::from_secs(30),
            boot_delay: Duration::from_secs(5),
            replace_delay: Duration::from_secs(2),
            lease: chrono::Duration::hours(1),
        }
    }
}

/// Owns the fleet: the active node set, the target-count/type policy, and
/// one monitor task per node. Monitors report deaths back through
/// [`FleetController::remove_node`], which tops the fleet back up.
pub struct FleetController {
    provider: Arc<dyn Provider>,
    state: Mutex<FleetState>,
    monitors: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Serializes reconcile passes so simultaneous deaths cannot both read
    /// the same deficit and overshoot the target.
    reconcile_gate: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    poll_interval: Duration,
    boot_delay: Duration,
    replace_delay: Duration,
    lease: chrono::Duration,
}

impl FleetController {
    pub fn new(provider: Arc<dyn Provider>, config: FleetConfig) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            provider,
            state: Mutex::new(FleetState::new(
                config.target_count,
                config.policy,
                config.keep_running,
            )),
            monitors: Mutex::new(HashMap::new()),
            reconcile_gate: Mutex::new(()),
            shutdown_tx,
            poll_interval: config.poll_interval,
            boot_delay: config.boot_delay,
            replace_delay: config.replace_delay,
            lease: config.lease,
        })
    }

    pub(crate) fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    pub(crate) async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.contains(id)
    }

    /// Launch the initial fleet: one node per index 0..target, each typed by
    /// the policy at its launch index, then a top-up pass for any shortfall.
    pub async fn launch_fleet(self: &Arc<Self>) {
        let (target, policy, keep) = {
            let state = self.state.lock().await;
            (state.target_count, state.policy, state.keep_running)
        };
        info!(nodes = target, policy = %policy, keep_running = keep, "launching fleet");

        let mut launched = Vec::new();
        for index in 0..target {
            let node_type = policy.type_for_index(index);
            info!(slot = index + 1, total = target, node_type = %node_type, "launching node");
            if let Some(node) = self.launch_node(node_type).await {
                launched.push(node);
                tokio::time::sleep(self.boot_delay).await;
            }
        }

        info!(requested = target, launched = launched.len(), "launch summary");
        for (i, node) in launched.iter().enumerate() {
            info!(
                slot = i + 1,
                node_id = %node.id,
                hostname = %node.hostname,
                node_type = %node.node_type,
                expires_at = %node.expires_at,
                "fleet member"
            );
        }

        if keep {
            self.reconcile().await;
        }
    }

    /// Top the fleet back up to the target count. No-op unless the fleet is
    /// configured to keep running, and idempotent at zero deficit. Each
    /// replacement's type continues the launch-index sequence from the
    /// current fleet size. Launch failures are logged and left for the next
    /// pass.
    pub async fn reconcile(self: &Arc<Self>) {
        let _gate = self.reconcile_gate.lock().await;

        let mut attempts = {
            let state = self.state.lock().await;
            if !state.keep_running {
                return;
            }
            state.deficit()
        };
        if attempts == 0 {
            return;
        }
        info!(deficit = attempts, "fleet below target, launching replacements");

        while attempts > 0 {
            let node_type = {
                let state = self.state.lock().await;
                if state.deficit() == 0 {
                    return;
                }
                state.next_type()
            };
            if *self.shutdown_tx.borrow() {
                return;
            }
            if self.launch_node(node_type).await.is_some() {
                tokio::time::sleep(self.replace_delay).await;
            }
            attempts -= 1;
        }
    }

    /// Remove a dead or vanished node: drop it from tracking, best-effort
    /// stop at the provider, then reconcile. The stop may fail; the node is
    /// already gone as far as the fleet is concerned.
    pub async fn remove_node(self: &Arc<Self>, id: &str) {
        let node = self.state.lock().await.remove(id);
        let Some(node) = node else {
            return;
        };
        info!(
            node_id = %id,
            hostname = %node.hostname,
            consecutive_failures = node.consecutive_failures,
            "removing node from fleet"
        );

        match self.provider.stop(id).await {
            Ok(receipt) => {
                info!(node_id = %id, stopped_at = %receipt.stopped_at, refund = receipt.refund_amount, "stopped node")
            }
            Err(e) => {
                warn!(node_id = %id, error = %e, "failed to stop node, removing from tracking anyway")
            }
        }

        let keep = self.state.lock().await.keep_running;
        if keep {
            self.reconcile().await;
        }

        // Drop this monitor's handle only after the replacement's has been
        // inserted, so the handle map is never momentarily empty while a
        // replenishment is in flight and monitors_finished cannot resolve
        // against a fleet that is being topped back up.
        self.monitors.lock().await.remove(id);
    }

    /// Stop every tracked node. Per-node failures are logged and do not
    /// abort the sweep.
    pub async fn stop_all(&self) {
        let nodes: Vec<Node> = {
            let state = self.state.lock().await;
            state.active.values().cloned().collect()
        };
        info!(count = nodes.len(), "stopping all fleet nodes");

        for node in &nodes {
            info!(node_id = %node.id, hostname = %node.hostname, "stopping node");
            match self.provider.stop(&node.id).await {
                Ok(receipt) => {
                    info!(
                        node_id = %node.id,
                        stopped_at = %receipt.stopped_at,
                        refund = receipt.refund_amount,
                        "node stopped"
                    )
                }
                Err(e) => error!(node_id = %node.id, error = %e, "failed to stop node"),
            }
        }

        self.state.lock().await.active.clear();
        info!("fleet stop sweep complete");
    }

    /// Record the outcome of one health-check cycle for a node.
    pub(crate) async fn record_cycle(&self, id: &str, healthy: bool) {
        let mut state = self.state.lock().await;
        if let Some(node) = state.active.get_mut(id) {
            if healthy {
                node.consecutive_failures = 0;
            } else {
                node.consecutive_failures += 1;
            }
        }
    }

    async fn launch_node(self: &Arc<Self>, node_type: NodeType) -> Option<Node> {
        let expires_at = Utc::now() + self.lease;
        match self.provider.launch(node_type, expires_at).await {
            Ok(launched) => {
                let node = Node {
                    id: launched.id,
                    hostname: launched.hostname,
                    node_type,
                    launched_at: Utc::now(),
                    expires_at,
                    consecutive_failures: 0,
                };
                self.state.lock().await.insert(node.clone());
                info!(node_id = %node.id, hostname = %node.hostname, node_type = %node_type, "node launched");
                self.spawn_monitor(node.clone()).await;
                Some(node)
            }
            Err(e) => {
                error!(node_type = %node_type, error = %e, "launch failed");
                None
            }
        }
    }

    // The monitor future re-enters the controller (remove_node leads to
    // a fresh spawn_monitor), so its type would otherwise contain
    // itself. Boxing erases the cycle, and the explicit `dyn Future +
    // Send` return type declares Send instead of leaving it to the
    // (cyclic) auto-trait inference.
    fn spawn_monitor(self: &Arc<Self>, node: Node) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let this = Arc::clone(self);
        Box::pin(async move {
            let id = node.id.clone();
            let shutdown = this.shutdown_tx.subscribe();
            let monitor: Pin<Box<dyn Future<Output = ()> + Send>> =
                Box::pin(monitor_node(Arc::clone(&this), node, shutdown));
            let handle = tokio::spawn(monitor);
            this.monitors.lock().await.insert(id, handle);
        })
    }

    /// Flip the shutdown signal observed by every monitor task.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Drain the monitor handle map for joining.
    pub(crate) async fn take_monitors(&self) -> HashMap<String, JoinHandle<()>> {
        std::mem::take(&mut *self.monitors.lock().await)
    }

    /// Resolves once every monitor task has finished on its own, i.e. the
    /// whole fleet died without replacement.
    pub async fn monitors_finished(&self) {
        loop {
            {
                let monitors = self.monitors.lock().await;
                if monitors.values().all(|h| h.is_finished()) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}
