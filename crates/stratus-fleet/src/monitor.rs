use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use stratus_common::Node;
use stratus_provider::HealthVerdict;

use crate::controller::FleetController;

/// Direct probe attempts per poll cycle before a node is declared dead.
const MAX_HEALTH_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Starting,
    Probing,
    Healthy,
    Suspect,
    Dead,
}

/// Per-node monitoring task. Runs until the node dies, the node leaves the
/// active set, or the shutdown signal flips. Only a death verdict triggers
/// removal; a shutdown exit leaves the fleet untouched.
pub(crate) async fn monitor_node(
    controller: Arc<FleetController>,
    node: Node,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = node.id;
    let hostname = node.hostname;
    let mut state = MonitorState::Starting;
    debug!(node_id = %id, state = ?state, "monitor spawned");
    info!(node_id = %id, hostname = %hostname, node_type = %node.node_type, "monitor started");

    // One-off boot probe, purely diagnostic: a node that has not finished
    // booting fails this and still gets its full first cycle.
    match controller.provider().health_check(&hostname).await {
        HealthVerdict::Healthy => info!(node_id = %id, hostname = %hostname, "node is up"),
        HealthVerdict::Unhealthy => {
            warn!(node_id = %id, hostname = %hostname, "initial probe failed, node may still be booting")
        }
    }

    let dead = loop {
        if *shutdown.borrow() {
            break false;
        }
        if !controller.contains(&id).await {
            debug!(node_id = %id, "node no longer tracked, monitor exiting");
            break false;
        }
        state = MonitorState::Probing;

        // The provider listing is ground truth: a node missing from a
        // successful listing is dead no matter what a direct probe says. A
        // listing *error* is not an absence verdict; this cycle falls back
        // to direct probing.
        match controller.provider().list_running().await {
            Ok(running) => {
                if !running.iter().any(|w| w.id == id) {
                    warn!(node_id = %id, hostname = %hostname, "node no longer listed by provider");
                    state = MonitorState::Dead;
                }
            }
            Err(e) => {
                warn!(node_id = %id, error = %e, "could not list workloads, falling back to direct probe")
            }
        }

        if state != MonitorState::Dead {
            let mut healthy = false;
            for attempt in 1..=MAX_HEALTH_ATTEMPTS {
                if controller.provider().health_check(&hostname).await == HealthVerdict::Healthy {
                    healthy = true;
                    break;
                }
                state = MonitorState::Suspect;
                warn!(
                    node_id = %id,
                    hostname = %hostname,
                    attempt,
                    max = MAX_HEALTH_ATTEMPTS,
                    "health check failed"
                );
            }
            if healthy {
                if state == MonitorState::Suspect {
                    info!(node_id = %id, hostname = %hostname, "node recovered within retry budget");
                }
                state = MonitorState::Healthy;
                controller.record_cycle(&id, true).await;
                info!(node_id = %id, hostname = %hostname, "node healthy");
            } else {
                controller.record_cycle(&id, false).await;
                state = MonitorState::Dead;
            }
        }

        if state == MonitorState::Dead {
            break true;
        }

        tokio::select! {
            _ = tokio::time::sleep(controller.poll_interval()) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break false;
                }
            }
        }
    };

    if dead {
        error!(node_id = %id, hostname = %hostname, "node declared dead, removing");
        controller.remove_node(&id).await;
    }

    info!(node_id = %id, hostname = %hostname, "monitor stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::controller::FleetConfig;
    use stratus_common::{NodeType, TypePolicy};
    use stratus_provider::MockProvider;

    fn fleet(target: usize, keep_running: bool, poll: Duration) -> (Arc<FleetController>, MockProvider) {
        let mock = MockProvider::new();
        let controller = FleetController::new(
            Arc::new(mock.clone()),
            FleetConfig {
                target_count: target,
                policy: TypePolicy::Fixed(NodeType::Fast),
                keep_running,
                poll_interval: poll,
                boot_delay: Duration::from_millis(1),
                replace_delay: Duration::from_millis(1),
                lease: chrono::Duration::hours(1),
            },
        );
        (controller, mock)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    #[tokio::test]
    async fn absence_outranks_health() {
        let (controller, mock) = fleet(1, false, Duration::from_millis(20));
        controller.launch_fleet().await;
        let (id, _) = mock.launches().await[0].clone();

        // Hostname stays healthy; only the listing loses the node.
        mock.vanish(&id).await;
        settle().await;

        assert_eq!(controller.active_count().await, 0);
        assert_eq!(mock.stopped_ids().await, vec![id]);
        controller.signal_shutdown();
    }

    #[tokio::test]
    async fn list_error_is_not_absence() {
        let (controller, mock) = fleet(1, false, Duration::from_millis(20));
        controller.launch_fleet().await;
        mock.set_list_error(true).await;

        settle().await;
        assert_eq!(controller.active_count().await, 1);
        assert!(mock.stopped_ids().await.is_empty());
        controller.signal_shutdown();
    }

    #[tokio::test]
    async fn recovery_within_retry_budget_is_not_death() {
        let (controller, mock) = fleet(1, false, Duration::from_secs(60));
        // Mock hostnames are sequential, so the script can be staged before
        // launch: boot probe, then two failed attempts, then a success.
        let hostname = "node-1.stratus.test";
        mock.queue_health(hostname, vec![true, false, false, true]).await;
        controller.launch_fleet().await;
        settle().await;

        assert_eq!(controller.active_count().await, 1);
        assert!(mock.stopped_ids().await.is_empty());
        assert_eq!(mock.health_checks(hostname).await, 4);
        controller.signal_shutdown();
    }

    #[tokio::test]
    async fn three_failures_in_a_cycle_is_death() {
        let (controller, mock) = fleet(1, false, Duration::from_secs(60));
        let hostname = "node-1.stratus.test";
        // Boot probe plus a fully failed first cycle.
        mock.queue_health(hostname, vec![true, false, false, false]).await;
        controller.launch_fleet().await;
        settle().await;

        assert_eq!(controller.active_count().await, 0);
        assert_eq!(mock.stopped_ids().await.len(), 1);
        // Boot probe + exactly three attempts, no fourth.
        assert_eq!(mock.health_checks(hostname).await, 4);
        controller.signal_shutdown();
    }
}
