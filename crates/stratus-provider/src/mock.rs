use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use stratus_common::{NodeType, ProviderError};

use crate::types::{HealthVerdict, LaunchedWorkload, Provider, StopReceipt, WorkloadInfo};

/// In-memory stand-in for the provisioning API, used by the fleet engine's
/// tests. Failures are scripted per call site: launches can be made to fail
/// N times, stops can fail per workload id, the listing can be switched into
/// an error state, and per-hostname health can be a steady value or a queue
/// of one-shot verdicts.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    launch_delay: Option<std::time::Duration>,
    running: HashMap<String, WorkloadInfo>,
    healthy: HashMap<String, bool>,
    health_script: HashMap<String, VecDeque<bool>>,
    health_checks: HashMap<String, u32>,
    fail_launches: u32,
    fail_stops: HashSet<String>,
    list_error: bool,
    launches: Vec<(String, NodeType)>,
    stopped: Vec<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` launch calls fail.
    pub async fn fail_next_launches(&self, n: u32) {
        self.inner.lock().await.fail_launches = n;
    }

    /// Add latency to every subsequent launch call.
    pub async fn set_launch_delay(&self, delay: std::time::Duration) {
        self.inner.lock().await.launch_delay = Some(delay);
    }

    /// Make every stop call for `id` fail.
    pub async fn fail_stop(&self, id: &str) {
        self.inner.lock().await.fail_stops.insert(id.to_string());
    }

    /// Put the running-workloads listing into (or out of) an error state.
    pub async fn set_list_error(&self, on: bool) {
        self.inner.lock().await.list_error = on;
    }

    /// Steady health verdict for a hostname.
    pub async fn set_health(&self, hostname: &str, healthy: bool) {
        self.inner.lock().await.healthy.insert(hostname.to_string(), healthy);
    }

    /// One-shot verdicts consumed before the steady value applies.
    pub async fn queue_health(&self, hostname: &str, verdicts: Vec<bool>) {
        self.inner
            .lock()
            .await
            .health_script
            .insert(hostname.to_string(), verdicts.into());
    }

    /// Drop a workload from the running set without a stop call, as the
    /// provider does when a lease expires.
    pub async fn vanish(&self, id: &str) {
        self.inner.lock().await.running.remove(id);
    }

    /// Ordered (id, type) pairs of successful launches.
    pub async fn launches(&self) -> Vec<(String, NodeType)> {
        self.inner.lock().await.launches.clone()
    }

    pub async fn stopped_ids(&self) -> Vec<String> {
        self.inner.lock().await.stopped.clone()
    }

    pub async fn running_count(&self) -> usize {
        self.inner.lock().await.running.len()
    }

    pub async fn health_checks(&self, hostname: &str) -> u32 {
        self.inner
            .lock()
            .await
            .health_checks
            .get(hostname)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    async fn launch(
        &self,
        node_type: NodeType,
        expires_at: DateTime<Utc>,
    ) -> Result<LaunchedWorkload, ProviderError> {
        let delay = self.inner.lock().await.launch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock().await;
        if inner.fail_launches > 0 {
            inner.fail_launches -= 1;
            return Err(ProviderError::Http {
                status: 500,
                body: "scripted launch failure".to_string(),
            });
        }
        inner.seq += 1;
        let id = uuid::Uuid::new_v4().to_string();
        let hostname = format!("node-{}.stratus.test", inner.seq);
        inner.running.insert(
            id.clone(),
            WorkloadInfo {
                id: id.clone(),
                hostname: hostname.clone(),
                workload_type: Some(node_type.as_workload_type().to_string()),
            },
        );
        inner.healthy.insert(hostname.clone(), true);
        inner.launches.push((id.clone(), node_type));
        Ok(LaunchedWorkload {
            id,
            hostname,
            node_type,
            expires_at,
        })
    }

    async fn stop(&self, id: &str) -> Result<StopReceipt, ProviderError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_stops.contains(id) {
            return Err(ProviderError::Http {
                status: 500,
                body: "scripted stop failure".to_string(),
            });
        }
        inner.running.remove(id);
        inner.stopped.push(id.to_string());
        Ok(StopReceipt {
            stopped_at: Utc::now(),
            refund_amount: 0.0,
        })
    }

    async fn list_running(&self) -> Result<Vec<WorkloadInfo>, ProviderError> {
        let inner = self.inner.lock().await;
        if inner.list_error {
            return Err(ProviderError::Transport("scripted list failure".to_string()));
        }
        Ok(inner.running.values().cloned().collect())
    }

    async fn health_check(&self, hostname: &str) -> HealthVerdict {
        let mut inner = self.inner.lock().await;
        *inner.health_checks.entry(hostname.to_string()).or_insert(0) += 1;
        let scripted = inner
            .health_script
            .get_mut(hostname)
            .and_then(|q| q.pop_front());
        let healthy = match scripted {
            Some(v) => v,
            None => inner.healthy.get(hostname).copied().unwrap_or(false),
        };
        if healthy {
            HealthVerdict::Healthy
        } else {
            HealthVerdict::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_then_list_and_stop() {
        let provider = MockProvider::new();
        let lw = provider
            .launch(NodeType::Fast, Utc::now())
            .await
            .expect("launch");
        let listed = provider.list_running().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, lw.id);

        provider.stop(&lw.id).await.expect("stop");
        assert!(provider.list_running().await.expect("list").is_empty());
        assert_eq!(provider.stopped_ids().await, vec![lw.id]);
    }

    #[tokio::test]
    async fn scripted_failures() {
        let provider = MockProvider::new();
        provider.fail_next_launches(1).await;
        assert!(provider.launch(NodeType::Fast, Utc::now()).await.is_err());
        assert!(provider.launch(NodeType::Fast, Utc::now()).await.is_ok());

        provider.set_list_error(true).await;
        assert!(provider.list_running().await.is_err());
    }

    #[tokio::test]
    async fn health_queue_drains_to_steady_value() {
        let provider = MockProvider::new();
        let lw = provider
            .launch(NodeType::Fast, Utc::now())
            .await
            .expect("launch");
        provider.queue_health(&lw.hostname, vec![false]).await;

        assert_eq!(
            provider.health_check(&lw.hostname).await,
            HealthVerdict::Unhealthy
        );
        assert_eq!(
            provider.health_check(&lw.hostname).await,
            HealthVerdict::Healthy
        );
        assert_eq!(provider.health_checks(&lw.hostname).await, 2);
    }
}
