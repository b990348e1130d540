use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stratus_common::{NodeType, ProviderError};

use crate::types::{HealthVerdict, LaunchedWorkload, Provider, StopReceipt, WorkloadInfo};

/// Per-request timeout for every provider call, including health probes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const API_KEY_HEADER: &str = "X-C3-API-KEY";

/// HTTP client for the hosted provisioning API.
pub struct HttpProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct LaunchRequest<'a> {
    #[serde(rename = "type")]
    workload_type: &'a str,
    expires: i64,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    workload: String,
    node: String,
}

#[derive(Debug, Serialize)]
struct StopRequest<'a> {
    workload: &'a str,
}

#[derive(Debug, Deserialize)]
struct StopResponse {
    stopped: i64,
    #[serde(default)]
    refund_amount: f64,
}

#[derive(Debug, Serialize)]
struct ListRequest {
    running: bool,
}

#[derive(Debug, Deserialize)]
struct WorkloadEntry {
    workload: String,
    node: String,
    #[serde(rename = "type")]
    workload_type: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<R>().await.map_err(map_reqwest)
    }
}

fn map_reqwest(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(e.to_string())
    }
}

#[async_trait::async_trait]
impl Provider for HttpProvider {
    async fn launch(
        &self,
        node_type: NodeType,
        expires_at: DateTime<Utc>,
    ) -> Result<LaunchedWorkload, ProviderError> {
        let req = LaunchRequest {
            workload_type: node_type.as_workload_type(),
            expires: expires_at.timestamp(),
        };
        let resp: LaunchResponse = self.post_json("/launch", &req).await?;
        Ok(LaunchedWorkload {
            id: resp.workload,
            hostname: resp.node,
            node_type,
            expires_at,
        })
    }

    async fn stop(&self, id: &str) -> Result<StopReceipt, ProviderError> {
        let resp: StopResponse = self.post_json("/stop", &StopRequest { workload: id }).await?;
        Ok(StopReceipt {
            stopped_at: DateTime::from_timestamp(resp.stopped, 0).unwrap_or_else(Utc::now),
            refund_amount: resp.refund_amount,
        })
    }

    async fn list_running(&self) -> Result<Vec<WorkloadInfo>, ProviderError> {
        let entries: Vec<WorkloadEntry> =
            self.post_json("/workloads", &ListRequest { running: true }).await?;
        Ok(entries
            .into_iter()
            .map(|e| WorkloadInfo {
                id: e.workload,
                hostname: e.node,
                workload_type: e.workload_type,
            })
            .collect())
    }

    async fn health_check(&self, hostname: &str) -> HealthVerdict {
        let url = format!("https://{hostname}");
        match self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => HealthVerdict::Healthy,
            Ok(resp) => {
                tracing::warn!(hostname=%hostname, status=%resp.status(), "health probe rejected");
                HealthVerdict::Unhealthy
            }
            Err(e) => {
                tracing::warn!(hostname=%hostname, error=%e, "health probe failed");
                HealthVerdict::Unhealthy
            }
        }
    }
}
