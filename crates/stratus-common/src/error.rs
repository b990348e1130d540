use thiserror::Error;

/// Failure talking to the provisioning service.
///
/// These never propagate past the call site that issued the request: launch
/// failures shrink the fleet until the next reconcile, stop failures are
/// logged and skipped, and health probes map every variant to an unhealthy
/// verdict.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,
}
