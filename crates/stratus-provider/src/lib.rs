pub mod http;
pub mod mock;
pub mod types;

pub use http::HttpProvider;
pub use mock::MockProvider;
pub use types::{HealthVerdict, LaunchedWorkload, Provider, StopReceipt, WorkloadInfo};
