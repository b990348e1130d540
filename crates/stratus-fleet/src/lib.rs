pub mod controller;
mod monitor;
pub mod shutdown;
mod state;

pub use controller::{FleetConfig, FleetController};
pub use shutdown::ShutdownCoordinator;
