pub mod app_state;
pub mod monitor;
pub mod shutdown;

pub use app_state::AppState;
pub use monitor::{SweepReport, spawn_monitor, sweep};
pub use shutdown::shutdown_signal;
