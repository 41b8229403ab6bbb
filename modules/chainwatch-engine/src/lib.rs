pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod stats;

pub use monitor::Monitor;
pub use notify::{route_pending, AlertChannel, ConsoleChannel};
pub use scheduler::{Command, MonitorState, Runner, Scheduler, StatusReport};
pub use stats::RunStats;
