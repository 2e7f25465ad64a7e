pub mod service;
pub mod signal;

pub use service::{BackgroundService, CycleError, CycleReport, CycleStage, RunSummary};
pub use signal::{shutdown_signal, spawn_shutdown_listener};
