pub mod size_monitor;

pub use size_monitor::{SizeMonitor, ThresholdAlert};
