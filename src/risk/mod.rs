// Risk management module
pub mod pnl_targets;

pub use pnl_targets::{RiskCheck, RiskMonitor, RiskVerdict, StopReason};
