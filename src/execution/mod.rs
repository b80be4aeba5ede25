// Market data collection and order execution module
pub mod bar_feed;
pub mod order;

pub use bar_feed::BarFeed;
pub use order::{protective_levels, OrderError, OrderSettings, OrderSubmitter, ProtectiveLevels};
