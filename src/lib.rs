// Core modules
pub mod config;
pub mod execution;
pub mod gateway;
pub mod models;
pub mod risk;
pub mod scheduler;
pub mod strategy;

// Re-export commonly used types
pub use config::BotConfig;
pub use gateway::{Gateway, GatewayError};
pub use models::*;
pub use scheduler::Scheduler;
