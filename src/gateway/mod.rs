// Terminal gateway: market data, account state and order routing
pub mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod sim;

pub use http::HttpGateway;
#[cfg(any(test, feature = "test-support"))]
pub use sim::{GatewayCall, SimulatedGateway};

use crate::models::{AccountSnapshot, Quote, RawRate, SymbolInfo, Timeframe, TradeRequest, TradeResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("terminal unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("terminal rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("no data returned for {0}")]
    NoData(String),

    #[error("malformed terminal response: {0}")]
    Malformed(String),

    #[error("gateway not connected")]
    NotConnected,
}

/// Everything the bot needs from the brokerage terminal
///
/// Calls are made strictly one at a time from the scheduler, so
/// implementations don't need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    /// Attach to the terminal; must succeed before any other call
    async fn connect(&self) -> Result<(), GatewayError>;

    /// Release the terminal connection
    async fn disconnect(&self) -> Result<(), GatewayError>;

    /// Most recent `count` bars ending now, oldest first
    async fn recent_rates(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<RawRate>, GatewayError>;

    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError>;

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, GatewayError>;

    async fn send_order(&self, request: &TradeRequest) -> Result<TradeResult, GatewayError>;

    async fn account(&self) -> Result<AccountSnapshot, GatewayError>;
}
