use crate::gateway::{Gateway, GatewayError};
use crate::models::{
    Direction, OrderFilling, OrderTime, OrderType, TradeAction, TradeRequest, TradeResult,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid action '{0}': must be BUY or SELL")]
    InvalidDirection(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Fixed order parameters for one instrument
#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub symbol: String,
    pub volume: f64,
    /// Stop-loss distance in points; `None` or 0 leaves SL unset
    pub sl_pips: Option<u32>,
    /// Take-profit distance in points; `None` or 0 leaves TP unset
    pub tp_pips: Option<u32>,
    /// Allowed slippage in points
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
}

/// Protective levels for a market order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectiveLevels {
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Convert pip distances into absolute SL/TP prices
///
/// BUY fills at `price` (the ask): SL below, TP above.
/// SELL fills at `price` (the bid): SL above, TP below.
/// A missing or zero distance yields 0.0, which the terminal reads as "unset".
pub fn protective_levels(
    direction: Direction,
    price: f64,
    point: f64,
    sl_pips: Option<u32>,
    tp_pips: Option<u32>,
) -> ProtectiveLevels {
    let offset = |pips: Option<u32>| pips.filter(|&p| p > 0).map(|p| p as f64 * point);

    let (stop_loss, take_profit) = match direction {
        Direction::Buy => (
            offset(sl_pips).map(|d| price - d),
            offset(tp_pips).map(|d| price + d),
        ),
        Direction::Sell => (
            offset(sl_pips).map(|d| price + d),
            offset(tp_pips).map(|d| price - d),
        ),
    };

    ProtectiveLevels {
        price,
        stop_loss: stop_loss.unwrap_or(0.0),
        take_profit: take_profit.unwrap_or(0.0),
    }
}

fn round_to_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Places market orders with fixed SL/TP offsets
pub struct OrderSubmitter {
    settings: OrderSettings,
}

impl OrderSubmitter {
    pub fn new(settings: OrderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &OrderSettings {
        &self.settings
    }

    /// Place an order for a textual action ("BUY" / "SELL")
    ///
    /// Anything else is rejected before the gateway is touched.
    pub async fn place_trade<G: Gateway>(
        &self,
        gateway: &G,
        action: &str,
    ) -> Result<TradeResult, OrderError> {
        let direction = match action.parse::<Direction>() {
            Ok(direction) => direction,
            Err(action) => {
                tracing::error!("Invalid action '{}'. Must be 'BUY' or 'SELL'.", action);
                return Err(OrderError::InvalidDirection(action));
            }
        };

        self.submit(gateway, direction).await
    }

    /// Build and send one market order
    pub async fn submit<G: Gateway>(
        &self,
        gateway: &G,
        direction: Direction,
    ) -> Result<TradeResult, OrderError> {
        let request = self.build_request(gateway, direction).await?;

        tracing::info!(
            symbol = %request.symbol,
            side = %direction,
            volume = request.volume,
            price = request.price,
            sl = request.sl,
            tp = request.tp,
            "Sending market order"
        );

        let result = match gateway.send_order(&request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(symbol = %request.symbol, "Order send failed: {}", e);
                return Err(e.into());
            }
        };

        if result.is_done() {
            tracing::info!("Order result: {:?}", result);
        } else {
            tracing::warn!("Order result: {:?}", result);
        }

        Ok(result)
    }

    async fn build_request<G: Gateway>(
        &self,
        gateway: &G,
        direction: Direction,
    ) -> Result<TradeRequest, GatewayError> {
        let symbol = &self.settings.symbol;
        let quote = gateway.quote(symbol).await?;
        let info = gateway.symbol_info(symbol).await?;

        let price = match direction {
            Direction::Buy => quote.ask,
            Direction::Sell => quote.bid,
        };
        let levels = protective_levels(
            direction,
            price,
            info.point,
            self.settings.sl_pips,
            self.settings.tp_pips,
        );

        Ok(TradeRequest {
            action: TradeAction::Deal,
            symbol: symbol.clone(),
            volume: self.settings.volume,
            order_type: OrderType::from(direction),
            price: levels.price,
            deviation: self.settings.deviation,
            sl: round_to_digits(levels.stop_loss, info.digits),
            tp: round_to_digits(levels.take_profit, info.digits),
            magic: self.settings.magic,
            comment: self.settings.comment.clone(),
            type_time: OrderTime::GoodTillCancelled,
            type_filling: OrderFilling::ImmediateOrCancel,
        })
    }
}
