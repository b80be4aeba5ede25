use crate::gateway::{Gateway, GatewayError};
use crate::models::{Bar, RawRate, Timeframe};
use chrono::DateTime;

/// Fetches the latest bars for one instrument
///
/// An error or an empty result means "skip this cycle", never "no trade".
/// There is no retry; the next cycle simply asks again.
pub struct BarFeed {
    symbol: String,
    timeframe: Timeframe,
    count: usize,
}

impl BarFeed {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, count: usize) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            count,
        }
    }

    /// Fetch the most recent bars, oldest first
    pub async fn fetch<G: Gateway>(&self, gateway: &G) -> Result<Vec<Bar>, GatewayError> {
        match self.fetch_bars(gateway).await {
            Ok(bars) => {
                tracing::debug!(
                    symbol = %self.symbol,
                    bars = bars.len(),
                    "Fetched bars"
                );
                Ok(bars)
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %self.symbol,
                    timeframe = %self.timeframe,
                    "Failed to fetch data: {}",
                    e
                );
                Err(e)
            }
        }
    }

    async fn fetch_bars<G: Gateway>(&self, gateway: &G) -> Result<Vec<Bar>, GatewayError> {
        let rates = gateway
            .recent_rates(&self.symbol, self.timeframe, self.count)
            .await?;

        let mut bars = rates
            .iter()
            .map(to_bar)
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|bar| bar.timestamp);
        Ok(bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

fn to_bar(rate: &RawRate) -> Result<Bar, GatewayError> {
    let timestamp = DateTime::from_timestamp(rate.time, 0)
        .ok_or_else(|| GatewayError::Malformed(format!("bar time out of range: {}", rate.time)))?;

    Ok(Bar {
        timestamp,
        open: rate.open,
        high: rate.high,
        low: rate.low,
        close: rate.close,
        volume: rate.tick_volume,
        spread: rate.spread,
    })
}
