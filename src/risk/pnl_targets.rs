use crate::gateway::Gateway;
use serde::{Deserialize, Serialize};

/// Account-level profit/loss bounds that end the trading session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMonitor {
    /// Stop once floating P/L reaches this (inclusive)
    pub profit_target: f64,
    /// Stop once floating P/L falls to this (inclusive, negative)
    pub loss_target: f64,
}

impl Default for RiskMonitor {
    fn default() -> Self {
        Self {
            profit_target: 100.0,
            loss_target: -10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    ProfitTarget,
    LossTarget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskVerdict {
    Continue,
    Stop(StopReason),
}

/// Outcome of one account check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCheck {
    /// `None` when the account could not be read
    pub floating_profit: Option<f64>,
    pub verdict: RiskVerdict,
}

impl RiskMonitor {
    pub fn new(profit_target: f64, loss_target: f64) -> Self {
        Self {
            profit_target,
            loss_target,
        }
    }

    /// Compare a floating P/L value against both bounds
    pub fn evaluate(&self, floating_profit: f64) -> Result<(), StopReason> {
        if floating_profit >= self.profit_target {
            return Err(StopReason::ProfitTarget);
        }

        if floating_profit <= self.loss_target {
            return Err(StopReason::LossTarget);
        }

        Ok(())
    }

    /// Read the account and decide whether trading should stop
    ///
    /// Fails open: if the account can't be read, trading continues.
    pub async fn check<G: Gateway>(&self, gateway: &G) -> RiskCheck {
        let account = match gateway.account().await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!("Failed to fetch account info: {} (continuing)", e);
                return RiskCheck {
                    floating_profit: None,
                    verdict: RiskVerdict::Continue,
                };
            }
        };

        let profit = account.profit;
        tracing::info!("Cumulative Profit/Loss: {:.2} {}", profit, account.currency);

        let verdict = match self.evaluate(profit) {
            Ok(()) => RiskVerdict::Continue,
            Err(StopReason::ProfitTarget) => {
                tracing::info!(
                    "🎯 Profit target of {:.2} reached. Stopping trading.",
                    self.profit_target
                );
                RiskVerdict::Stop(StopReason::ProfitTarget)
            }
            Err(StopReason::LossTarget) => {
                tracing::warn!(
                    "🛑 Loss target of {:.2} reached. Stopping trading.",
                    self.loss_target
                );
                RiskVerdict::Stop(StopReason::LossTarget)
            }
        };

        RiskCheck {
            floating_profit: Some(profit),
            verdict,
        }
    }
}
