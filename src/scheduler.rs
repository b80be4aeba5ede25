use crate::execution::{BarFeed, OrderError, OrderSubmitter};
use crate::gateway::{Gateway, GatewayError};
use crate::models::{Direction, Signal, TradeResult};
use crate::risk::{RiskMonitor, RiskVerdict, StopReason};
use crate::strategy;
use std::future::Future;
use std::time::Duration;

/// What happened in a single cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// A profit or loss bound was crossed; the session ends
    Stopped(StopReason),
    /// No usable bars this cycle
    NoData(Option<GatewayError>),
    /// Bars fetched, condition not met
    NoSignal,
    OrderPlaced(TradeResult),
    OrderFailed(OrderError),
}

/// Why the run loop ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitReason {
    RiskLimit(StopReason),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub exit: ExitReason,
    /// Floating P/L seen on the last successful account read
    pub last_profit: Option<f64>,
}

/// Risk check → fetch → evaluate → order, then pause; repeat until stopped
pub struct Scheduler<G: Gateway> {
    gateway: G,
    risk: RiskMonitor,
    feed: BarFeed,
    submitter: OrderSubmitter,
    poll_interval: Duration,
    last_profit: Option<f64>,
}

impl<G: Gateway> Scheduler<G> {
    pub fn new(
        gateway: G,
        risk: RiskMonitor,
        feed: BarFeed,
        submitter: OrderSubmitter,
        poll_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            risk,
            feed,
            submitter,
            poll_interval,
            last_profit: None,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run one fetch → decide → act pass
    ///
    /// At most one order is submitted per cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        match self.assess().await {
            Assessment::Done(outcome) => outcome,
            Assessment::Buy => self.place_buy().await,
        }
    }

    /// Risk check, bar fetch and signal; everything before an order
    async fn assess(&mut self) -> Assessment {
        let check = self.risk.check(&self.gateway).await;

        if let Some(profit) = check.floating_profit {
            if let Some(previous) = self.last_profit {
                tracing::debug!(
                    previous = previous,
                    current = profit,
                    "P/L change since last cycle: {:+.2}",
                    profit - previous
                );
            }
            self.last_profit = Some(profit);
        }

        if let RiskVerdict::Stop(reason) = check.verdict {
            return Assessment::Done(CycleOutcome::Stopped(reason));
        }

        let bars = match self.feed.fetch(&self.gateway).await {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                tracing::info!("No data fetched for analysis.");
                return Assessment::Done(CycleOutcome::NoData(None));
            }
            Err(e) => {
                tracing::info!("No data fetched for analysis: {}", e);
                return Assessment::Done(CycleOutcome::NoData(Some(e)));
            }
        };

        match strategy::evaluate(&bars) {
            Signal::Buy => Assessment::Buy,
            Signal::Hold => {
                tracing::info!("Condition not met: No trade executed.");
                Assessment::Done(CycleOutcome::NoSignal)
            }
        }
    }

    async fn place_buy(&self) -> CycleOutcome {
        tracing::info!("📈 Condition met: Placing BUY order");
        match self.submitter.submit(&self.gateway, Direction::Buy).await {
            Ok(result) => CycleOutcome::OrderPlaced(result),
            Err(e) => CycleOutcome::OrderFailed(e),
        }
    }

    fn summary(&self, cycles: u64, exit: ExitReason) -> RunSummary {
        RunSummary {
            cycles,
            exit,
            last_profit: self.last_profit,
        }
    }

    /// Connect, loop until a risk bound is hit or `shutdown` resolves, then
    /// release the gateway
    ///
    /// `shutdown` is honoured during the risk check, the bar fetch and the
    /// pause, so a hung terminal call can't block it. Order submission is
    /// never interrupted. The gateway is released on every exit path once
    /// connected; a failed connect is returned as an error.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunSummary, GatewayError>
    where
        F: Future<Output = ()>,
    {
        self.gateway.connect().await?;
        tracing::info!(
            symbol = %self.feed.symbol(),
            interval_secs = self.poll_interval.as_secs(),
            "🔄 Trading loop starting"
        );

        let summary = self.run_loop(shutdown).await;

        if let Err(e) = self.gateway.disconnect().await {
            tracing::warn!("Failed to release terminal connection: {}", e);
        }

        tracing::info!(
            cycles = summary.cycles,
            exit = ?summary.exit,
            "👋 Trading loop stopped"
        );
        Ok(summary)
    }

    async fn run_loop<F>(&mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0u64;

        loop {
            cycles += 1;
            tracing::debug!(cycle = cycles, "Cycle start");

            let assessment = tokio::select! {
                assessment = self.assess() => Some(assessment),
                _ = &mut shutdown => None,
            };

            let outcome = match assessment {
                Some(Assessment::Done(outcome)) => outcome,
                Some(Assessment::Buy) => self.place_buy().await,
                None => {
                    tracing::info!("⚠️  Shutdown requested mid-cycle, leaving trading loop");
                    return self.summary(cycles, ExitReason::Shutdown);
                }
            };

            if let CycleOutcome::Stopped(reason) = outcome {
                return self.summary(cycles, ExitReason::RiskLimit(reason));
            }

            let interrupted = tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => false,
                _ = &mut shutdown => true,
            };
            if interrupted {
                tracing::info!("⚠️  Shutdown requested, leaving trading loop");
                return self.summary(cycles, ExitReason::Shutdown);
            }
        }
    }
}

/// Result of the interruptible part of a cycle
enum Assessment {
    Done(CycleOutcome),
    Buy,
}
