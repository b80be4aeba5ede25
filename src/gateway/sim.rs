use super::{Gateway, GatewayError};
use crate::models::{
    AccountSnapshot, Quote, RawRate, SymbolInfo, Timeframe, TradeRequest, TradeResult, RETCODE_DONE,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Gateway operation as recorded by `SimulatedGateway`
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Connect,
    Disconnect,
    RecentRates { symbol: String, count: usize },
    Quote(String),
    SymbolInfo(String),
    SendOrder,
    Account,
}

/// Scripted in-memory terminal
///
/// Serves fixed rates/quote/account values and records every call and
/// every submitted order so tests can assert on what the bot did.
pub struct SimulatedGateway {
    rates: Option<Vec<RawRate>>,
    quote: Quote,
    symbol: SymbolInfo,
    profit: Mutex<Option<f64>>,
    profit_script: Mutex<VecDeque<Option<f64>>>,
    connect_fails: bool,
    order_fails: bool,
    account_stall_after: Option<usize>,
    calls: Mutex<Vec<GatewayCall>>,
    orders: Mutex<Vec<TradeRequest>>,
}

impl SimulatedGateway {
    /// Two-decimal instrument quoted at 2000.00 with no open P/L
    pub fn new() -> Self {
        Self {
            rates: Some(Vec::new()),
            quote: Quote {
                bid: 2000.0,
                ask: 2000.0,
            },
            symbol: SymbolInfo {
                name: "GOLD".to_string(),
                point: 0.01,
                digits: 2,
            },
            profit: Mutex::new(Some(0.0)),
            profit_script: Mutex::new(VecDeque::new()),
            connect_fails: false,
            order_fails: false,
            account_stall_after: None,
            calls: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
        }
    }

    /// Serve rate rows built from closes, one minute apart
    pub fn with_closes(mut self, closes: &[f64]) -> Self {
        let start = 1_700_000_000;
        self.rates = Some(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| RawRate {
                    time: start + i as i64 * 60,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    tick_volume: 100,
                    spread: 20,
                    real_volume: 0,
                })
                .collect(),
        );
        self
    }

    pub fn with_rates(mut self, rates: Vec<RawRate>) -> Self {
        self.rates = Some(rates);
        self
    }

    /// Make rate requests fail as if the symbol were unknown
    pub fn without_rates(mut self) -> Self {
        self.rates = None;
        self
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.quote = Quote { bid, ask };
        self
    }

    pub fn with_symbol(mut self, point: f64, digits: u32) -> Self {
        self.symbol.point = point;
        self.symbol.digits = digits;
        self
    }

    /// Floating P/L reported by the account; `None` makes account reads fail
    pub fn with_profit(self, profit: Option<f64>) -> Self {
        self.set_profit(profit);
        self
    }

    /// Successive account reads return these values; the last one sticks
    pub fn with_profit_sequence(self, profits: Vec<Option<f64>>) -> Self {
        *self.profit_script.lock().unwrap() = profits.into();
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.connect_fails = true;
        self
    }

    pub fn failing_orders(mut self) -> Self {
        self.order_fails = true;
        self
    }

    /// Account reads after the first `answered` ones never complete
    pub fn stalling_account_after(mut self, answered: usize) -> Self {
        self.account_stall_after = Some(answered);
        self
    }

    pub fn set_profit(&self, profit: Option<f64>) {
        *self.profit.lock().unwrap() = profit;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn orders(&self) -> Vec<TradeRequest> {
        self.orders.lock().unwrap().clone()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway for SimulatedGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        self.record(GatewayCall::Connect);
        if self.connect_fails {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "terminal not running".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        self.record(GatewayCall::Disconnect);
        Ok(())
    }

    async fn recent_rates(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<RawRate>, GatewayError> {
        self.record(GatewayCall::RecentRates {
            symbol: symbol.to_string(),
            count,
        });

        let rates = self
            .rates
            .as_ref()
            .ok_or_else(|| GatewayError::NoData(symbol.to_string()))?;
        let skip = rates.len().saturating_sub(count);
        Ok(rates[skip..].to_vec())
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError> {
        self.record(GatewayCall::Quote(symbol.to_string()));
        Ok(self.quote)
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, GatewayError> {
        self.record(GatewayCall::SymbolInfo(symbol.to_string()));
        Ok(SymbolInfo {
            name: symbol.to_string(),
            ..self.symbol.clone()
        })
    }

    async fn send_order(&self, request: &TradeRequest) -> Result<TradeResult, GatewayError> {
        self.record(GatewayCall::SendOrder);
        if self.order_fails {
            return Err(GatewayError::Rejected {
                status: 500,
                message: "trade context busy".to_string(),
            });
        }

        let mut orders = self.orders.lock().unwrap();
        orders.push(request.clone());

        Ok(TradeResult {
            retcode: RETCODE_DONE,
            deal: orders.len() as u64,
            order: orders.len() as u64,
            volume: request.volume,
            price: request.price,
            bid: self.quote.bid,
            ask: self.quote.ask,
            comment: "Request executed".to_string(),
        })
    }

    async fn account(&self) -> Result<AccountSnapshot, GatewayError> {
        self.record(GatewayCall::Account);
        if let Some(answered) = self.account_stall_after {
            let reads = self
                .calls()
                .iter()
                .filter(|call| **call == GatewayCall::Account)
                .count();
            if reads > answered {
                std::future::pending::<()>().await;
            }
        }

        if let Some(next) = self.profit_script.lock().unwrap().pop_front() {
            self.set_profit(next);
        }

        let profit = *self.profit.lock().unwrap();
        let profit = profit.ok_or_else(|| GatewayError::NoData("account".to_string()))?;

        Ok(AccountSnapshot {
            balance: 10_000.0,
            equity: 10_000.0 + profit,
            profit,
            currency: "USD".to_string(),
        })
    }
}
