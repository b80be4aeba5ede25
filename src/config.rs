use crate::execution::{BarFeed, OrderSettings};
use crate::models::Timeframe;
use crate::risk::RiskMonitor;
use anyhow::{bail, Context};
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Startup configuration, assembled once and never mutated
///
/// Sources, lowest priority first: built-in defaults, `pipbot.toml` (or the
/// file given on the command line), `PIPBOT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub symbol: String,
    pub lot_size: f64,
    pub sl_pips: Option<u32>,
    pub tp_pips: Option<u32>,
    pub profit_target: f64,
    pub loss_target: f64,
    pub bar_count: usize,
    pub timeframe: Timeframe,
    /// Pause between cycles. 30s is what the bot has always run with,
    /// although older notes mention 60s.
    pub poll_interval_secs: u64,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
    pub gateway_url: String,
    pub gateway_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "GOLD".to_string(),
            lot_size: 0.15,
            sl_pips: Some(100),
            tp_pips: Some(200),
            profit_target: 100.0,
            loss_target: -10.0,
            bar_count: 100,
            timeframe: Timeframe::M1,
            poll_interval_secs: 30,
            deviation: 10,
            magic: 123456,
            comment: "pipbot".to_string(),
            gateway_url: "http://127.0.0.1:8228".to_string(),
            gateway_token: None,
            request_timeout_secs: None,
        }
    }
}

impl BotConfig {
    /// Load from file + environment and validate
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("pipbot").required(false),
        };

        let builder = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("PIPBOT").try_parsing(true));

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbol.trim().is_empty() {
            bail!("symbol must not be empty");
        }
        if self.lot_size <= 0.0 {
            bail!("lot_size must be positive, got {}", self.lot_size);
        }
        if self.profit_target <= self.loss_target {
            bail!(
                "profit_target ({}) must be above loss_target ({})",
                self.profit_target,
                self.loss_target
            );
        }
        if self.bar_count < 2 {
            bail!("bar_count must be at least 2, got {}", self.bar_count);
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn order_settings(&self) -> OrderSettings {
        OrderSettings {
            symbol: self.symbol.clone(),
            volume: self.lot_size,
            sl_pips: self.sl_pips,
            tp_pips: self.tp_pips,
            deviation: self.deviation,
            magic: self.magic,
            comment: self.comment.clone(),
        }
    }

    pub fn risk_monitor(&self) -> RiskMonitor {
        RiskMonitor::new(self.profit_target, self.loss_target)
    }

    pub fn bar_feed(&self) -> BarFeed {
        BarFeed::new(self.symbol.clone(), self.timeframe, self.bar_count)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::FileFormat;

    fn from_toml(toml: &str) -> anyhow::Result<BotConfig> {
        BotConfig::from_builder(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").unwrap();

        assert_eq!(config.symbol, "GOLD");
        assert_eq!(config.lot_size, 0.15);
        assert_eq!(config.sl_pips, Some(100));
        assert_eq!(config.tp_pips, Some(200));
        assert_eq!(config.profit_target, 100.0);
        assert_eq!(config.loss_target, -10.0);
        assert_eq!(config.bar_count, 100);
        assert_eq!(config.timeframe, Timeframe::M1);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_file_overrides() {
        let config = from_toml(
            r#"
            symbol = "XAUUSD"
            lot_size = 0.5
            loss_target = -50
            timeframe = "M15"
            poll_interval_secs = 60
            request_timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.symbol, "XAUUSD");
        assert_eq!(config.lot_size, 0.5);
        assert_eq!(config.loss_target, -50.0);
        assert_eq!(config.timeframe, Timeframe::M15);
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        // Untouched fields keep their defaults
        assert_eq!(config.magic, 123456);
    }

    #[test]
    fn test_derived_components() {
        let config = from_toml("sl_pips = 50").unwrap();

        let settings = config.order_settings();
        assert_eq!(settings.sl_pips, Some(50));
        assert_eq!(settings.volume, 0.15);

        let monitor = config.risk_monitor();
        assert_eq!(monitor.profit_target, 100.0);

        assert_eq!(config.bar_feed().symbol(), "GOLD");
    }

    #[test]
    fn test_rejects_inverted_targets() {
        let err = from_toml("profit_target = -20\nloss_target = -10").unwrap_err();
        assert!(err.to_string().contains("profit_target"));
    }

    #[test]
    fn test_rejects_short_bar_window() {
        assert!(from_toml("bar_count = 1").is_err());
    }

    #[test]
    fn test_rejects_non_positive_lot() {
        assert!(from_toml("lot_size = 0").is_err());
    }
}
