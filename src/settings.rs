//! Runtime settings assembled from the INI config and environment.
//!
//! Missing keys take defaults; present but out-of-range values are rejected
//! with `ConfigInvalid`. The cost rates can be overridden through
//! `TX_FEE_BPS`, `TX_TAX_BPS` and `SLIPPAGE_BPS`.

use crate::adapters::twse_adapter::TWSE_BASE_URL;
use crate::adapters::yahoo_adapter::YAHOO_BASE_URL;
use crate::domain::backtest::CostModel;
use crate::domain::error::QuantError;
use crate::domain::retriever::StalePolicy;
use crate::domain::retry::RetryPolicy;
use crate::domain::risk::KillSwitch;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CACHE_DIR: &str = "data/raw/twse";
pub const DEFAULT_FEE_BPS: f64 = 2.8;
pub const DEFAULT_TAX_BPS: f64 = 30.0;
pub const DEFAULT_SLIPPAGE_BPS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub cache_dir: PathBuf,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub request_interval: Duration,
    pub fallback: bool,
    pub stale_policy: StalePolicy,
    pub twse_base_url: String,
    pub yahoo_base_url: String,
    pub market_suffix: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            request_interval: Duration::ZERO,
            fallback: true,
            stale_policy: StalePolicy::FailHard,
            twse_base_url: TWSE_BASE_URL.to_string(),
            yahoo_base_url: YAHOO_BASE_URL.to_string(),
            market_suffix: ".TW".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data: DataSettings,
    pub costs: CostModel,
    pub kill_switch: KillSwitch,
    pub risk_free_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataSettings::default(),
            costs: CostModel::new(DEFAULT_FEE_BPS, DEFAULT_TAX_BPS, DEFAULT_SLIPPAGE_BPS),
            kill_switch: KillSwitch::default(),
            risk_free_rate: 0.0,
        }
    }
}

impl Settings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuantError> {
        let defaults = Settings::default();
        let data = build_data_settings(config, &defaults.data)?;

        let costs = CostModel::new(
            non_negative(config, "costs", "fee_bps", defaults.costs.fee_bps)?,
            non_negative(config, "costs", "tax_bps", defaults.costs.tax_bps)?,
            non_negative(config, "costs", "slippage_bps", defaults.costs.slippage_bps)?,
        );

        let kill_switch = KillSwitch {
            pnl_limit: non_positive(config, "risk", "pnl_limit", defaults.kill_switch.pnl_limit)?,
            drawdown_limit: non_positive(
                config,
                "risk",
                "drawdown_limit",
                defaults.kill_switch.drawdown_limit,
            )?,
        };

        let risk_free_rate = config.get_double("risk", "risk_free_rate", defaults.risk_free_rate);
        if !(0.0..1.0).contains(&risk_free_rate) {
            return Err(invalid("risk", "risk_free_rate", "must be between 0 and 1"));
        }

        Ok(Self {
            data,
            costs,
            kill_switch,
            risk_free_rate,
        })
    }

    /// Apply cost overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), QuantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut f64); 3] = [
            ("TX_FEE_BPS", &mut self.costs.fee_bps),
            ("TX_TAX_BPS", &mut self.costs.tax_bps),
            ("SLIPPAGE_BPS", &mut self.costs.slippage_bps),
        ];
        for (var, slot) in overrides {
            if let Some(raw) = lookup(var) {
                let value: f64 = raw.trim().parse().map_err(|_| QuantError::ConfigInvalid {
                    section: "env".into(),
                    key: var.into(),
                    reason: format!("'{raw}' is not a number"),
                })?;
                if value < 0.0 {
                    return Err(QuantError::ConfigInvalid {
                        section: "env".into(),
                        key: var.into(),
                        reason: "must be non-negative".into(),
                    });
                }
                *slot = value;
            }
        }
        Ok(())
    }
}

fn build_data_settings(
    config: &dyn ConfigPort,
    defaults: &DataSettings,
) -> Result<DataSettings, QuantError> {
    let cache_dir = config
        .get_string("data", "cache_dir")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| defaults.cache_dir.clone());

    let timeout_secs = config.get_int("data", "timeout_secs", defaults.timeout.as_secs() as i64);
    if timeout_secs <= 0 {
        return Err(invalid("data", "timeout_secs", "must be positive"));
    }

    let max_tries = config.get_int("data", "max_tries", defaults.retry.max_tries as i64);
    if !(1..=10).contains(&max_tries) {
        return Err(invalid("data", "max_tries", "must be between 1 and 10"));
    }

    let backoff_ms = config.get_int(
        "data",
        "backoff_ms",
        defaults.retry.base_delay.as_millis() as i64,
    );
    if backoff_ms < 0 {
        return Err(invalid("data", "backoff_ms", "must be non-negative"));
    }

    let interval_ms = config.get_int(
        "data",
        "request_interval_ms",
        defaults.request_interval.as_millis() as i64,
    );
    if interval_ms < 0 {
        return Err(invalid("data", "request_interval_ms", "must be non-negative"));
    }

    let stale_policy = match config.get_string("data", "stale_policy") {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<StalePolicy>()
            .map_err(|reason| invalid("data", "stale_policy", &reason))?,
        _ => defaults.stale_policy,
    };

    let url = |key: &str, default: &str| -> Result<String, QuantError> {
        match config.get_string("data", key) {
            Some(raw) if !raw.trim().is_empty() => {
                let raw = raw.trim();
                if raw.starts_with("http://") || raw.starts_with("https://") {
                    Ok(raw.trim_end_matches('/').to_string())
                } else {
                    Err(invalid("data", key, "must be an http(s) URL"))
                }
            }
            _ => Ok(default.to_string()),
        }
    };

    Ok(DataSettings {
        cache_dir,
        timeout: Duration::from_secs(timeout_secs as u64),
        retry: RetryPolicy {
            max_tries: max_tries as u32,
            base_delay: Duration::from_millis(backoff_ms as u64),
        },
        request_interval: Duration::from_millis(interval_ms as u64),
        fallback: config.get_bool("data", "fallback", defaults.fallback),
        stale_policy,
        twse_base_url: url("twse_base_url", &defaults.twse_base_url)?,
        yahoo_base_url: url("yahoo_base_url", &defaults.yahoo_base_url)?,
        market_suffix: config
            .get_string("data", "market_suffix")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| defaults.market_suffix.clone()),
    })
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, QuantError> {
    let value = config.get_double(section, key, default);
    if value < 0.0 || !value.is_finite() {
        return Err(invalid(section, key, "must be non-negative"));
    }
    Ok(value)
}

fn non_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, QuantError> {
    let value = config.get_double(section, key, default);
    if value > 0.0 || !value.is_finite() {
        return Err(invalid(section, key, "must be zero or negative"));
    }
    Ok(value)
}

fn invalid(section: &str, key: &str, reason: &str) -> QuantError {
    QuantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
