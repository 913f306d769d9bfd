//! Performance summary over simulation records.

use super::backtest::SimulationRecord;
use serde::Serialize;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub cumulative_return: f64,
    pub sharpe: f64,
    /// Worst peak-to-trough decline, as a non-positive fraction.
    pub max_drawdown: f64,
    pub turnover_sum: f64,
    pub cost_sum: f64,
    pub periods: usize,
}

impl Report {
    pub fn compute(records: &[SimulationRecord], risk_free_rate: f64) -> Self {
        let equity: Vec<f64> = records.iter().map(|r| r.equity).collect();
        let returns: Vec<f64> = records.iter().map(|r| r.ret).collect();

        Self {
            cumulative_return: equity.last().map(|e| e - 1.0).unwrap_or(0.0),
            sharpe: sharpe_ratio(&returns, risk_free_rate),
            max_drawdown: max_drawdown(&equity),
            turnover_sum: records.iter().map(|r| r.turnover).sum(),
            cost_sum: records.iter().map(|r| r.cost).sum(),
            periods: records.len(),
        }
    }
}

/// Annualised Sharpe ratio of daily returns. NaN returns are ignored; zero
/// dispersion (or fewer than two returns) yields 0.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns
        .iter()
        .filter(|r| !r.is_nan())
        .map(|r| r - daily_rf)
        .collect();
    if excess.len() < 2 {
        return 0.0;
    }

    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;
    let variance = excess.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std == 0.0 || !std.is_finite() {
        return 0.0;
    }
    TRADING_DAYS_PER_YEAR.sqrt() * mean / std
}

/// Minimum of `equity / running_max - 1`; 0 for an empty or rising curve.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &e in equity {
        if e > peak {
            peak = e;
        }
        if peak > 0.0 {
            let dd = e / peak - 1.0;
            if dd < worst {
                worst = dd;
            }
        }
    }
    worst
}

/// Drawdown of the last point relative to its running peak.
pub fn current_drawdown(equity: &[f64]) -> f64 {
    let peak = equity.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    match equity.last() {
        Some(&last) if peak > 0.0 => last / peak - 1.0,
        _ => 0.0,
    }
}
