//! Position-generating strategies.
//!
//! Strategies are consumed through generics (`S: Strategy`), so the pipeline
//! is monomorphised per strategy rather than going through a vtable.

use crate::domain::ohlcv::PriceTable;
use crate::domain::position::PositionSeries;

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// One target position per bar of `prices`.
    fn generate_positions(&self, prices: &PriceTable) -> PositionSeries;
}

/// Long when price rose over `lookback` bars, short when it fell, flat
/// otherwise (including the warm-up bars).
#[derive(Debug, Clone, Copy)]
pub struct MomentumStrategy {
    pub lookback: usize,
}

impl MomentumStrategy {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn generate_positions(&self, prices: &PriceTable) -> PositionSeries {
        let closes = prices.closes();
        let momentum = pct_change(&closes, self.lookback);
        prices
            .dates()
            .zip(momentum)
            .map(|(date, m)| (date, signum_or_flat(m)))
            .collect()
    }
}

/// Long below the `lookback`-bar simple moving average, short above it.
#[derive(Debug, Clone, Copy)]
pub struct MeanReversionStrategy {
    pub lookback: usize,
}

impl MeanReversionStrategy {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &'static str {
        "mean-reversion"
    }

    fn generate_positions(&self, prices: &PriceTable) -> PositionSeries {
        let closes = prices.closes();
        let ma = sma(&closes, self.lookback);
        prices
            .dates()
            .zip(closes.iter().zip(ma))
            .map(|(date, (&close, avg))| (date, signum_or_flat(avg - close)))
            .collect()
    }
}

/// Percentage change over `period` bars; NaN during warm-up.
fn pct_change(values: &[f64], period: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i < period {
                f64::NAN
            } else {
                values[i] / values[i - period] - 1.0
            }
        })
        .collect()
}

/// Simple moving average; NaN until `period` values are available.
fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if period > 0 && i >= period {
            sum -= values[i - period];
        }
        if period == 0 || i + 1 < period {
            out.push(f64::NAN);
        } else {
            out.push(sum / period as f64);
        }
    }
    out
}

fn signum_or_flat(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use chrono::NaiveDate;

    fn table(closes: &[f64]) -> PriceTable {
        PriceTable::from_bars(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Bar {
                    date: NaiveDate::from_ymd_opt(2024, 2, (i + 1) as u32).unwrap(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0.0,
                })
                .collect(),
        )
    }

    fn positions_of<S: Strategy>(strategy: &S, closes: &[f64]) -> Vec<f64> {
        strategy
            .generate_positions(&table(closes))
            .iter()
            .map(|(_, v)| v)
            .collect()
    }

    #[test]
    fn momentum_follows_lookback_direction() {
        let pos = positions_of(
            &MomentumStrategy::new(2),
            &[10.0, 11.0, 12.0, 11.0, 10.0, 10.0],
        );
        // warm-up, warm-up, up, flat-vs-2-back, down, down
        assert_eq!(pos, vec![0.0, 0.0, 1.0, 0.0, -1.0, -1.0]);
    }

    #[test]
    fn momentum_emits_one_position_per_bar() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = MomentumStrategy::default().generate_positions(&table(&closes));
        assert_eq!(series.len(), 20);
    }

    #[test]
    fn mean_reversion_fades_the_average() {
        let pos = positions_of(&MeanReversionStrategy::new(3), &[10.0, 10.0, 10.0, 13.0, 7.0]);
        // ma: -, -, 10, 11, 10
        assert_eq!(pos, vec![0.0, 0.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn zero_lookback_stays_flat() {
        let pos = positions_of(&MomentumStrategy::new(0), &[1.0, 2.0, 3.0]);
        assert_eq!(pos, vec![0.0, 0.0, 0.0]);
        let pos = positions_of(&MeanReversionStrategy::new(0), &[1.0, 2.0, 3.0]);
        assert_eq!(pos, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn sma_rolls() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[1.5, 2.5, 3.5]);
    }
}
