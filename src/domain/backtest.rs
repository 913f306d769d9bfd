//! Bar-based backtest simulation.
//!
//! A position held at the close of bar `t` earns the move from `t` to `t+1`.
//! Costs are charged on the bar where the position changes:
//!
//! ```text
//! ret[t]      = (close[t+1] / close[t] - 1) * pos[t]      (0 on the last bar)
//! turnover[t] = |pos[t] - pos[t-1]|                        (0 on the first bar)
//! cost[t]     = turnover[t] * total_bps / 10_000 * close[t]
//! net[t]      = ret[t] - cost[t] / close[t]
//! equity[t]   = prod(1 + net[0..=t])
//! ```
//!
//! Degenerate input (zero or NaN closes) flows through as inf/NaN values.

use crate::domain::ohlcv::PriceTable;
use crate::domain::position::PositionSeries;
use chrono::NaiveDate;

const BPS: f64 = 10_000.0;

/// Transaction cost rates in basis points, charged on turnover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub fee_bps: f64,
    pub tax_bps: f64,
    pub slippage_bps: f64,
}

impl CostModel {
    pub const ZERO: CostModel = CostModel {
        fee_bps: 0.0,
        tax_bps: 0.0,
        slippage_bps: 0.0,
    };

    pub fn new(fee_bps: f64, tax_bps: f64, slippage_bps: f64) -> Self {
        Self {
            fee_bps,
            tax_bps,
            slippage_bps,
        }
    }

    pub fn total_bps(&self) -> f64 {
        self.fee_bps + self.tax_bps + self.slippage_bps
    }

    pub fn rate(&self) -> f64 {
        self.total_bps() / BPS
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRecord {
    pub date: NaiveDate,
    pub position: f64,
    /// Net return credited to this bar, after cost.
    pub ret: f64,
    pub equity: f64,
    pub turnover: f64,
    /// Cost in price units; `cost / close` is the fraction deducted from `ret`.
    pub cost: f64,
}

/// Run the simulation over every row of `prices`.
pub fn simulate(
    prices: &PriceTable,
    positions: &PositionSeries,
    costs: &CostModel,
) -> Vec<SimulationRecord> {
    let bars = prices.bars();
    let pos = positions.align(prices.dates());
    let rate = costs.rate();

    let mut records = Vec::with_capacity(bars.len());
    let mut equity = 1.0_f64;

    for (i, bar) in bars.iter().enumerate() {
        let gross = match bars.get(i + 1) {
            Some(next) => (next.close / bar.close - 1.0) * pos[i],
            None => 0.0,
        };
        let turnover = if i == 0 {
            0.0
        } else {
            (pos[i] - pos[i - 1]).abs()
        };
        let cost = turnover * rate * bar.close;
        let ret = gross - cost / bar.close;
        equity *= 1.0 + ret;

        records.push(SimulationRecord {
            date: bar.date,
            position: pos[i],
            ret,
            equity,
            turnover,
            cost,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn d(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn table(closes: &[f64]) -> PriceTable {
        PriceTable::from_bars(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Bar {
                    date: d(i),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0.0,
                })
                .collect(),
        )
    }

    fn positions(values: &[f64]) -> PositionSeries {
        values.iter().enumerate().map(|(i, &v)| (d(i), v)).collect()
    }

    #[test]
    fn five_bar_reference_case() {
        let prices = table(&[100.0, 102.0, 101.0, 103.0, 104.0]);
        let pos = positions(&[1.0, 1.0, 0.0, -1.0, -1.0]);
        let records = simulate(&prices, &pos, &CostModel::ZERO);

        let rets: Vec<f64> = records.iter().map(|r| r.ret).collect();
        assert_relative_eq!(rets[0], 0.02, epsilon = 1e-12);
        assert_relative_eq!(rets[1], 101.0 / 102.0 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(rets[2], 0.0);
        assert_relative_eq!(rets[3], -(104.0 / 103.0 - 1.0), epsilon = 1e-12);
        assert_relative_eq!(rets[4], 0.0);

        let turnover: Vec<f64> = records.iter().map(|r| r.turnover).collect();
        assert_eq!(turnover, vec![0.0, 0.0, 1.0, 1.0, 0.0]);

        let mut eq = 1.0;
        for r in &records {
            eq *= 1.0 + r.ret;
            assert_relative_eq!(r.equity, eq, epsilon = 1e-12);
        }
    }

    #[test]
    fn costs_lower_terminal_equity() {
        let prices = table(&[100.0, 102.0, 101.0, 103.0, 104.0]);
        let pos = positions(&[1.0, 1.0, 0.0, -1.0, -1.0]);
        let free = simulate(&prices, &pos, &CostModel::ZERO);
        let charged = simulate(&prices, &pos, &CostModel::new(2.0, 3.0, 1.0));

        let free_end = free.last().unwrap().equity;
        let charged_end = charged.last().unwrap().equity;
        assert!(charged_end < free_end);

        // 6 bps on one unit of turnover at close 101.
        assert_relative_eq!(charged[2].cost, 0.0006 * 101.0, epsilon = 1e-12);
        assert_relative_eq!(charged[2].ret, -0.0006, epsilon = 1e-12);
    }

    #[test]
    fn first_bar_entry_is_free() {
        let prices = table(&[100.0, 110.0]);
        let pos = positions(&[1.0, 1.0]);
        let records = simulate(&prices, &pos, &CostModel::new(10.0, 10.0, 10.0));
        assert_eq!(records[0].turnover, 0.0);
        assert_eq!(records[0].cost, 0.0);
        assert_relative_eq!(records[0].ret, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn missing_positions_are_flat() {
        let prices = table(&[100.0, 110.0, 121.0]);
        let mut pos = PositionSeries::new();
        pos.insert(d(1), 1.0);
        let records = simulate(&prices, &pos, &CostModel::ZERO);

        assert_eq!(records[0].position, 0.0);
        assert_eq!(records[0].ret, 0.0);
        assert_relative_eq!(records[1].ret, 0.1, epsilon = 1e-12);
        assert_eq!(records[1].turnover, 1.0);
    }

    #[test]
    fn constant_price_equity_is_cost_only() {
        let prices = table(&[50.0; 6]);
        let pos = positions(&[0.0, 1.0, -1.0, -1.0, 0.5, 0.0]);
        let costs = CostModel::new(2.8, 30.0, 5.0);
        let records = simulate(&prices, &pos, &costs);

        let mut expected = 1.0;
        for r in &records {
            expected *= 1.0 - r.cost / 50.0;
            assert_relative_eq!(r.equity, expected, epsilon = 1e-12);
        }
        assert!(records.iter().any(|r| r.turnover > 0.0));
    }

    #[test]
    fn zero_close_propagates_non_finite() {
        let prices = table(&[0.0, 10.0, 10.0]);
        let pos = positions(&[1.0, 1.0, 1.0]);
        let records = simulate(&prices, &pos, &CostModel::ZERO);
        assert!(!records[0].ret.is_finite());
        assert!(!records[2].equity.is_finite());
    }

    #[test]
    fn empty_table_yields_no_records() {
        let records = simulate(&PriceTable::new(), &PositionSeries::new(), &CostModel::ZERO);
        assert!(records.is_empty());
    }

    #[test]
    fn single_bar_has_zero_return() {
        let records = simulate(&table(&[100.0]), &positions(&[1.0]), &CostModel::ZERO);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ret, 0.0);
        assert_eq!(records[0].equity, 1.0);
    }

    #[test]
    fn cost_model_rate() {
        let costs = CostModel::new(2.8, 30.0, 5.0);
        assert_relative_eq!(costs.total_bps(), 37.8, epsilon = 1e-12);
        assert_relative_eq!(costs.rate(), 0.00378, epsilon = 1e-12);
    }

    proptest! {
        // A single long position at bar k must earn exactly the k -> k+1 move,
        // never the k-1 -> k move.
        #[test]
        fn position_earns_the_next_bars_move(
            closes in prop::collection::vec(1.0f64..1000.0, 3..40),
            pick in any::<prop::sample::Index>(),
        ) {
            let n = closes.len();
            let k = pick.index(n - 1);
            let prices = table(&closes);
            let mut pos = PositionSeries::new();
            pos.insert(d(k), 1.0);

            let records = simulate(&prices, &pos, &CostModel::ZERO);
            let expected = closes[k + 1] / closes[k] - 1.0;
            prop_assert!((records[k].ret - expected).abs() < 1e-12);
            for (i, r) in records.iter().enumerate() {
                if i != k {
                    prop_assert_eq!(r.ret, 0.0);
                }
            }
        }

        #[test]
        fn equity_is_cumulative_product(
            closes in prop::collection::vec(1.0f64..1000.0, 1..30),
            raw_pos in prop::collection::vec(-1.0f64..1.0, 30),
            bps in 0.0f64..50.0,
        ) {
            let prices = table(&closes);
            let pos = positions(&raw_pos[..closes.len()]);
            let records = simulate(&prices, &pos, &CostModel::new(bps, 0.0, 0.0));

            prop_assert_eq!(records.len(), closes.len());
            let mut eq = 1.0;
            for r in &records {
                eq *= 1.0 + r.ret;
                prop_assert!((r.equity - eq).abs() <= 1e-9 * eq.abs().max(1.0));
                prop_assert!(r.turnover >= 0.0);
                prop_assert!(r.cost >= 0.0);
            }
        }
    }
}
