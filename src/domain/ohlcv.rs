//! OHLCV bar and price table representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one instrument, ascending by date with no repeated dates.
///
/// Every constructor and combinator re-establishes the ordering invariant, so a
/// `PriceTable` can be handed out without callers re-sorting it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    bars: Vec<Bar>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from bars in any order. When a date repeats, the bar that
    /// appears later in `bars` wins.
    pub fn from_bars(bars: Vec<Bar>) -> Self {
        let mut bars = bars;
        // Stable sort keeps input order among equal dates, so the last one
        // in each run is the most recent.
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    /// Union of `self` and `newer`; on a shared date the bar from `newer` wins.
    pub fn merge(&self, newer: &PriceTable) -> PriceTable {
        let mut combined = Vec::with_capacity(self.bars.len() + newer.bars.len());
        combined.extend(self.bars.iter().cloned());
        combined.extend(newer.bars.iter().cloned());
        PriceTable::from_bars(combined)
    }

    /// Bars with `start <= date <= end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> PriceTable {
        let bars = self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
