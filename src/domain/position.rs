//! Target position series produced by strategies.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Signed target exposure per date (e.g. -1, 0, +1 or a continuous weight).
///
/// A position takes effect at the close of its date. Dates with no entry are
/// flat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSeries {
    values: BTreeMap<NaiveDate, f64>,
}

impl PositionSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, position: f64) {
        self.values.insert(date, position);
    }

    /// Position at `date`; absent dates and NaN entries read as flat.
    pub fn at(&self, date: NaiveDate) -> f64 {
        match self.values.get(&date) {
            Some(v) if !v.is_nan() => *v,
            _ => 0.0,
        }
    }

    /// Positions aligned one-to-one to `dates`.
    pub fn align<I>(&self, dates: I) -> Vec<f64>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        dates.into_iter().map(|d| self.at(d)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.values.iter().map(|(d, v)| (*d, *v))
    }
}

impl FromIterator<(NaiveDate, f64)> for PositionSeries {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
