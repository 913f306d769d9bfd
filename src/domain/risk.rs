//! Kill switch thresholds for daily P&L and drawdown.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KillSwitch {
    /// Halt when the day's return is at or below this (e.g. -0.06).
    pub pnl_limit: f64,
    /// Halt when drawdown from peak is at or below this (e.g. -0.15).
    pub drawdown_limit: f64,
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self {
            pnl_limit: -0.06,
            drawdown_limit: -0.15,
        }
    }
}

impl KillSwitch {
    pub fn should_halt(&self, pnl_today: f64, drawdown: f64) -> bool {
        pnl_today <= self.pnl_limit || drawdown <= self.drawdown_limit
    }
}
