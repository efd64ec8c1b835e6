//! Deficit accounting: the "food owed" balance in milligrams.
//!
//! The balance accrues continuously at a rate derived from the daily
//! ration and is drawn down by completed feeds. One milligram is owed
//! every `86_400 / grams_per_day` milliseconds, which realizes
//! `grams_per_day` grams per day as a steady drip instead of one lump.

use crate::config::ScheduleCfg;

#[derive(Debug, Clone)]
pub struct DeficitAccumulator {
    grams_per_day: i32,
    /// Milliseconds remaining until the next milligram is owed.
    ms_remain: i32,
    deficit_mg: i32,
    threshold_mg: i32,
}

impl DeficitAccumulator {
    pub fn new(cfg: &ScheduleCfg) -> Self {
        Self {
            grams_per_day: cfg.grams_per_day.max(1),
            ms_remain: 0,
            deficit_mg: 0,
            threshold_mg: cfg.deficit_threshold_mg,
        }
    }

    /// Milliseconds per owed milligram at the current ration.
    fn period_ms(&self) -> i32 {
        (86_400 / self.grams_per_day).max(1)
    }

    /// Accrue for `delta_ms` of elapsed wall-clock time.
    ///
    /// Handles arbitrarily large deltas in one pass; `ms_remain` is never
    /// negative on return.
    pub fn advance(&mut self, delta_ms: u32) {
        let delta = delta_ms.min(i32::MAX as u32) as i32;
        self.ms_remain = self.ms_remain.saturating_sub(delta);
        if self.ms_remain >= 0 {
            return;
        }
        let period = i64::from(self.period_ms());
        let shortfall = -i64::from(self.ms_remain);
        // Owe enough whole periods to bring the countdown non-negative.
        // Both operands are positive, so this is a ceiling division.
        let owed = (shortfall + period - 1) / period;
        self.ms_remain = (i64::from(self.ms_remain) + owed * period) as i32;
        self.deficit_mg = self
            .deficit_mg
            .saturating_add(owed.clamp(0, i64::from(i32::MAX)) as i32);
    }

    /// Draw down the balance after a completed feed.
    pub fn record_dispensed_mg(&mut self, mg: i32) {
        self.deficit_mg = self.deficit_mg.saturating_sub(mg);
    }

    /// Operator adjustment; positive brings auto-feeding forward, negative
    /// accounts for food given by hand.
    pub fn adjust_mg(&mut self, mg: i32) {
        self.deficit_mg = self.deficit_mg.saturating_add(mg);
    }

    pub fn deficit_mg(&self) -> i32 {
        self.deficit_mg
    }

    pub fn threshold_mg(&self) -> i32 {
        self.threshold_mg
    }

    /// True while the balance has not yet reached the auto-feed threshold.
    pub fn below_threshold(&self) -> bool {
        self.deficit_mg < self.threshold_mg
    }

    pub fn grams_per_day(&self) -> i32 {
        self.grams_per_day
    }

    pub fn set_grams_per_day(&mut self, grams_per_day: i32) {
        self.grams_per_day = grams_per_day.max(1);
    }
}
