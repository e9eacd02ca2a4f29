//! Payday effect detection
//!
//! Tracks spending around income deposits and flags the short window after
//! payday in which the user has historically overspent.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PAYDAY_WINDOW_DAYS: i64 = 3;
pub const DEFAULT_OVERSPEND_BASELINE: f64 = 100.0;
pub const DEFAULT_HISTORY_RETENTION: usize = 365;

/// Transfer proposed when there is no overspend history to size it from.
const DEFAULT_SUGGESTED_TRANSFER: f64 = 200.0;
const MAX_SUGGESTED_TRANSFER: f64 = 200.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpendingKind {
    PaydayPeriod,
    Regular,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpendingEntry {
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub kind: SpendingKind,
}

/// Persisted per user; created on the first payday report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaydayEffectRecord {
    pub last_payday: DateTime<Utc>,
    #[serde(default)]
    pub spending_history: Vec<SpendingEntry>,
    #[serde(default)]
    pub average_overspend_after_payday: f64,
    #[serde(default)]
    pub payday_periods: Vec<Vec<f64>>,
}

impl PaydayEffectRecord {
    pub fn new(last_payday: DateTime<Utc>) -> Self {
        Self {
            last_payday,
            spending_history: Vec::new(),
            average_overspend_after_payday: 0.0,
            payday_periods: Vec::new(),
        }
    }
}

/// An active post-payday warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaydayEffect {
    pub days_since_payday: i64,
    pub average_overspend: f64,
    pub current_spending: f64,
    pub suggested_transfer: f64,
    pub warning_message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone)]
pub struct PaydayPatternDetector {
    window_days: i64,
    baseline: f64,
    retention: usize,
}

impl Default for PaydayPatternDetector {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_PAYDAY_WINDOW_DAYS,
            baseline: DEFAULT_OVERSPEND_BASELINE,
            retention: DEFAULT_HISTORY_RETENTION,
        }
    }
}

impl PaydayPatternDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_days(mut self, window_days: i64) -> Self {
        self.window_days = window_days.max(0);
        self
    }

    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// Returns an effect only while `now` is within `window_days` after the
    /// recorded payday. Absence is not an error.
    pub fn detect(
        &self,
        record: Option<&PaydayEffectRecord>,
        now: DateTime<Utc>,
    ) -> Option<PaydayEffect> {
        let record = record?;
        let days_since = whole_days(now - record.last_payday);

        if days_since < 0 || days_since > self.window_days {
            return None;
        }

        let average_overspend = record.average_overspend_after_payday.max(0.0);
        let current_spending = current_period_spending(record, now);
        let suggested_transfer = suggested_transfer(average_overspend);

        Some(PaydayEffect {
            days_since_payday: days_since,
            average_overspend,
            current_spending,
            suggested_transfer,
            warning_message: self.warning_message(average_overspend),
            suggestion: format!(
                "You just got paid - want to transfer ${:.0} to savings first?",
                suggested_transfer
            ),
        })
    }

    /// Register a payday: advances `last_payday`, appends the reported
    /// spending as a payday-period entry and recomputes the pattern over the
    /// whole history.
    pub fn record_payday(
        &self,
        record: Option<PaydayEffectRecord>,
        payday: DateTime<Utc>,
        spending_amount: f64,
        now: DateTime<Utc>,
    ) -> PaydayEffectRecord {
        let mut record = record.unwrap_or_else(|| PaydayEffectRecord::new(payday));
        record.last_payday = payday;

        record.spending_history.push(SpendingEntry {
            timestamp: now,
            amount: spending_amount,
            kind: SpendingKind::PaydayPeriod,
        });
        record.spending_history.sort_by_key(|entry| entry.timestamp);

        if record.spending_history.len() > self.retention {
            let excess = record.spending_history.len() - self.retention;
            record.spending_history.drain(..excess);
        }

        self.recompute(&mut record);
        record
    }

    /// Full recompute of the grouped periods and the average overspend.
    pub fn recompute(&self, record: &mut PaydayEffectRecord) {
        let periods = self.group_periods(&record.spending_history);

        let overspends: Vec<f64> = periods
            .iter()
            .map(|period| (period.iter().sum::<f64>() - self.baseline).max(0.0))
            .collect();

        record.average_overspend_after_payday = if overspends.is_empty() {
            0.0
        } else {
            round_two_decimals(overspends.iter().sum::<f64>() / overspends.len() as f64)
        };

        debug!(
            periods = periods.len(),
            average_overspend = record.average_overspend_after_payday,
            "Recomputed payday pattern"
        );

        record.payday_periods = periods;
    }

    /// A period starts at an entry and spans `window_days` from it; only
    /// payday-period entries contribute amounts. Periods without any
    /// contributing entry are dropped.
    fn group_periods(&self, history: &[SpendingEntry]) -> Vec<Vec<f64>> {
        let mut sorted: Vec<&SpendingEntry> = history.iter().collect();
        sorted.sort_by_key(|entry| entry.timestamp);

        let mut periods = Vec::new();
        let mut current: Vec<f64> = Vec::new();
        let mut period_start: Option<DateTime<Utc>> = None;

        for entry in sorted {
            let starts_new = match period_start {
                None => true,
                Some(start) => whole_days(entry.timestamp - start) > self.window_days,
            };

            if starts_new {
                if !current.is_empty() {
                    periods.push(std::mem::take(&mut current));
                }
                period_start = Some(entry.timestamp);
            }

            if entry.kind == SpendingKind::PaydayPeriod {
                current.push(entry.amount);
            }
        }

        if !current.is_empty() {
            periods.push(current);
        }

        periods
    }

    fn warning_message(&self, average_overspend: f64) -> String {
        if average_overspend > 0.0 {
            format!(
                "Heads up: you typically overspend by ${:.2} in the {} days after getting paid",
                average_overspend, self.window_days
            )
        } else {
            "You just got paid - this is when you typically spend more.".to_string()
        }
    }
}

/// Half the usual overspend, capped; a fixed amount without history.
pub fn suggested_transfer(average_overspend: f64) -> f64 {
    if average_overspend > 0.0 {
        (average_overspend * 0.5).min(MAX_SUGGESTED_TRANSFER)
    } else {
        DEFAULT_SUGGESTED_TRANSFER
    }
}

fn current_period_spending(record: &PaydayEffectRecord, now: DateTime<Utc>) -> f64 {
    record
        .spending_history
        .iter()
        .filter(|entry| entry.timestamp >= record.last_payday && entry.timestamp <= now)
        .map(|entry| entry.amount)
        .sum()
}

/// Whole days, floored (-1h counts as -1 day).
fn whole_days(delta: Duration) -> i64 {
    delta.num_seconds().div_euclid(86_400)
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn record_with_average(last_payday: DateTime<Utc>, average: f64) -> PaydayEffectRecord {
        let mut record = PaydayEffectRecord::new(last_payday);
        record.average_overspend_after_payday = average;
        record
    }

    #[test]
    fn test_no_record_means_no_effect() {
        let detector = PaydayPatternDetector::new();
        assert!(detector.detect(None, at(10, 12)).is_none());
    }

    #[test]
    fn test_window_boundaries() {
        let detector = PaydayPatternDetector::new();
        let record = PaydayEffectRecord::new(at(10, 9));

        assert!(detector.detect(Some(&record), at(10, 9)).is_some());
        assert!(detector.detect(Some(&record), at(13, 9)).is_some());
        assert!(detector.detect(Some(&record), at(14, 9)).is_none());
        // payday recorded in the future
        assert!(detector.detect(Some(&record), at(9, 9)).is_none());
        assert!(detector.detect(Some(&record), at(10, 8)).is_none());
    }

    #[test]
    fn test_suggested_transfer_example() {
        let detector = PaydayPatternDetector::new();
        let record = record_with_average(at(10, 9), 150.0);

        let effect = detector.detect(Some(&record), at(11, 9)).unwrap();
        assert_eq!(effect.days_since_payday, 1);
        assert_eq!(effect.suggested_transfer, 75.0);
        assert!(effect.suggestion.contains("$75"));
        assert!(effect.warning_message.contains("$150.00"));
    }

    #[test]
    fn test_transfer_is_capped_and_defaulted() {
        assert_eq!(suggested_transfer(1000.0), 200.0);
        assert_eq!(suggested_transfer(0.0), 200.0);
        assert_eq!(suggested_transfer(40.0), 20.0);

        let detector = PaydayPatternDetector::new();
        let effect = detector
            .detect(Some(&PaydayEffectRecord::new(at(10, 9))), at(10, 18))
            .unwrap();
        assert!(effect.warning_message.contains("You just got paid"));
        assert_eq!(effect.suggested_transfer, 200.0);
    }

    #[test]
    fn test_record_payday_creates_and_recomputes() {
        let detector = PaydayPatternDetector::new();

        let record = detector.record_payday(None, at(1, 9), 250.0, at(1, 12));
        assert_eq!(record.last_payday, at(1, 9));
        assert_eq!(record.spending_history.len(), 1);
        assert_eq!(record.spending_history[0].kind, SpendingKind::PaydayPeriod);
        assert_eq!(record.average_overspend_after_payday, 150.0);

        // next cycle, well outside the first window
        let record = detector.record_payday(Some(record), at(15, 9), 80.0, at(15, 12));
        assert_eq!(record.last_payday, at(15, 9));
        assert_eq!(record.payday_periods, vec![vec![250.0], vec![80.0]]);
        // (150 + 0) / 2
        assert_eq!(record.average_overspend_after_payday, 75.0);
    }

    #[test]
    fn test_entries_within_window_share_a_period() {
        let detector = PaydayPatternDetector::new();
        let mut record = PaydayEffectRecord::new(at(1, 9));
        record.spending_history = vec![
            SpendingEntry { timestamp: at(1, 10), amount: 60.0, kind: SpendingKind::PaydayPeriod },
            SpendingEntry { timestamp: at(2, 10), amount: 90.0, kind: SpendingKind::PaydayPeriod },
            SpendingEntry { timestamp: at(3, 10), amount: 500.0, kind: SpendingKind::Regular },
            SpendingEntry { timestamp: at(20, 10), amount: 30.0, kind: SpendingKind::Regular },
        ];

        detector.recompute(&mut record);

        assert_eq!(record.payday_periods, vec![vec![60.0, 90.0]]);
        assert_eq!(record.average_overspend_after_payday, 50.0);
    }

    #[test]
    fn test_empty_history_averages_to_zero() {
        let detector = PaydayPatternDetector::new();
        let mut record = record_with_average(at(1, 9), 99.0);
        detector.recompute(&mut record);

        assert_eq!(record.average_overspend_after_payday, 0.0);
        assert!(record.payday_periods.is_empty());
    }

    #[test]
    fn test_current_spending_counts_since_payday() {
        let detector = PaydayPatternDetector::new();
        let mut record = PaydayEffectRecord::new(at(10, 9));
        record.spending_history = vec![
            SpendingEntry { timestamp: at(8, 10), amount: 40.0, kind: SpendingKind::Regular },
            SpendingEntry { timestamp: at(10, 12), amount: 70.0, kind: SpendingKind::PaydayPeriod },
            SpendingEntry { timestamp: at(11, 12), amount: 30.0, kind: SpendingKind::Regular },
        ];

        let effect = detector.detect(Some(&record), at(11, 18)).unwrap();
        assert_eq!(effect.current_spending, 100.0);
    }

    #[test]
    fn test_retention_drops_oldest_entries() {
        let detector = PaydayPatternDetector::new().with_retention(2);
        let mut record = None;
        for day in [1, 8, 15] {
            record = Some(detector.record_payday(record, at(day, 9), 10.0 * day as f64, at(day, 10)));
        }
        let record = record.unwrap();

        assert_eq!(record.spending_history.len(), 2);
        assert_eq!(record.spending_history[0].amount, 80.0);
    }

    #[test]
    fn test_custom_window() {
        let detector = PaydayPatternDetector::new().with_window_days(1);
        let record = PaydayEffectRecord::new(at(10, 9));

        assert!(detector.detect(Some(&record), at(11, 9)).is_some());
        assert!(detector.detect(Some(&record), at(12, 9)).is_none());
    }
}
