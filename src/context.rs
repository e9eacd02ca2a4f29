//! Temporal financial context
//!
//! Derives a snapshot of where the user stands in their pay cycle:
//! payday proximity, month progress, balance health and spending velocity.
//! Pure computation; recomputed on every request and never persisted.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::UserFinancialProfile;

/// Days assumed per month when turning the monthly budget into a daily rate.
const DAYS_PER_BUDGET_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    Critical,
    Low,
    Normal,
    Healthy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpendingVelocity {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeContext {
    PrePayday,
    PostPayday,
    EarlyMonth,
    MidMonth,
}

impl fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BalanceStatus::Critical => "critical",
            BalanceStatus::Low => "low",
            BalanceStatus::Normal => "normal",
            BalanceStatus::Healthy => "healthy",
        };
        write!(f, "{}", s)
    }
}

/// Derived financial/temporal state for a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextSnapshot {
    pub days_until_payday: u32,
    pub days_since_payday: u32,
    pub month_progress_percent: f64,
    pub budget_remaining_percent: f64,
    pub balance_status: BalanceStatus,
    pub spending_velocity: SpendingVelocity,
    pub time_context: TimeContext,
}

pub struct TemporalFinancialAnalyzer;

impl TemporalFinancialAnalyzer {
    /// Compute the snapshot for `profile` as of `today`.
    pub fn analyze(profile: &UserFinancialProfile, today: NaiveDate) -> ContextSnapshot {
        let current_day = today.day();
        let month_days = days_in_month(today);

        let days_until = days_until_payday(current_day, profile.payday_day, month_days);
        let days_since = days_since_payday(current_day, profile.payday_day, month_days);

        let month_progress = current_day as f64 / month_days as f64 * 100.0;

        let budget_remaining = if profile.monthly_budget > 0.0 {
            let budget_spent = profile.monthly_budget - profile.current_balance;
            (profile.monthly_budget - budget_spent) / profile.monthly_budget * 100.0
        } else {
            0.0
        };

        ContextSnapshot {
            days_until_payday: days_until,
            days_since_payday: days_since,
            month_progress_percent: round_one_decimal(month_progress),
            budget_remaining_percent: round_one_decimal(budget_remaining),
            balance_status: balance_status(
                profile.current_balance,
                profile.monthly_budget,
                profile.monthly_income,
                days_until,
            ),
            spending_velocity: spending_velocity(
                current_day,
                month_days,
                profile.monthly_budget,
                profile.current_balance,
            ),
            time_context: time_context(days_until, days_since, current_day),
        }
    }
}

/// Number of days in the month containing `date` (28-31).
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

/// A payday later than the month's last day lands on the last day.
fn effective_payday(payday_day: u32, month_days: u32) -> u32 {
    payday_day.clamp(1, month_days)
}

pub fn days_until_payday(current_day: u32, payday_day: u32, month_days: u32) -> u32 {
    let payday = effective_payday(payday_day, month_days);
    if current_day <= payday {
        payday - current_day
    } else {
        month_days - current_day + payday
    }
}

pub fn days_since_payday(current_day: u32, payday_day: u32, month_days: u32) -> u32 {
    let payday = effective_payday(payday_day, month_days);
    if current_day >= payday {
        current_day - payday
    } else {
        month_days - payday + current_day
    }
}

/// First match wins: critical, low, normal, healthy.
pub fn balance_status(
    current_balance: f64,
    monthly_budget: f64,
    monthly_income: f64,
    days_until_payday: u32,
) -> BalanceStatus {
    let daily_budget = monthly_budget / DAYS_PER_BUDGET_MONTH;
    let minimum_needed = daily_budget * days_until_payday as f64;

    if current_balance < minimum_needed * 0.5 {
        BalanceStatus::Critical
    } else if current_balance < minimum_needed {
        BalanceStatus::Low
    } else if current_balance < monthly_income * 0.3 {
        BalanceStatus::Normal
    } else {
        BalanceStatus::Healthy
    }
}

pub fn spending_velocity(
    current_day: u32,
    month_days: u32,
    monthly_budget: f64,
    current_balance: f64,
) -> SpendingVelocity {
    let elapsed = current_day as f64 / month_days as f64;
    let consumed = if monthly_budget > 0.0 {
        (monthly_budget - current_balance) / monthly_budget
    } else {
        0.0
    };

    if consumed > elapsed * 1.3 {
        SpendingVelocity::High
    } else if consumed < elapsed * 0.7 {
        SpendingVelocity::Low
    } else {
        SpendingVelocity::Normal
    }
}

pub fn time_context(days_until: u32, days_since: u32, current_day: u32) -> TimeContext {
    if days_until <= 3 {
        TimeContext::PrePayday
    } else if days_since <= 3 {
        TimeContext::PostPayday
    } else if current_day <= 10 {
        TimeContext::EarlyMonth
    } else {
        TimeContext::MidMonth
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl ContextSnapshot {
    /// Short labels explaining the situation, used as default metadata.
    pub fn context_factors(&self) -> Vec<String> {
        let mut factors = Vec::new();

        if self.days_until_payday <= 7 {
            factors.push(format!("{} days until payday", self.days_until_payday));
        }
        if matches!(self.balance_status, BalanceStatus::Critical | BalanceStatus::Low) {
            factors.push(format!("{} balance", self.balance_status));
        }
        if self.spending_velocity == SpendingVelocity::High {
            factors.push("high spending velocity".to_string());
        }
        if self.budget_remaining_percent < 20.0 {
            factors.push("low budget remaining".to_string());
        }

        if factors.is_empty() {
            factors.push("normal financial period".to_string());
        }
        factors
    }

    /// Multi-line guidance injected into the handler instruction.
    pub fn prompt_addition(&self) -> String {
        let mut lines = Vec::new();

        if self.days_until_payday <= 3 {
            lines.push(format!(
                "CRITICAL: Only {} days until payday - emphasize caution",
                self.days_until_payday
            ));
        } else if self.days_until_payday <= 7 {
            lines.push(format!(
                "{} days until payday - suggest restraint",
                self.days_until_payday
            ));
        } else if self.days_since_payday <= 3 {
            lines.push(format!(
                "Just got paid {} days ago - good time for planned purchases",
                self.days_since_payday
            ));
        }

        match self.time_context {
            TimeContext::EarlyMonth => lines.push("Early in month - can be more flexible".to_string()),
            TimeContext::MidMonth => lines.push("Mid-month - stay on track".to_string()),
            _ => {}
        }

        match self.balance_status {
            BalanceStatus::Critical => lines.push(
                "CRITICAL: Balance dangerously low - strongly discourage non-essential spending"
                    .to_string(),
            ),
            BalanceStatus::Low => lines.push("Balance is low - recommend caution".to_string()),
            BalanceStatus::Healthy => {
                lines.push("Balance is healthy - can be more flexible".to_string())
            }
            BalanceStatus::Normal => {}
        }

        match self.spending_velocity {
            SpendingVelocity::High => {
                lines.push("Spending faster than planned - advise slowing down".to_string())
            }
            SpendingVelocity::Low => lines.push("Under budget - good position".to_string()),
            SpendingVelocity::Normal => {}
        }

        if lines.is_empty() {
            "Context: Normal financial period".to_string()
        } else {
            lines.join("\n")
        }
    }
}
