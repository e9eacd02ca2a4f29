//! Core data models for the financial advice router

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AdvisorError;
use crate::Result;

//
// ================= Handler Categories =================
//

/// Specialised advice domains a query can be routed to.
///
/// Declaration order is the routing priority: on a score tie the category
/// declared first wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HandlerCategory {
    Spending,
    Investing,
    Savings,
    Budget,
}

impl HandlerCategory {
    pub const ALL: [HandlerCategory; 4] = [
        HandlerCategory::Spending,
        HandlerCategory::Investing,
        HandlerCategory::Savings,
        HandlerCategory::Budget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerCategory::Spending => "spending",
            HandlerCategory::Investing => "investing",
            HandlerCategory::Savings => "savings",
            HandlerCategory::Budget => "budget",
        }
    }
}

impl fmt::Display for HandlerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= User Profile =================
//

fn default_payday_day() -> u32 {
    15
}

fn default_monthly_income() -> f64 {
    5000.0
}

fn default_current_balance() -> f64 {
    2500.0
}

fn default_monthly_budget() -> f64 {
    4000.0
}

/// Per-request snapshot of the user's finances, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFinancialProfile {
    pub user_id: String,
    /// Free-form tone request ("zen", "tough love", ...). Normalised by the
    /// tone resolver; unknown values are ignored.
    #[serde(default, alias = "financial_personality")]
    pub tone: Option<String>,
    #[serde(default = "default_payday_day")]
    pub payday_day: u32,
    #[serde(default = "default_monthly_income")]
    pub monthly_income: f64,
    #[serde(default = "default_current_balance")]
    pub current_balance: f64,
    #[serde(default = "default_monthly_budget")]
    pub monthly_budget: f64,
}

impl UserFinancialProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tone: None,
            payday_day: default_payday_day(),
            monthly_income: default_monthly_income(),
            current_balance: default_current_balance(),
            monthly_budget: default_monthly_budget(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AdvisorError::InvalidInput("user_id is required".to_string()));
        }

        if !(1..=31).contains(&self.payday_day) {
            return Err(AdvisorError::InvalidInput(format!(
                "payday_day must be between 1 and 31, got {}",
                self.payday_day
            )));
        }

        let amounts = [
            ("monthly_income", self.monthly_income),
            ("current_balance", self.current_balance),
            ("monthly_budget", self.monthly_budget),
        ];
        for (field, value) in amounts {
            if !value.is_finite() {
                return Err(AdvisorError::InvalidInput(format!(
                    "{} must be a finite number",
                    field
                )));
            }
        }

        Ok(())
    }
}

//
// ================= Transactions =================
//

/// A bank or receipt transaction supplied by the ingestion side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
}

//
// ================= Request =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceQuery {
    pub query: String,
    #[serde(alias = "user_context")]
    pub profile: UserFinancialProfile,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transaction_context: Option<Vec<TransactionRecord>>,
}

impl AdviceQuery {
    pub fn new(query: impl Into<String>, profile: UserFinancialProfile) -> Self {
        Self {
            query: query.into(),
            profile,
            session_id: None,
            transaction_context: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<TransactionRecord>) -> Self {
        self.transaction_context = Some(transactions);
        self
    }

    /// Reject requests that cannot enter the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(AdvisorError::InvalidInput("query text is required".to_string()));
        }

        if let Some(session_id) = &self.session_id {
            if session_id.trim().is_empty() {
                return Err(AdvisorError::InvalidInput(
                    "session_id must not be blank when provided".to_string(),
                ));
            }
        }

        self.profile.validate()
    }
}

//
// ================= Response =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    pub handler_name: String,
    pub confidence: f64,
    pub tone_used: String,
    pub context_factors: Vec<String>,
    pub suggested_action: Option<String>,
    pub related_transaction_ids: Option<Vec<String>>,
}

/// Standardised output of every routed query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutedResponse {
    pub response: String,
    pub metadata: ResponseMetadata,
}

/// Public view of a session's continuity state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub interaction_count: usize,
    pub handlers_used: Vec<String>,
    pub recent_topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_from_json() {
        let profile: UserFinancialProfile =
            serde_json::from_str(r#"{"user_id": "user_123"}"#).unwrap();

        assert_eq!(profile.payday_day, 15);
        assert_eq!(profile.monthly_income, 5000.0);
        assert_eq!(profile.current_balance, 2500.0);
        assert_eq!(profile.monthly_budget, 4000.0);
        assert!(profile.tone.is_none());
    }

    #[test]
    fn test_query_accepts_legacy_field_names() {
        let query: AdviceQuery = serde_json::from_str(
            r#"{
                "query": "Should I buy this $200 jacket?",
                "user_context": {"user_id": "u1", "financial_personality": "tough_love"}
            }"#,
        )
        .unwrap();

        assert_eq!(query.profile.tone.as_deref(), Some("tough_love"));
        assert!(query.session_id.is_none());
    }

    #[test]
    fn test_validation_rejects_missing_identity() {
        let blank_query = AdviceQuery::new("   ", UserFinancialProfile::new("u1"));
        assert!(blank_query.validate().unwrap_err().is_client_error());

        let blank_user = AdviceQuery::new("can I afford it?", UserFinancialProfile::new(""));
        assert!(blank_user.validate().is_err());

        let blank_session =
            AdviceQuery::new("can I afford it?", UserFinancialProfile::new("u1")).with_session(" ");
        assert!(blank_session.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_fields() {
        let mut profile = UserFinancialProfile::new("u1");
        profile.payday_day = 0;
        assert!(profile.validate().is_err());

        profile.payday_day = 32;
        assert!(profile.validate().is_err());

        profile.payday_day = 31;
        profile.current_balance = f64::NAN;
        assert!(profile.validate().is_err());

        profile.current_balance = -40.0;
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&HandlerCategory::Investing).unwrap();
        assert_eq!(json, "\"investing\"");
        assert_eq!(HandlerCategory::Budget.to_string(), "budget");
    }
}
