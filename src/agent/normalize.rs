//! Reply normalization
//!
//! Whatever the generation service returns is folded into a complete
//! [`RoutedResponse`]; missing or malformed fields get local defaults.

use crate::context::ContextSnapshot;
use crate::generation::RawReply;
use crate::models::{HandlerCategory, ResponseMetadata, RoutedResponse};
use crate::tone::Tone;
use serde_json::{Map, Value};

pub const DEFAULT_CONFIDENCE: f64 = 0.7;
const FALLBACK_RESPONSE: &str = "I apologize, I couldn't process that request.";
const DEGRADED_RESPONSE: &str =
    "I'm having trouble processing your request right now. Please try again in a moment.";

pub fn normalize_reply(
    raw: RawReply,
    category: HandlerCategory,
    tone: Tone,
    snapshot: &ContextSnapshot,
) -> RoutedResponse {
    let response = raw
        .response
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| FALLBACK_RESPONSE.to_string());

    let metadata = raw.metadata.unwrap_or_default();

    let handler_name = string_field(&metadata, &["handler_name", "agent"])
        .unwrap_or_else(|| category.as_str().to_string());

    let confidence = metadata
        .get("confidence")
        .and_then(number)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    let tone_used = string_field(&metadata, &["tone_used", "personality_used"])
        .unwrap_or_else(|| tone.as_str().to_string());

    let context_factors = metadata
        .get("context_factors")
        .map(string_list)
        .filter(|factors| !factors.is_empty())
        .unwrap_or_else(|| snapshot.context_factors());

    let suggested_action = string_field(&metadata, &["suggested_action"]);

    let related_transaction_ids = ["related_transaction_ids", "related_transactions"]
        .iter()
        .find_map(|key| metadata.get(*key))
        .filter(|value| !value.is_null())
        .map(string_list);

    RoutedResponse {
        response,
        metadata: ResponseMetadata {
            handler_name,
            confidence,
            tone_used,
            context_factors,
            suggested_action,
            related_transaction_ids,
        },
    }
}

/// Schema-complete stand-in when generation fails.
pub fn degraded_response(category: HandlerCategory, tone: Tone) -> RoutedResponse {
    RoutedResponse {
        response: DEGRADED_RESPONSE.to_string(),
        metadata: ResponseMetadata {
            handler_name: category.as_str().to_string(),
            confidence: 0.0,
            tone_used: tone.as_str().to_string(),
            context_factors: vec!["error_occurred".to_string()],
            suggested_action: None,
            related_transaction_ids: None,
        },
    }
}

/// The router's own classification is authoritative over any self-report.
pub fn apply_handler_override(response: &mut RoutedResponse, category: HandlerCategory) {
    response.metadata.handler_name = category.as_str().to_string();
}

/// First non-empty string under any of `keys`; literal "null"/"none" count as absent.
fn string_field(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| metadata.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("none"))
        .map(str::to_string)
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Arrays keep their scalar items as strings; a lone scalar becomes a
/// one-element list.
fn string_list(value: &Value) -> Vec<String> {
    let scalar = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemporalFinancialAnalyzer;
    use crate::models::UserFinancialProfile;
    use chrono::NaiveDate;
    use serde_json::json;

    fn snapshot() -> ContextSnapshot {
        let mut profile = UserFinancialProfile::new("u1");
        profile.current_balance = 50.0;
        profile.monthly_budget = 1200.0;
        profile.payday_day = 28;
        TemporalFinancialAnalyzer::analyze(&profile, NaiveDate::from_ymd_opt(2024, 4, 26).unwrap())
    }

    fn reply(metadata: Value) -> RawReply {
        RawReply {
            response: Some("Advice".to_string()),
            metadata: metadata.as_object().cloned(),
        }
    }

    #[test]
    fn test_defaults_for_plain_text() {
        let snapshot = snapshot();
        let response = normalize_reply(
            RawReply::text("Just wait."),
            HandlerCategory::Budget,
            Tone::Zen,
            &snapshot,
        );

        assert_eq!(response.response, "Just wait.");
        assert_eq!(response.metadata.handler_name, "budget");
        assert_eq!(response.metadata.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(response.metadata.tone_used, "zen");
        assert_eq!(response.metadata.context_factors, snapshot.context_factors());
        assert!(response.metadata.suggested_action.is_none());
        assert!(response.metadata.related_transaction_ids.is_none());
    }

    #[test]
    fn test_missing_response_text() {
        let response = normalize_reply(
            RawReply::default(),
            HandlerCategory::Spending,
            Tone::default(),
            &snapshot(),
        );
        assert_eq!(response.response, FALLBACK_RESPONSE);
    }

    #[test]
    fn test_structured_values_are_kept() {
        let response = normalize_reply(
            reply(json!({
                "handler_name": "savings",
                "confidence": 0.92,
                "tone_used": "no_bs",
                "context_factors": ["2 days until payday"],
                "suggested_action": "delay_purchase",
                "related_transaction_ids": ["tx1", 42]
            })),
            HandlerCategory::Savings,
            Tone::Zen,
            &snapshot(),
        );

        assert_eq!(response.metadata.confidence, 0.92);
        assert_eq!(response.metadata.tone_used, "no_bs");
        assert_eq!(response.metadata.context_factors, vec!["2 days until payday"]);
        assert_eq!(response.metadata.suggested_action.as_deref(), Some("delay_purchase"));
        assert_eq!(
            response.metadata.related_transaction_ids,
            Some(vec!["tx1".to_string(), "42".to_string()])
        );
    }

    #[test]
    fn test_alias_keys_and_coercions() {
        let response = normalize_reply(
            reply(json!({
                "agent": "investing",
                "confidence": "1.7",
                "personality_used": "tough_love",
                "context_factors": "payday week",
                "suggested_action": "null",
                "related_transactions": null
            })),
            HandlerCategory::Spending,
            Tone::Zen,
            &snapshot(),
        );

        assert_eq!(response.metadata.handler_name, "investing");
        assert_eq!(response.metadata.confidence, 1.0);
        assert_eq!(response.metadata.tone_used, "tough_love");
        assert_eq!(response.metadata.context_factors, vec!["payday week"]);
        assert!(response.metadata.suggested_action.is_none());
        assert!(response.metadata.related_transaction_ids.is_none());
    }

    #[test]
    fn test_bad_confidence_and_empty_factors_fall_back() {
        let snapshot = snapshot();
        let response = normalize_reply(
            reply(json!({"confidence": -3, "context_factors": []})),
            HandlerCategory::Spending,
            Tone::default(),
            &snapshot,
        );
        assert_eq!(response.metadata.confidence, 0.0);
        assert_eq!(response.metadata.context_factors, snapshot.context_factors());

        let response = normalize_reply(
            reply(json!({"confidence": "high"})),
            HandlerCategory::Spending,
            Tone::default(),
            &snapshot,
        );
        assert_eq!(response.metadata.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_degraded_and_override() {
        let mut response = degraded_response(HandlerCategory::Investing, Tone::NoBs);
        assert_eq!(response.metadata.confidence, 0.0);
        assert_eq!(response.metadata.context_factors, vec!["error_occurred"]);
        assert_eq!(response.metadata.tone_used, "no_bs");
        assert!(!response.response.is_empty());

        apply_handler_override(&mut response, HandlerCategory::Budget);
        assert_eq!(response.metadata.handler_name, "budget");
    }
}
