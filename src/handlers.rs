//! Handler instructions
//!
//! Each handler category contributes a role description; the rest of the
//! instruction (tone, context, financial snapshot, payday warning and the
//! required reply format) is shared.

use crate::context::ContextSnapshot;
use crate::models::{HandlerCategory, TransactionRecord, UserFinancialProfile};
use crate::payday::PaydayEffect;
use crate::tone::Tone;

/// Transactions forwarded with a query.
pub const MAX_FORWARDED_TRANSACTIONS: usize = 5;

/// Role description for one handler category.
pub fn role_instructions(category: HandlerCategory) -> &'static str {
    match category {
        HandlerCategory::Spending => {
            "You help the user decide whether a specific purchase makes sense right now.\n\
             - Weigh the price against the current balance and days until payday\n\
             - Flag impulse buys and suggest waiting periods when appropriate\n\
             - Offer a cheaper alternative or a better time to buy"
        }
        HandlerCategory::Investing => {
            "You help the user build long-term wealth.\n\
             - Explain options (retirement accounts, index funds, ETFs) in plain terms\n\
             - Only suggest investing money that is not needed before payday\n\
             - Mention risk and time horizon, never promise returns"
        }
        HandlerCategory::Savings => {
            "You find money the user can set aside.\n\
             - Look for recurring charges, unused memberships and subscriptions\n\
             - Suggest concrete amounts and where to move them\n\
             - Tie suggestions to the user's goals and emergency fund"
        }
        HandlerCategory::Budget => {
            "You analyse budget pace and forecast month-end position.\n\
             - Compare spending so far against time elapsed in the month\n\
             - Project whether the balance lasts until payday\n\
             - Recommend category-level adjustments with numbers"
        }
    }
}

/// Full instruction handed to the generation service.
pub fn build_instruction(
    category: HandlerCategory,
    profile: &UserFinancialProfile,
    tone: Tone,
    snapshot: &ContextSnapshot,
    payday_effect: Option<&PaydayEffect>,
) -> String {
    let mut sections = vec![
        format!(
            "You are a specialized financial assistant focused on {} advice.",
            category
        ),
        format!("YOUR CORE ROLE:\n{}", role_instructions(category)),
        format!(
            "YOUR PERSONALITY ({}):\n{}\nExample voice: \"{}\"",
            tone.display_name(),
            tone.instruction(),
            tone.catchphrase()
        ),
        format!("CURRENT CONTEXT:\n{}", snapshot.prompt_addition()),
    ];

    if let Some(effect) = payday_effect {
        sections.push(format!(
            "PAYDAY ALERT:\n{}\nSpent since payday: ${:.2}\nSuggestion: {}",
            effect.warning_message, effect.current_spending, effect.suggestion
        ));
    }

    sections.push(format!(
        "USER FINANCIAL SNAPSHOT:\n\
         - Current Balance: ${:.2}\n\
         - Monthly Income: ${:.2}\n\
         - Monthly Budget: ${:.2}\n\
         - Payday: Day {} of each month",
        profile.current_balance, profile.monthly_income, profile.monthly_budget, profile.payday_day
    ));

    sections.push(format!(
        "RULES:\n\
         1. Give actionable advice, not just information\n\
         2. Reference specific numbers when possible\n\
         3. Account for payday proximity and month-end timing\n\
         4. Keep the assigned personality throughout\n\
         5. Reply with valid JSON only\n\n\
         OUTPUT FORMAT:\n\
         {{\n  \
           \"response\": \"your conversational response\",\n  \
           \"metadata\": {{\n    \
             \"handler_name\": \"{}\",\n    \
             \"confidence\": 0.0 to 1.0,\n    \
             \"tone_used\": \"{}\",\n    \
             \"context_factors\": [\"relevant\", \"factors\"],\n    \
             \"suggested_action\": \"specific_action_or_null\",\n    \
             \"related_transaction_ids\": [\"txn_id\"] or null\n  \
           }}\n\
         }}",
        category,
        tone.as_str()
    ));

    sections.join("\n\n")
}

/// Most recent transactions first, undated ones last.
pub fn recent_transactions(transactions: &[TransactionRecord]) -> Vec<&TransactionRecord> {
    let mut sorted: Vec<&TransactionRecord> = transactions.iter().collect();
    // stable sort keeps caller order among equal dates
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.truncate(MAX_FORWARDED_TRANSACTIONS);
    sorted
}

/// One line per forwarded transaction.
pub fn format_transactions(transactions: &[TransactionRecord]) -> String {
    recent_transactions(transactions)
        .into_iter()
        .map(|tx| {
            let date = tx
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            format!(
                "- {}: {} ${:.2} ({})",
                date,
                tx.merchant.as_deref().unwrap_or("Unknown"),
                tx.amount.abs(),
                tx.category.as_deref().unwrap_or("uncategorized")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemporalFinancialAnalyzer;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn tx(day: Option<u32>, merchant: &str, amount: f64) -> TransactionRecord {
        TransactionRecord {
            id: None,
            date: day.map(|d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()),
            merchant: Some(merchant.to_string()),
            amount,
            category: None,
        }
    }

    #[test]
    fn test_instruction_contains_all_sections() {
        let profile = UserFinancialProfile::new("u1");
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let snapshot = TemporalFinancialAnalyzer::analyze(&profile, today);

        let instruction = build_instruction(
            HandlerCategory::Savings,
            &profile,
            Tone::Zen,
            &snapshot,
            None,
        );

        assert!(instruction.contains("focused on savings advice"));
        assert!(instruction.contains("Zen"));
        assert!(instruction.contains("$2500.00"));
        assert!(instruction.contains("Day 15 of each month"));
        assert!(instruction.contains("\"handler_name\": \"savings\""));
        assert!(instruction.contains("\"tone_used\": \"zen\""));
        assert!(!instruction.contains("PAYDAY ALERT"));
    }

    #[test]
    fn test_instruction_includes_payday_alert() {
        let profile = UserFinancialProfile::new("u1");
        let snapshot =
            TemporalFinancialAnalyzer::analyze(&profile, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        let effect = PaydayEffect {
            days_since_payday: 1,
            average_overspend: 150.0,
            current_spending: 42.5,
            suggested_transfer: 75.0,
            warning_message: "Heads up".to_string(),
            suggestion: "Move $75".to_string(),
        };

        let instruction = build_instruction(
            HandlerCategory::Spending,
            &profile,
            Tone::default(),
            &snapshot,
            Some(&effect),
        );
        assert!(instruction.contains("PAYDAY ALERT"));
        assert!(instruction.contains("$42.50"));
        assert!(instruction.contains("Move $75"));
    }

    #[test]
    fn test_instruction_sections_are_blank_line_separated() {
        let profile = UserFinancialProfile::new("u1");
        let snapshot =
            TemporalFinancialAnalyzer::analyze(&profile, NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());

        let instruction = build_instruction(
            HandlerCategory::Budget,
            &profile,
            Tone::Zen,
            &snapshot,
            None,
        );

        assert!(instruction.starts_with("You are a specialized financial assistant"));
        assert!(instruction.contains("budget advice.\n\nYOUR CORE ROLE:\n"));
        assert!(instruction.contains("of each month\n\nRULES:\n"));
        assert!(instruction.ends_with('}'));
    }

    #[test]
    fn test_recent_transactions_limit_and_order() {
        let transactions = vec![
            tx(Some(1), "a", 1.0),
            tx(None, "undated", 2.0),
            tx(Some(9), "b", 3.0),
            tx(Some(5), "c", 4.0),
            tx(Some(7), "d", 5.0),
            tx(Some(3), "e", 6.0),
            tx(Some(8), "f", 7.0),
        ];

        let merchants: Vec<&str> = recent_transactions(&transactions)
            .iter()
            .map(|t| t.merchant.as_deref().unwrap())
            .collect();
        assert_eq!(merchants, vec!["b", "f", "d", "c", "e"]);
        assert_eq!(transactions.len(), 7);
    }

    #[test]
    fn test_format_transactions() {
        let transactions = vec![tx(Some(2), "Coffee Shop", -4.5), tx(None, "Mystery", 10.0)];
        let formatted = format_transactions(&transactions);

        assert_eq!(
            formatted,
            "- 2024-03-02: Coffee Shop $4.50 (uncategorized)\n- Unknown: Mystery $10.00 (uncategorized)"
        );
    }
}
