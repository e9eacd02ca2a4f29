//! Intent Router
//!
//! Maps a free-text query to exactly one handler category by counting
//! case-insensitive keyword hits per category:
//! - highest score wins
//! - ties go to the category declared first in [`HandlerCategory::ALL`]
//! - no hits at all falls back to the configured default (spending)

use crate::models::HandlerCategory;
use std::collections::HashMap;
use tracing::debug;

/// Default keyword tables
const SPENDING_KEYWORDS: &[&str] = &[
    "buy", "purchase", "afford", "should i get", "worth it",
    "spend", "shopping", "expensive", "cost", "price", "item",
    "dining out", "restaurant", "coffee", "impulse", "want",
];

const INVESTING_KEYWORDS: &[&str] = &[
    "invest", "stock", "portfolio", "401k", "ira", "retirement",
    "index fund", "etf", "dividend", "wealth", "grow money",
    "robinhood", "fidelity", "vanguard", "compound", "returns",
];

const SAVINGS_KEYWORDS: &[&str] = &[
    "save", "savings", "goal", "emergency fund", "subscription",
    "cancel", "cut back", "reduce", "found money", "extra cash",
    "recurring", "membership", "unused",
];

const BUDGET_KEYWORDS: &[&str] = &[
    "budget", "forecast", "run out", "month end", "overspent",
    "category", "allocation", "on track", "pace", "burn rate",
    "how much left", "can i spend", "dining budget", "grocery budget",
];

fn default_keywords(category: HandlerCategory) -> &'static [&'static str] {
    match category {
        HandlerCategory::Spending => SPENDING_KEYWORDS,
        HandlerCategory::Investing => INVESTING_KEYWORDS,
        HandlerCategory::Savings => SAVINGS_KEYWORDS,
        HandlerCategory::Budget => BUDGET_KEYWORDS,
    }
}

/// Outcome of classifying one query, kept for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub category: HandlerCategory,
    /// Scores in category priority order.
    pub scores: Vec<(HandlerCategory, usize)>,
    pub fallback_used: bool,
}

/// Static, explainable keyword classifier.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    keywords: HashMap<HandlerCategory, Vec<String>>,
    fallback: HandlerCategory,
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentRouter {
    pub fn new() -> Self {
        let keywords = HandlerCategory::ALL
            .iter()
            .map(|category| {
                let words = default_keywords(*category)
                    .iter()
                    .map(|kw| kw.to_string())
                    .collect();
                (*category, words)
            })
            .collect();

        Self {
            keywords,
            fallback: HandlerCategory::Spending,
        }
    }

    /// Category used when nothing matches.
    pub fn with_fallback(mut self, fallback: HandlerCategory) -> Self {
        self.fallback = fallback;
        self
    }

    /// Replace one category's keyword table. Keywords are lowercased.
    pub fn with_keywords<I, S>(mut self, category: HandlerCategory, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = keywords
            .into_iter()
            .map(|kw| kw.as_ref().trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();
        self.keywords.insert(category, words);
        self
    }

    pub fn fallback(&self) -> HandlerCategory {
        self.fallback
    }

    pub fn classify(&self, query: &str) -> HandlerCategory {
        self.decide(query).category
    }

    /// Score every category and pick the winner.
    pub fn decide(&self, query: &str) -> RouteDecision {
        let lowered = query.to_lowercase();

        let scores: Vec<(HandlerCategory, usize)> = HandlerCategory::ALL
            .iter()
            .map(|category| {
                let score = self
                    .keywords
                    .get(category)
                    .map(|words| {
                        words
                            .iter()
                            .filter(|kw| lowered.contains(kw.as_str()))
                            .count()
                    })
                    .unwrap_or(0);
                (*category, score)
            })
            .collect();

        let mut best: Option<(HandlerCategory, usize)> = None;
        for (category, score) in &scores {
            // strict comparison keeps the earliest category on ties
            if best.map_or(true, |(_, top)| *score > top) {
                best = Some((*category, *score));
            }
        }

        let decision = match best {
            Some((category, score)) if score > 0 => RouteDecision {
                category,
                scores,
                fallback_used: false,
            },
            _ => RouteDecision {
                category: self.fallback,
                scores,
                fallback_used: true,
            },
        };

        debug!(
            category = %decision.category,
            fallback = decision.fallback_used,
            scores = ?decision.scores,
            "Classified query"
        );

        decision
    }
}
