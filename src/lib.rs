//! Financial Advice Router
//!
//! Query routing and context-scoring engine for a conversational finance
//! assistant:
//! - Classifies each query to one specialised handler (spending, investing, savings, budget)
//! - Derives a temporal/financial context snapshot from the user's profile
//! - Detects post-payday overspending patterns from recorded history
//! - Keeps multi-turn continuity per session across handler switches
//! - Delegates wording to an external generation service and normalises the reply
//!
//! PIPELINE:
//! QUERY → CONTEXT → TONE → CLASSIFY → SESSION → GENERATE → NORMALIZE → RECORD

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod handlers;
pub mod models;
pub mod payday;
pub mod session;
pub mod state;
pub mod tone;

pub use error::Result;

// Re-export common types
pub use agent::RoutingOrchestrator;
pub use classifier::{IntentRouter, RouteDecision};
pub use context::{ContextSnapshot, TemporalFinancialAnalyzer};
pub use models::*;
pub use payday::{PaydayEffect, PaydayEffectRecord, PaydayPatternDetector};
pub use session::{SessionState, SessionStore};
pub use tone::{Tone, ToneResolver};
