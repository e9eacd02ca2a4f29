//! Routing orchestrator - the single entry point for advice queries
//!
//! CONTEXT → TONE → CLASSIFY → SESSION → ENRICH → GENERATE → NORMALIZE → RECORD
//!
//! Only input validation errors leave [`RoutingOrchestrator::route`] as
//! failures. Generation and storage problems degrade into a complete,
//! low-confidence response.

pub mod normalize;

use crate::classifier::IntentRouter;
use crate::context::TemporalFinancialAnalyzer;
use crate::error::AdvisorError;
use crate::generation::GenerationService;
use crate::handlers::{build_instruction, format_transactions};
use crate::models::{
    AdviceQuery, HandlerCategory, RoutedResponse, SessionSummary, TransactionRecord,
    UserFinancialProfile,
};
use crate::payday::{PaydayEffect, PaydayEffectRecord, PaydayPatternDetector};
use crate::session::{SessionGuard, SessionState, SessionStore};
use crate::state::{UserLocks, UserMemory, UserStateStore};
use crate::tone::{Tone, ToneResolver};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use normalize::{apply_handler_override, degraded_response, normalize_reply};

/// Characters of the previous response carried into the next query.
const PREVIOUS_RESPONSE_SNIPPET: usize = 100;

pub struct RoutingOrchestrator {
    generator: Arc<dyn GenerationService>,
    router: IntentRouter,
    sessions: SessionStore,
    users: Arc<dyn UserStateStore>,
    user_locks: UserLocks,
    payday: PaydayPatternDetector,
}

impl RoutingOrchestrator {
    pub fn new(generator: Arc<dyn GenerationService>, users: Arc<dyn UserStateStore>) -> Self {
        Self {
            generator,
            router: IntentRouter::new(),
            sessions: SessionStore::new(),
            users,
            user_locks: UserLocks::new(),
            payday: PaydayPatternDetector::new(),
        }
    }

    pub fn with_router(mut self, router: IntentRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_payday_detector(mut self, detector: PaydayPatternDetector) -> Self {
        self.payday = detector;
        self
    }

    pub async fn route(&self, request: AdviceQuery) -> Result<RoutedResponse> {
        self.route_at(request, Utc::now()).await
    }

    /// Route a query as of `now`.
    pub async fn route_at(
        &self,
        request: AdviceQuery,
        now: DateTime<Utc>,
    ) -> Result<RoutedResponse> {
        request.validate()?;

        let start = Instant::now();
        let profile = &request.profile;
        let session_id = request.session_id.as_deref();

        let memory = self.load_memory(&profile.user_id).await;

        // === CONTEXT ===
        let snapshot = TemporalFinancialAnalyzer::analyze(profile, now.date_naive());
        let payday_effect = self.payday.detect(memory.payday.as_ref(), now);

        // === TONE ===
        let tone = ToneResolver::resolve(profile.tone.as_deref(), memory.preferred_tone.as_deref());
        let remembered = memory.preferred_tone.as_deref().and_then(Tone::normalize);
        self.remember_tone(profile, remembered, tone).await;

        // === CLASSIFY ===
        let decision = self.router.decide(&request.query);
        let category = decision.category;

        info!(
            user_id = %profile.user_id,
            session_id = ?session_id,
            handler = %category,
            fallback = decision.fallback_used,
            tone = %tone,
            payday_effect = payday_effect.is_some(),
            "Routing query"
        );

        // === SESSION ===
        // held until the turn is recorded; dropping the future releases it untouched
        let mut session = self.sessions.acquire(session_id).await;
        let state = session.as_ref().map(SessionGuard::state).unwrap_or_default();

        // === ENRICH ===
        let enriched = enrich_query(
            &request.query,
            &state,
            category,
            request.transaction_context.as_deref(),
        );
        let instruction =
            build_instruction(category, profile, tone, &snapshot, payday_effect.as_ref());

        // === GENERATE ===
        let mut response = match self.generator.generate(&instruction, &enriched).await {
            Ok(raw) => normalize_reply(raw, category, tone, &snapshot),
            Err(e) => {
                warn!(
                    handler = %category,
                    session_id = ?session_id,
                    error = %e,
                    "Generation failed, returning degraded response"
                );
                degraded_response(category, tone)
            }
        };

        apply_handler_override(&mut response, category);

        // === RECORD ===
        if let Some(guard) = session.as_mut() {
            guard.record(&request.query, &response, category);
        }

        debug!(
            handler = %category,
            confidence = response.metadata.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query routed"
        );

        Ok(response)
    }

    /// Register a payday for `user_id` with the spending reported for it.
    pub async fn record_payday(
        &self,
        user_id: &str,
        payday: DateTime<Utc>,
        spending_amount: f64,
    ) -> Result<PaydayEffectRecord> {
        self.record_payday_at(user_id, payday, spending_amount, Utc::now())
            .await
    }

    pub async fn record_payday_at(
        &self,
        user_id: &str,
        payday: DateTime<Utc>,
        spending_amount: f64,
        now: DateTime<Utc>,
    ) -> Result<PaydayEffectRecord> {
        if user_id.trim().is_empty() {
            return Err(AdvisorError::InvalidInput("user_id is required".to_string()));
        }
        if !spending_amount.is_finite() || spending_amount < 0.0 {
            return Err(AdvisorError::InvalidInput(
                "spending amount must be a non-negative number".to_string(),
            ));
        }

        let detector = &self.payday;
        let record = self
            .update_memory(user_id, |memory| {
                let record =
                    detector.record_payday(memory.payday.take(), payday, spending_amount, now);
                memory.payday = Some(record.clone());
                record
            })
            .await?;

        info!(
            user_id = %user_id,
            history = record.spending_history.len(),
            average_overspend = record.average_overspend_after_payday,
            "Payday recorded"
        );

        Ok(record)
    }

    /// Active post-payday effect for a user, if any.
    pub async fn payday_effect(&self, user_id: &str, now: DateTime<Utc>) -> Option<PaydayEffect> {
        let memory = self.load_memory(user_id).await;
        self.payday.detect(memory.payday.as_ref(), now)
    }

    pub async fn session_summary(&self, session_id: &str) -> Option<SessionSummary> {
        self.sessions.summary(session_id).await
    }

    /// Read-only view for routing; never saved back.
    async fn load_memory(&self, user_id: &str) -> UserMemory {
        match self.users.load(user_id).await {
            Ok(memory) => memory,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to load user memory, using defaults");
                UserMemory::default()
            }
        }
    }

    /// Load, modify and save one user's memory under that user's lock.
    /// A failed load aborts before anything is written.
    async fn update_memory<T, F>(&self, user_id: &str, modify: F) -> Result<T>
    where
        F: FnOnce(&mut UserMemory) -> T,
    {
        let _guard = self.user_locks.lock(user_id).await;

        let mut memory = self.users.load(user_id).await?;
        let output = modify(&mut memory);
        self.users.save(user_id, &memory).await?;

        Ok(output)
    }

    /// Persist an explicitly requested, recognised tone as the preference.
    async fn remember_tone(
        &self,
        profile: &UserFinancialProfile,
        remembered: Option<Tone>,
        tone: Tone,
    ) {
        let requested = profile.tone.as_deref().and_then(Tone::normalize);
        if requested != Some(tone) || remembered == Some(tone) {
            return;
        }

        let result = self
            .update_memory(&profile.user_id, |memory| {
                memory.preferred_tone = Some(tone.as_str().to_string());
            })
            .await;

        if let Err(e) = result {
            warn!(user_id = %profile.user_id, error = %e, "Failed to persist tone preference");
        }
    }
}

/// Original query plus continuity hints and recent transactions.
pub fn enrich_query(
    query: &str,
    state: &SessionState,
    category: HandlerCategory,
    transactions: Option<&[TransactionRecord]>,
) -> String {
    let mut enriched = query.to_string();

    if let Some(last) = state.last_turn() {
        let snippet: String = last.response.chars().take(PREVIOUS_RESPONSE_SNIPPET).collect();
        enriched.push_str(&format!(
            "\n\n[Previous context: User asked '{}' and received advice about: {}...]",
            last.query, snippet
        ));

        if let Some(previous) = state.last_handler().filter(|h| *h != category) {
            enriched.push_str(&format!(
                "\n[Note: Previously discussed with the {} handler]",
                previous
            ));
        }
    }

    if let Some(transactions) = transactions.filter(|t| !t.is_empty()) {
        enriched.push_str("\n\nRECENT TRANSACTIONS:\n");
        enriched.push_str(&format_transactions(transactions));
    }

    enriched
}
