use chrono::Utc;
use financial_advice_router::{
    config::AdvisorConfig,
    models::{AdviceQuery, UserFinancialProfile},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    info!("Financial Advice Router starting");

    let config = AdvisorConfig::from_env();
    let orchestrator = config.build_orchestrator()?;

    let query = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let query = if query.trim().is_empty() {
        "Should I buy these $150 headphones?".to_string()
    } else {
        query
    };

    let mut profile = UserFinancialProfile::new("demo_user");
    profile.tone = Some("tough love".to_string());
    profile.current_balance = 420.0;
    profile.payday_day = 1;

    // a payday yesterday with heavy spending puts the demo inside the alert window
    orchestrator
        .record_payday(&profile.user_id, Utc::now() - chrono::Duration::days(1), 260.0)
        .await?;

    let request = AdviceQuery::new(query, profile).with_session("demo_session");

    info!(query = %request.query, "Routing demo query");

    let result = orchestrator.route(request).await?;

    println!("\n=== ROUTED RESPONSE ===");
    println!("{}", result.response);
    println!("\nHandler:    {}", result.metadata.handler_name);
    println!("Tone:       {}", result.metadata.tone_used);
    println!("Confidence: {:.2}", result.metadata.confidence);
    println!("Context:");
    for (i, factor) in result.metadata.context_factors.iter().enumerate() {
        println!("  {}: {}", i + 1, factor);
    }
    if let Some(action) = &result.metadata.suggested_action {
        println!("Suggested action: {}", action);
    }

    if let Some(summary) = orchestrator.session_summary("demo_session").await {
        println!(
            "\nSession: {} interaction(s), handlers {:?}",
            summary.interaction_count, summary.handlers_used
        );
    }

    Ok(())
}
