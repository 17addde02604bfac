use bank_assistant_orchestrator::{
    agents::{AgentId, MockAgentClient},
    engine::OrchestrationEngine,
    store::memory::{sample_transactions, InMemoryTransactionStore},
    store::TransactionStore,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Bank Assistant Orchestrator demo starting");

    // Scripted agent replies so the demo runs without an API key.
    let client = Arc::new(MockAgentClient::new());

    // 1) Greeting: short-circuits before any routing.
    client.enqueue(
        AgentId::Conversational,
        r#"{"task_type": "greeting", "intent_summary": "says hello"}"#,
    );

    // 2) Data search: routed to db_search with a vernacular filter key.
    client.enqueue(
        AgentId::Conversational,
        r#"{"task_type": "fetch", "intent_summary": "wants recent card payments"}"#,
    );
    client.enqueue(
        AgentId::Orchestrator,
        r#"{"route": "lookup", "reason": "plain data request",
            "filters": {"transactionstype": "card", "limit": "5"}}"#,
    );
    client.enqueue(
        AgentId::Orchestrator,
        r#"{"status": "success", "message": "Here are your latest card payments."}"#,
    );

    // 3) Advice: the advisor pulls recurring payments through its tool.
    client.enqueue(
        AgentId::Conversational,
        r#"{"task_type": "insight", "intent_summary": "asks about monthly fixed costs"}"#,
    );
    client.enqueue(
        AgentId::Orchestrator,
        r#"{"route": "financial_advisor", "reason": "needs analysis"}"#,
    );
    client.enqueue(
        AgentId::FinancialAdvisor,
        r#"{"tool": "recurring_payments", "arguments": {}}"#,
    );
    client.enqueue(
        AgentId::FinancialAdvisor,
        r#"{"recommendation": "Your rent and streaming subscriptions recur monthly.",
            "key_insights": ["Two recurring creditors detected"],
            "evidence": ["recurring_payments tool output"],
            "caveats": ["Based on the seeded demo data"]}"#,
    );
    client.enqueue(
        AgentId::Orchestrator,
        r#"{"status": "success", "message": "You pay rent and one streaming service every month."}"#,
    );

    let store: Arc<dyn TransactionStore> = Arc::new(InMemoryTransactionStore::with_transactions(
        sample_transactions(),
    ));
    let engine = OrchestrationEngine::new(client, store);

    let utterances = [
        "hoi!",
        "show my last card payments",
        "what do I pay every month?",
    ];

    for utterance in utterances {
        info!("User: {}", utterance);
        let response = engine.handle(utterance, &[]).await?;
        println!("\n=== {} ===", utterance);
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}
