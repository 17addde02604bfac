//! Error types for the bank assistant orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// A reasoning agent replied with something that is not JSON.
    /// Terminal: the agent broke its contract, so the reply is neither
    /// retried nor repaired field by field.
    #[error("Agent reply is not valid JSON: {0}")]
    MalformedAgentReply(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
