//! Bank Assistant Orchestrator
//!
//! Routes a free-text user utterance through a small pipeline of reasoning
//! agents and produces a structured response:
//! - A conversational agent turns the utterance into a TaskSpec
//! - Trivial intents (greetings, today's date) short-circuit immediately
//! - An orchestrator agent picks a route, defensively normalized to one of
//!   db_search / financial_advisor / clarify / reject
//! - Data searches run through an allow-listing filter sanitizer and a
//!   paginating query executor; advice requests go to a tool-capable
//!   advisor agent
//! - A finalize call renders the result, degrading safely when it fails
//!
//! Every agent output is untrusted structured text; the pipeline's job is
//! to make something safe out of it or to ask the user instead.

pub mod agents;
pub mod analysis;
pub mod api;
pub mod engine;
pub mod error;
pub mod filters;
pub mod models;
pub mod routing;
pub mod store;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use engine::OrchestrationEngine;
pub use models::*;
