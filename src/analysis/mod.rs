//! Deterministic transaction analysis
//!
//! No agent is involved here: everything in this module is plain math over
//! transaction records, exposed to the advisor agent as callable tools.

pub mod aggregate;
pub mod recurring;

pub use aggregate::{summarize, SpendingSummary};
pub use recurring::{detect_recurring_payments, RecurringConfig};
