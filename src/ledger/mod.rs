//! Ledger module containing advance issuing, submission review, settlement
//! and the cash entries kept alongside advances

pub mod advance;
pub mod cash_entry;
pub mod cash_return;
pub mod core;
pub mod expense;
pub mod settlement;

pub use advance::*;
pub use cash_entry::*;
pub use cash_return::*;
pub use self::core::*;
pub use expense::*;
pub use settlement::ApprovalOutcome;
