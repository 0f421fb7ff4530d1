//! # Advance Ledger
//!
//! A settlement ledger for cash advances issued to field staff. Staff log
//! expenses and cash returns against an advance; administrators approve or
//! reject them, and every approval recomputes the advance's outstanding
//! balance until it settles.
//!
//! ## Features
//!
//! - **Advance lifecycle**: issue, track and auto-settle advances
//! - **Expense claims**: category amounts, remarks rules, approval and rejection
//! - **Cash returns**: hand back unused cash against an advance
//! - **Atomic settlement**: approvals commit the submission and the advance
//!   together under optimistic concurrency, retrying on conflicts
//! - **Cash entries**: transport payments and customer collections logged by staff
//! - **Reports**: staff summaries, date-ranged listings, per-company transport
//!   totals and integrity checks
//! - **Storage abstraction**: backend-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use advance_ledger::utils::MemoryStorage;
//! use advance_ledger::{IssueAdvanceParams, LedgerEngine, Role, User};
//! use bigdecimal::BigDecimal;
//!
//! # async fn run() -> advance_ledger::LedgerResult<()> {
//! let engine = LedgerEngine::new(MemoryStorage::new());
//! let admin = User::new(
//!     "admin".to_string(),
//!     "Admin".to_string(),
//!     "admin@example.com".to_string(),
//!     Role::Admin,
//!     "system".to_string(),
//! );
//!
//! let advance = engine
//!     .issue_advance(
//!         IssueAdvanceParams {
//!             staff_id: "staff1".to_string(),
//!             staff_name: "Ravi".to_string(),
//!             amount: BigDecimal::from(5000),
//!             purpose: "Market visit".to_string(),
//!         },
//!         &admin,
//!     )
//!     .await?;
//! assert_eq!(advance.balance_to_settle, BigDecimal::from(5000));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod reports;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::LedgerConfig;
pub use ledger::*;
pub use reports::{CompanyTotal, LedgerIntegrityReport, ReportRange, StaffSummary};
pub use traits::*;
pub use types::*;
