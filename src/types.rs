//! Core types and data structures for the advance ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Issues advances and reviews submissions; global read/write
    Admin,
    /// Field staff; owns their own advances, expenses and returns
    Staff,
}

/// A user of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
    /// Admin ID who created the user, or `system` for the bootstrap admin
    pub created_by: String,
}

impl User {
    /// Create a new user
    pub fn new(id: String, name: String, email: String, role: Role, created_by: String) -> Self {
        Self {
            id,
            name,
            email,
            role,
            created_at: chrono::Utc::now().naive_utc(),
            created_by,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this user may read or write records owned by `staff_id`
    pub fn can_access(&self, staff_id: &str) -> bool {
        self.is_admin() || self.id == staff_id
    }
}

/// Lifecycle status of an advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceStatus {
    Active,
    Settled,
}

/// Review status shared by expenses and returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Whether an expense has been folded into its advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Settled,
}

/// Money issued to a staff member that must be accounted for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advance {
    /// Assigned by storage on create
    pub id: String,
    pub staff_id: String,
    pub staff_name: String,
    /// Amount originally issued
    pub amount: BigDecimal,
    pub purpose: String,
    /// When the advance was issued
    pub date: NaiveDateTime,
    pub status: AdvanceStatus,
    /// Admin who issued the advance
    pub issued_by: String,
    /// Sum of approved expenses
    pub total_expenses: BigDecimal,
    /// Sum of approved returns
    pub total_returned: BigDecimal,
    /// Always `amount - total_expenses - total_returned`
    pub balance_to_settle: BigDecimal,
    pub settlement_date: Option<NaiveDateTime>,
    pub settled_by: Option<String>,
    /// Optimistic concurrency version, bumped by storage on every write
    pub version: u64,
}

impl Advance {
    /// Create a new, unsaved advance with the full amount outstanding
    pub fn new(
        staff_id: String,
        staff_name: String,
        amount: BigDecimal,
        purpose: String,
        issued_by: String,
    ) -> Self {
        Self {
            id: String::new(),
            staff_id,
            staff_name,
            balance_to_settle: amount.clone(),
            amount,
            purpose,
            date: chrono::Utc::now().naive_utc(),
            status: AdvanceStatus::Active,
            issued_by,
            total_expenses: BigDecimal::from(0),
            total_returned: BigDecimal::from(0),
            settlement_date: None,
            settled_by: None,
            version: 0,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == AdvanceStatus::Settled
    }

    /// Balance derived from the issued amount and the approved totals
    pub fn computed_balance(&self) -> BigDecimal {
        &self.amount - &self.total_expenses - &self.total_returned
    }

    /// Fold an approved expense into the advance.
    ///
    /// Returns `true` when this call moved the advance into `Settled`.
    pub fn apply_expense(
        &mut self,
        amount: &BigDecimal,
        reviewer_id: &str,
        at: NaiveDateTime,
    ) -> bool {
        self.total_expenses += amount;
        self.recompute(reviewer_id, at)
    }

    /// Fold an approved return into the advance.
    ///
    /// Returns `true` when this call moved the advance into `Settled`.
    pub fn apply_return(&mut self, amount: &BigDecimal, reviewer_id: &str, at: NaiveDateTime) -> bool {
        self.total_returned += amount;
        self.recompute(reviewer_id, at)
    }

    fn recompute(&mut self, reviewer_id: &str, at: NaiveDateTime) -> bool {
        self.balance_to_settle = self.computed_balance();

        // Settlement is one-way; an already settled advance keeps its original stamp.
        if self.balance_to_settle <= BigDecimal::from(0) && !self.is_settled() {
            self.status = AdvanceStatus::Settled;
            self.settlement_date = Some(at);
            self.settled_by = Some(reviewer_id.to_string());
            return true;
        }
        false
    }

    /// Snapshot of the settlement figures
    pub fn balance(&self) -> AdvanceBalance {
        AdvanceBalance {
            advance_id: self.id.clone(),
            amount: self.amount.clone(),
            total_expenses: self.total_expenses.clone(),
            total_returned: self.total_returned.clone(),
            balance_to_settle: self.balance_to_settle.clone(),
            status: self.status,
        }
    }
}

/// Current settlement figures of an advance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceBalance {
    pub advance_id: String,
    pub amount: BigDecimal,
    pub total_expenses: BigDecimal,
    pub total_returned: BigDecimal,
    pub balance_to_settle: BigDecimal,
    pub status: AdvanceStatus,
}

/// Main category of an expense claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Transport,
    Bazar,
    Sealdah,
    #[serde(rename = "Out Station")]
    OutStation,
    Paglahat,
    Others,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::Transport,
        ExpenseCategory::Bazar,
        ExpenseCategory::Sealdah,
        ExpenseCategory::OutStation,
        ExpenseCategory::Paglahat,
        ExpenseCategory::Others,
    ];
}

/// Per-category sub-amounts of an expense claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmounts {
    pub fare: BigDecimal,
    pub parking: BigDecimal,
    pub oil: BigDecimal,
    pub breakfast: BigDecimal,
    pub others: BigDecimal,
}

impl Default for CategoryAmounts {
    fn default() -> Self {
        Self {
            fare: BigDecimal::from(0),
            parking: BigDecimal::from(0),
            oil: BigDecimal::from(0),
            breakfast: BigDecimal::from(0),
            others: BigDecimal::from(0),
        }
    }
}

impl CategoryAmounts {
    pub fn fare(mut self, amount: BigDecimal) -> Self {
        self.fare = amount;
        self
    }

    pub fn parking(mut self, amount: BigDecimal) -> Self {
        self.parking = amount;
        self
    }

    pub fn oil(mut self, amount: BigDecimal) -> Self {
        self.oil = amount;
        self
    }

    pub fn breakfast(mut self, amount: BigDecimal) -> Self {
        self.breakfast = amount;
        self
    }

    pub fn others(mut self, amount: BigDecimal) -> Self {
        self.others = amount;
        self
    }

    /// Iterate over `(label, amount)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &BigDecimal)> {
        [
            ("fare", &self.fare),
            ("parking", &self.parking),
            ("oil", &self.oil),
            ("breakfast", &self.breakfast),
            ("others", &self.others),
        ]
        .into_iter()
    }

    /// Sum of all sub-amounts
    pub fn total(&self) -> BigDecimal {
        self.iter().map(|(_, amount)| amount).sum()
    }
}

/// A spend claim against an advance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub advance_id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub category: ExpenseCategory,
    pub sub_category: String,
    #[serde(flatten)]
    pub amounts: CategoryAmounts,
    /// Required when `amounts.others` is non-zero
    pub remarks: String,
    /// Always `amounts.total()`
    pub total_amount: BigDecimal,
    /// Opaque reference to an attached bill image
    pub bill_image: Option<String>,
    /// Submission date
    pub date: NaiveDateTime,
    pub status: ReviewStatus,
    pub settlement_status: SettlementStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub rejection_note: Option<String>,
    pub version: u64,
}

impl Expense {
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }

    fn ensure_pending(&self) -> LedgerResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(LedgerError::InvalidState(format!(
                "Expense '{}' already {}",
                self.id, self.status
            )))
        }
    }

    /// Mark the expense approved and settled against its advance
    pub fn approve(&mut self, reviewer_id: &str, at: NaiveDateTime) -> LedgerResult<()> {
        self.ensure_pending()?;
        self.status = ReviewStatus::Approved;
        self.settlement_status = SettlementStatus::Settled;
        self.reviewed_by = Some(reviewer_id.to_string());
        self.reviewed_at = Some(at);
        Ok(())
    }

    /// Mark the expense rejected; rejection is terminal
    pub fn reject(&mut self, reviewer_id: &str, note: &str, at: NaiveDateTime) -> LedgerResult<()> {
        self.ensure_pending()?;
        self.status = ReviewStatus::Rejected;
        self.reviewed_by = Some(reviewer_id.to_string());
        self.reviewed_at = Some(at);
        self.rejection_note = Some(note.to_string());
        Ok(())
    }
}

/// Unused advance cash handed back by a staff member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashReturn {
    pub id: String,
    pub advance_id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub amount: BigDecimal,
    /// Reason for the return
    pub note: String,
    pub date: NaiveDateTime,
    pub status: ReviewStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub rejection_note: Option<String>,
    pub version: u64,
}

impl CashReturn {
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }

    fn ensure_pending(&self) -> LedgerResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(LedgerError::InvalidState(format!(
                "Return '{}' already {}",
                self.id, self.status
            )))
        }
    }

    pub fn approve(&mut self, reviewer_id: &str, at: NaiveDateTime) -> LedgerResult<()> {
        self.ensure_pending()?;
        self.status = ReviewStatus::Approved;
        self.reviewed_by = Some(reviewer_id.to_string());
        self.reviewed_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, reviewer_id: &str, note: &str, at: NaiveDateTime) -> LedgerResult<()> {
        self.ensure_pending()?;
        self.status = ReviewStatus::Rejected;
        self.reviewed_by = Some(reviewer_id.to_string());
        self.reviewed_at = Some(at);
        self.rejection_note = Some(note.to_string());
        Ok(())
    }
}

/// Transport operator a payment was made to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportCompany {
    Truck,
    Canter,
    #[serde(rename = "Tata Ace")]
    TataAce,
    Bolero,
}

impl TransportCompany {
    pub const ALL: [TransportCompany; 4] = [
        TransportCompany::Truck,
        TransportCompany::Canter,
        TransportCompany::TataAce,
        TransportCompany::Bolero,
    ];
}

/// Cash a staff member paid out to a transport operator.
///
/// Recorded as entered; it is not drawn on an advance and needs no review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportPayment {
    pub id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub company: TransportCompany,
    pub amount: BigDecimal,
    pub details: String,
    pub date: NaiveDateTime,
    /// User who keyed the entry in
    pub entered_by: String,
}

/// Cash a staff member collected from a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashCollection {
    pub id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub amount: BigDecimal,
    /// Customer or other source of the cash
    pub source: String,
    pub details: String,
    pub date: NaiveDateTime,
    pub entered_by: String,
}

/// Errors that can occur in the ledger system
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Advance not found: {0}")]
    AdvanceNotFound(String),
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),
    #[error("Return not found: {0}")]
    ReturnNotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::AdvanceNotFound(_)
                | LedgerError::ExpenseNotFound(_)
                | LedgerError::ReturnNotFound(_)
        )
    }

    /// Only optimistic concurrency failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
