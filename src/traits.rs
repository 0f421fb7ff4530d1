//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::utils::validation::{
    validate_non_negative_amount, validate_note, validate_positive_amount,
};

/// Storage abstraction for the advance ledger
///
/// This trait allows the ledger engine to work with any storage backend
/// (a remote document store, SQL, in-memory, etc.) by implementing these
/// methods. Implementations use interior mutability so a single store can
/// serve many concurrent sessions.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Persist a new advance, assigning its ID and initial version
    async fn create_advance(&self, advance: Advance) -> LedgerResult<Advance>;

    /// Get an advance by ID
    async fn get_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>>;

    /// List all advances
    async fn list_advances(&self) -> LedgerResult<Vec<Advance>>;

    /// Persist a new expense, assigning its ID and initial version
    async fn create_expense(&self, expense: Expense) -> LedgerResult<Expense>;

    /// Get an expense by ID
    async fn get_expense(&self, expense_id: &str) -> LedgerResult<Option<Expense>>;

    /// List all expenses
    async fn list_expenses(&self) -> LedgerResult<Vec<Expense>>;

    /// Persist a new return, assigning its ID and initial version
    async fn create_return(&self, cash_return: CashReturn) -> LedgerResult<CashReturn>;

    /// Get a return by ID
    async fn get_return(&self, return_id: &str) -> LedgerResult<Option<CashReturn>>;

    /// List all returns
    async fn list_returns(&self) -> LedgerResult<Vec<CashReturn>>;

    /// Persist a transport payment, assigning its ID
    async fn create_transport_payment(
        &self,
        payment: TransportPayment,
    ) -> LedgerResult<TransportPayment>;

    /// List all transport payments
    async fn list_transport_payments(&self) -> LedgerResult<Vec<TransportPayment>>;

    /// Persist a cash collection, assigning its ID
    async fn create_collection(&self, collection: CashCollection) -> LedgerResult<CashCollection>;

    /// List all cash collections
    async fn list_collections(&self) -> LedgerResult<Vec<CashCollection>>;

    /// Apply every write in `unit` or none of them.
    ///
    /// Each write carries the version its record was read at. If any stored
    /// version differs, nothing is written and
    /// [`LedgerError::ConcurrencyConflict`] is returned. Committed records
    /// have their version incremented.
    async fn run_atomic(&self, unit: UnitOfWork) -> LedgerResult<()>;
}

/// A single versioned update inside a [`UnitOfWork`]
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicWrite {
    Advance(Advance),
    Expense(Expense),
    Return(CashReturn),
}

impl AtomicWrite {
    /// ID of the record being written
    pub fn record_id(&self) -> &str {
        match self {
            AtomicWrite::Advance(advance) => &advance.id,
            AtomicWrite::Expense(expense) => &expense.id,
            AtomicWrite::Return(cash_return) => &cash_return.id,
        }
    }

    /// Version the record is expected to be at in storage
    pub fn expected_version(&self) -> u64 {
        match self {
            AtomicWrite::Advance(advance) => advance.version,
            AtomicWrite::Expense(expense) => expense.version,
            AtomicWrite::Return(cash_return) => cash_return.version,
        }
    }
}

/// Batch of writes committed all-or-nothing by [`LedgerStorage::run_atomic`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    writes: Vec<AtomicWrite>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_advance(mut self, advance: Advance) -> Self {
        self.writes.push(AtomicWrite::Advance(advance));
        self
    }

    pub fn update_expense(mut self, expense: Expense) -> Self {
        self.writes.push(AtomicWrite::Expense(expense));
        self
    }

    pub fn update_return(mut self, cash_return: CashReturn) -> Self {
        self.writes.push(AtomicWrite::Return(cash_return));
        self
    }

    pub fn writes(&self) -> &[AtomicWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<AtomicWrite> {
        self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

/// Trait for implementing custom submission rules
pub trait SubmissionValidator: Send + Sync {
    /// Validate an expense claim against the advance it is drawn on
    fn validate_expense(&self, expense: &Expense, advance: &Advance) -> LedgerResult<()>;

    /// Validate a cash return against the advance it is drawn on
    fn validate_return(&self, cash_return: &CashReturn, advance: &Advance) -> LedgerResult<()>;
}

/// Default submission validator
///
/// Balance checks read the advance at submission time only; the advance is
/// not reserved, so approvals remain the authoritative settlement step.
#[derive(Debug, Clone)]
pub struct DefaultSubmissionValidator {
    /// Whether a non-zero `others` amount needs remarks
    pub require_remarks_for_others: bool,
}

impl Default for DefaultSubmissionValidator {
    fn default() -> Self {
        Self {
            require_remarks_for_others: true,
        }
    }
}

impl SubmissionValidator for DefaultSubmissionValidator {
    fn validate_expense(&self, expense: &Expense, advance: &Advance) -> LedgerResult<()> {
        for (label, amount) in expense.amounts.iter() {
            validate_non_negative_amount(amount, label)?;
        }

        if expense.total_amount <= BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Total amount must be greater than zero".to_string(),
            ));
        }

        if expense.total_amount > advance.balance_to_settle {
            return Err(LedgerError::Validation(format!(
                "Expense ({}) exceeds remaining advance balance ({})",
                expense.total_amount, advance.balance_to_settle
            )));
        }

        if self.require_remarks_for_others && expense.amounts.others > BigDecimal::from(0) {
            validate_note(&expense.remarks, "Remarks for 'others'")?;
        }

        Ok(())
    }

    fn validate_return(&self, cash_return: &CashReturn, advance: &Advance) -> LedgerResult<()> {
        validate_positive_amount(&cash_return.amount, "Return amount")?;

        if cash_return.amount > advance.balance_to_settle {
            return Err(LedgerError::Validation(format!(
                "Return amount ({}) cannot exceed the balance of {}",
                cash_return.amount, advance.balance_to_settle
            )));
        }

        Ok(())
    }
}

/// Something that happened to the ledger, published after it was committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AdvanceIssued {
        advance_id: String,
        staff_id: String,
        amount: BigDecimal,
    },
    ExpenseSubmitted {
        expense_id: String,
        advance_id: String,
        total_amount: BigDecimal,
    },
    ExpenseApproved {
        expense_id: String,
        advance_id: String,
        balance_to_settle: BigDecimal,
    },
    ExpenseRejected {
        expense_id: String,
        advance_id: String,
    },
    ReturnSubmitted {
        return_id: String,
        advance_id: String,
        amount: BigDecimal,
    },
    ReturnApproved {
        return_id: String,
        advance_id: String,
        balance_to_settle: BigDecimal,
    },
    ReturnRejected {
        return_id: String,
        advance_id: String,
    },
    AdvanceSettled {
        advance_id: String,
        settled_by: String,
    },
    TransportPaymentRecorded {
        payment_id: String,
        staff_id: String,
        company: TransportCompany,
        amount: BigDecimal,
    },
    CollectionRecorded {
        collection_id: String,
        staff_id: String,
        amount: BigDecimal,
    },
}

impl LedgerEvent {
    /// The advance affected by this event, if it concerns one
    pub fn advance_id(&self) -> Option<&str> {
        match self {
            LedgerEvent::AdvanceIssued { advance_id, .. }
            | LedgerEvent::ExpenseSubmitted { advance_id, .. }
            | LedgerEvent::ExpenseApproved { advance_id, .. }
            | LedgerEvent::ExpenseRejected { advance_id, .. }
            | LedgerEvent::ReturnSubmitted { advance_id, .. }
            | LedgerEvent::ReturnApproved { advance_id, .. }
            | LedgerEvent::ReturnRejected { advance_id, .. }
            | LedgerEvent::AdvanceSettled { advance_id, .. } => Some(advance_id),
            LedgerEvent::TransportPaymentRecorded { .. }
            | LedgerEvent::CollectionRecorded { .. } => None,
        }
    }
}

/// Receives ledger events so callers can refresh their views
pub trait LedgerObserver: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}
