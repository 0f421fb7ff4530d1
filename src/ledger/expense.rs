//! Expense submission and review

use std::sync::Arc;
use tracing::info;

use crate::config::LedgerConfig;
use crate::ledger::advance::{ensure_accepts_submissions, load_submission_advance};
use crate::ledger::settlement::{with_conflict_retry, ApprovalOutcome};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{require_admin, validate_note};

/// Parameters for submitting an expense claim
#[derive(Debug, Clone)]
pub struct SubmitExpenseParams {
    pub advance_id: String,
    pub category: ExpenseCategory,
    pub sub_category: String,
    pub amounts: CategoryAmounts,
    pub remarks: String,
    pub bill_image: Option<String>,
}

/// Expense manager for handling expense claims and their review
pub struct ExpenseManager<S: LedgerStorage> {
    storage: S,
    validator: Arc<dyn SubmissionValidator>,
    max_conflict_retries: u32,
}

impl<S: LedgerStorage> ExpenseManager<S> {
    /// Create a new expense manager
    pub fn new(storage: S) -> Self {
        Self::with_validator(
            storage,
            Arc::new(DefaultSubmissionValidator::default()),
            LedgerConfig::default().max_conflict_retries,
        )
    }

    /// Create a new expense manager with a custom validator
    pub fn with_validator(
        storage: S,
        validator: Arc<dyn SubmissionValidator>,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            storage,
            validator,
            max_conflict_retries,
        }
    }

    /// Submit an expense claim against an active advance.
    ///
    /// The claim is attributed to the advance's staff member. The advance is
    /// read but not modified.
    pub async fn submit_expense(
        &self,
        params: SubmitExpenseParams,
        submitted_by: &User,
    ) -> LedgerResult<Expense> {
        let advance =
            load_submission_advance(&self.storage, &params.advance_id, submitted_by).await?;

        let total_amount = params.amounts.total();
        let expense = Expense {
            id: String::new(),
            advance_id: advance.id.clone(),
            staff_id: advance.staff_id.clone(),
            staff_name: advance.staff_name.clone(),
            category: params.category,
            sub_category: params.sub_category,
            amounts: params.amounts,
            remarks: params.remarks,
            total_amount,
            bill_image: params.bill_image,
            date: chrono::Utc::now().naive_utc(),
            status: ReviewStatus::Pending,
            settlement_status: SettlementStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_note: None,
            version: 0,
        };

        self.validator.validate_expense(&expense, &advance)?;
        ensure_accepts_submissions(&advance)?;

        let expense = self.storage.create_expense(expense).await?;
        info!(
            expense_id = %expense.id,
            advance_id = %expense.advance_id,
            total_amount = %expense.total_amount,
            "expense submitted"
        );
        Ok(expense)
    }

    /// Approve a pending expense and fold it into its advance.
    ///
    /// The expense and the advance are committed together; a conflicting
    /// concurrent write causes the whole approval to be re-read and retried.
    pub async fn approve_expense(
        &self,
        expense_id: &str,
        reviewer: &User,
    ) -> LedgerResult<ApprovalOutcome> {
        require_admin(reviewer, "approve expenses")?;

        let outcome = with_conflict_retry("approve_expense", self.max_conflict_retries, move || {
            self.try_approve_expense(expense_id, reviewer)
        })
        .await?;

        info!(
            expense_id,
            advance_id = %outcome.advance.id,
            balance_to_settle = %outcome.advance.balance_to_settle,
            settled = outcome.settled,
            "expense approved"
        );
        Ok(outcome)
    }

    async fn try_approve_expense(
        &self,
        expense_id: &str,
        reviewer: &User,
    ) -> LedgerResult<ApprovalOutcome> {
        let mut expense = self.get_expense_required(expense_id).await?;
        let now = chrono::Utc::now().naive_utc();
        expense.approve(&reviewer.id, now)?;

        let mut advance = self
            .storage
            .get_advance(&expense.advance_id)
            .await?
            .ok_or_else(|| LedgerError::AdvanceNotFound(expense.advance_id.clone()))?;
        let settled = advance.apply_expense(&expense.total_amount, &reviewer.id, now);

        let unit = UnitOfWork::new()
            .update_expense(expense)
            .update_advance(advance.clone());
        self.storage.run_atomic(unit).await?;

        advance.version += 1;
        Ok(ApprovalOutcome { advance, settled })
    }

    /// Reject a pending expense. The advance is not touched.
    pub async fn reject_expense(
        &self,
        expense_id: &str,
        reviewer: &User,
        note: &str,
    ) -> LedgerResult<Expense> {
        require_admin(reviewer, "reject expenses")?;
        validate_note(note, "Rejection note")?;

        let expense = with_conflict_retry(
            "reject_expense",
            self.max_conflict_retries,
            move || async move {
                let mut expense = self.get_expense_required(expense_id).await?;
                expense.reject(&reviewer.id, note, chrono::Utc::now().naive_utc())?;
                self.storage
                    .run_atomic(UnitOfWork::new().update_expense(expense.clone()))
                    .await?;
                expense.version += 1;
                Ok::<_, LedgerError>(expense)
            },
        )
        .await?;

        info!(expense_id, advance_id = %expense.advance_id, "expense rejected");
        Ok(expense)
    }

    /// Get an expense by ID
    pub async fn get_expense(&self, expense_id: &str) -> LedgerResult<Option<Expense>> {
        self.storage.get_expense(expense_id).await
    }

    /// Get an expense by ID, returning an error if not found
    pub async fn get_expense_required(&self, expense_id: &str) -> LedgerResult<Expense> {
        self.storage
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| LedgerError::ExpenseNotFound(expense_id.to_string()))
    }

    /// List all expenses
    pub async fn list_expenses(&self) -> LedgerResult<Vec<Expense>> {
        self.storage.list_expenses().await
    }

    /// List the expenses drawn on one advance
    pub async fn list_advance_expenses(&self, advance_id: &str) -> LedgerResult<Vec<Expense>> {
        let expenses = self.storage.list_expenses().await?;
        Ok(expenses
            .into_iter()
            .filter(|expense| expense.advance_id == advance_id)
            .collect())
    }

    /// Expenses awaiting review, oldest first
    pub async fn pending_expenses(&self) -> LedgerResult<Vec<Expense>> {
        let mut pending: Vec<Expense> = self
            .storage
            .list_expenses()
            .await?
            .into_iter()
            .filter(Expense::is_pending)
            .collect();
        pending.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(pending)
    }
}
