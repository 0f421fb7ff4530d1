//! Cash return submission and review

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::info;

use crate::config::LedgerConfig;
use crate::ledger::advance::{ensure_accepts_submissions, load_submission_advance};
use crate::ledger::settlement::{with_conflict_retry, ApprovalOutcome};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{require_admin, validate_note};

/// Parameters for handing back unused advance cash
#[derive(Debug, Clone)]
pub struct SubmitReturnParams {
    pub advance_id: String,
    pub amount: BigDecimal,
    pub note: String,
}

/// Return manager for handling cash returns and their review
pub struct ReturnManager<S: LedgerStorage> {
    storage: S,
    validator: Arc<dyn SubmissionValidator>,
    max_conflict_retries: u32,
}

impl<S: LedgerStorage> ReturnManager<S> {
    /// Create a new return manager
    pub fn new(storage: S) -> Self {
        Self::with_validator(
            storage,
            Arc::new(DefaultSubmissionValidator::default()),
            LedgerConfig::default().max_conflict_retries,
        )
    }

    /// Create a new return manager with a custom validator
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

    /// Submit a cash return against an active advance
    pub async fn submit_return(
        &self,
        params: SubmitReturnParams,
        submitted_by: &User,
    ) -> LedgerResult<CashReturn> {
        let advance =
            load_submission_advance(&self.storage, &params.advance_id, submitted_by).await?;

        let cash_return = CashReturn {
            id: String::new(),
            advance_id: advance.id.clone(),
            staff_id: advance.staff_id.clone(),
            staff_name: advance.staff_name.clone(),
            amount: params.amount,
            note: params.note,
            date: chrono::Utc::now().naive_utc(),
            status: ReviewStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_note: None,
            version: 0,
        };

        self.validator.validate_return(&cash_return, &advance)?;
        ensure_accepts_submissions(&advance)?;

        let cash_return = self.storage.create_return(cash_return).await?;
        info!(
            return_id = %cash_return.id,
            advance_id = %cash_return.advance_id,
            amount = %cash_return.amount,
            "return submitted"
        );
        Ok(cash_return)
    }

    /// Approve a pending return and fold it into its advance
    pub async fn approve_return(
        &self,
        return_id: &str,
        reviewer: &User,
    ) -> LedgerResult<ApprovalOutcome> {
        require_admin(reviewer, "approve returns")?;

        let outcome = with_conflict_retry("approve_return", self.max_conflict_retries, move || {
            self.try_approve_return(return_id, reviewer)
        })
        .await?;

        info!(
            return_id,
            advance_id = %outcome.advance.id,
            balance_to_settle = %outcome.advance.balance_to_settle,
            settled = outcome.settled,
            "return approved"
        );
        Ok(outcome)
    }

    async fn try_approve_return(
        &self,
        return_id: &str,
        reviewer: &User,
    ) -> LedgerResult<ApprovalOutcome> {
        let mut cash_return = self.get_return_required(return_id).await?;
        let now = chrono::Utc::now().naive_utc();
        cash_return.approve(&reviewer.id, now)?;

        let mut advance = self
            .storage
            .get_advance(&cash_return.advance_id)
            .await?
            .ok_or_else(|| LedgerError::AdvanceNotFound(cash_return.advance_id.clone()))?;
        let settled = advance.apply_return(&cash_return.amount, &reviewer.id, now);

        let unit = UnitOfWork::new()
            .update_return(cash_return)
            .update_advance(advance.clone());
        self.storage.run_atomic(unit).await?;

        advance.version += 1;
        Ok(ApprovalOutcome { advance, settled })
    }

    /// Reject a pending return. The advance is not touched.
    pub async fn reject_return(
        &self,
        return_id: &str,
        reviewer: &User,
        note: &str,
    ) -> LedgerResult<CashReturn> {
        require_admin(reviewer, "reject returns")?;
        validate_note(note, "Rejection note")?;

        let cash_return = with_conflict_retry(
            "reject_return",
            self.max_conflict_retries,
            move || async move {
                let mut cash_return = self.get_return_required(return_id).await?;
                cash_return.reject(&reviewer.id, note, chrono::Utc::now().naive_utc())?;
                self.storage
                    .run_atomic(UnitOfWork::new().update_return(cash_return.clone()))
                    .await?;
                cash_return.version += 1;
                Ok::<_, LedgerError>(cash_return)
            },
        )
        .await?;

        info!(return_id, advance_id = %cash_return.advance_id, "return rejected");
        Ok(cash_return)
    }

    /// Get a return by ID
    pub async fn get_return(&self, return_id: &str) -> LedgerResult<Option<CashReturn>> {
        self.storage.get_return(return_id).await
    }

    /// Get a return by ID, returning an error if not found
    pub async fn get_return_required(&self, return_id: &str) -> LedgerResult<CashReturn> {
        self.storage
            .get_return(return_id)
            .await?
            .ok_or_else(|| LedgerError::ReturnNotFound(return_id.to_string()))
    }

    /// List all returns
    pub async fn list_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        self.storage.list_returns().await
    }

    /// List the returns made against one advance
    pub async fn list_advance_returns(&self, advance_id: &str) -> LedgerResult<Vec<CashReturn>> {
        let returns = self.storage.list_returns().await?;
        Ok(returns
            .into_iter()
            .filter(|cash_return| cash_return.advance_id == advance_id)
            .collect())
    }

    /// Returns awaiting review, oldest first
    pub async fn pending_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        let mut pending: Vec<CashReturn> = self
            .storage
            .list_returns()
            .await?
            .into_iter()
            .filter(CashReturn::is_pending)
            .collect();
        pending.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(pending)
    }
}
