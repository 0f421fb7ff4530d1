//! Advance issuing and balance queries

use bigdecimal::BigDecimal;
use tracing::{debug, info};

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{
    require_access, require_admin, validate_note, validate_positive_amount, validate_record_id,
};

/// Parameters for issuing an advance
#[derive(Debug, Clone)]
pub struct IssueAdvanceParams {
    pub staff_id: String,
    pub staff_name: String,
    pub amount: BigDecimal,
    pub purpose: String,
}

/// Advance manager for issuing advances and reading their balances
pub struct AdvanceManager<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> AdvanceManager<S> {
    /// Create a new advance manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Issue a new advance to a staff member
    pub async fn issue_advance(
        &self,
        params: IssueAdvanceParams,
        issued_by: &User,
    ) -> LedgerResult<Advance> {
        require_admin(issued_by, "issue advances")?;
        validate_record_id(&params.staff_id, "Staff")?;
        validate_note(&params.staff_name, "Staff name")?;
        validate_note(&params.purpose, "Purpose")?;
        validate_positive_amount(&params.amount, "Advance amount")?;

        let advance = Advance::new(
            params.staff_id,
            params.staff_name,
            params.amount,
            params.purpose,
            issued_by.id.clone(),
        );
        let advance = self.storage.create_advance(advance).await?;

        info!(
            advance_id = %advance.id,
            staff_id = %advance.staff_id,
            amount = %advance.amount,
            "advance issued"
        );
        Ok(advance)
    }

    /// Get an advance by ID
    pub async fn get_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>> {
        debug!(advance_id, "loading advance");
        self.storage.get_advance(advance_id).await
    }

    /// Get an advance by ID, returning an error if not found
    pub async fn get_advance_required(&self, advance_id: &str) -> LedgerResult<Advance> {
        self.storage
            .get_advance(advance_id)
            .await?
            .ok_or_else(|| LedgerError::AdvanceNotFound(advance_id.to_string()))
    }

    /// List all advances
    pub async fn list_advances(&self) -> LedgerResult<Vec<Advance>> {
        self.storage.list_advances().await
    }

    /// List the advances issued to one staff member
    pub async fn list_staff_advances(&self, staff_id: &str) -> LedgerResult<Vec<Advance>> {
        let advances = self.storage.list_advances().await?;
        Ok(advances
            .into_iter()
            .filter(|advance| advance.staff_id == staff_id)
            .collect())
    }

    /// Current settlement figures of an advance
    pub async fn advance_balance(&self, advance_id: &str) -> LedgerResult<AdvanceBalance> {
        Ok(self.get_advance_required(advance_id).await?.balance())
    }
}

/// Load the advance a submission is drawn on and check the submitter may use it
pub(crate) async fn load_submission_advance<S: LedgerStorage>(
    storage: &S,
    advance_id: &str,
    submitted_by: &User,
) -> LedgerResult<Advance> {
    let advance = storage
        .get_advance(advance_id)
        .await?
        .ok_or_else(|| LedgerError::AdvanceNotFound(advance_id.to_string()))?;

    require_access(submitted_by, &advance.staff_id)?;
    Ok(advance)
}

/// Refuse new submissions on a settled advance.
///
/// Runs after the submission validator, so the default balance check reports
/// an over-balance claim as a validation error first.
pub(crate) fn ensure_accepts_submissions(advance: &Advance) -> LedgerResult<()> {
    if advance.is_settled() {
        return Err(LedgerError::InvalidState(format!(
            "Advance '{}' is already settled",
            advance.id
        )));
    }
    Ok(())
}
