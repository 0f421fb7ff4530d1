//! Main ledger engine that coordinates advances, expenses and returns

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::config::LedgerConfig;
use crate::ledger::{
    AdvanceManager, ApprovalOutcome, CashEntryManager, ExpenseManager, IssueAdvanceParams,
    RecordCollectionParams, RecordTransportPaymentParams, ReturnManager, SubmitExpenseParams,
    SubmitReturnParams,
};
use crate::reports::{self, CompanyTotal, LedgerIntegrityReport, ReportRange, StaffSummary};
use crate::traits::*;
use crate::types::*;

/// Main ledger engine that orchestrates all settlement operations
///
/// The engine is generic over its storage backend, so the same settlement
/// rules run against an in-memory store in tests and a remote store in
/// production. All operations take `&self`; a single engine can be shared
/// between concurrent sessions.
pub struct LedgerEngine<S: LedgerStorage> {
    advance_manager: AdvanceManager<S>,
    expense_manager: ExpenseManager<S>,
    return_manager: ReturnManager<S>,
    cash_entry_manager: CashEntryManager<S>,
    observers: Vec<Box<dyn LedgerObserver>>,
    config: LedgerConfig,
}

impl<S: LedgerStorage + Clone> LedgerEngine<S> {
    /// Create a new engine with the given storage backend
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, LedgerConfig::default())
    }

    /// Create a new engine with explicit configuration
    pub fn with_config(storage: S, config: LedgerConfig) -> Self {
        let validator = DefaultSubmissionValidator {
            require_remarks_for_others: config.require_remarks_for_others,
        };
        Self::with_validator(storage, config, Arc::new(validator))
    }

    /// Create a new engine with a custom submission validator
    pub fn with_validator(
        storage: S,
        config: LedgerConfig,
        validator: Arc<dyn SubmissionValidator>,
    ) -> Self {
        let retries = config.max_conflict_retries;
        Self {
            advance_manager: AdvanceManager::new(storage.clone()),
            expense_manager: ExpenseManager::with_validator(
                storage.clone(),
                validator.clone(),
                retries,
            ),
            return_manager: ReturnManager::with_validator(storage.clone(), validator, retries),
            cash_entry_manager: CashEntryManager::new(storage),
            observers: Vec::new(),
            config,
        }
    }
}

impl<S: LedgerStorage> LedgerEngine<S> {
    /// Register an observer notified after every committed mutation
    pub fn add_observer(&mut self, observer: Box<dyn LedgerObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn notify(&self, event: LedgerEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    fn notify_settlement(&self, outcome: &ApprovalOutcome) {
        if outcome.settled {
            if let Some(settled_by) = &outcome.advance.settled_by {
                self.notify(LedgerEvent::AdvanceSettled {
                    advance_id: outcome.advance.id.clone(),
                    settled_by: settled_by.clone(),
                });
            }
        }
    }

    // Advance operations
    /// Issue a new advance
    pub async fn issue_advance(
        &self,
        params: IssueAdvanceParams,
        issued_by: &User,
    ) -> LedgerResult<Advance> {
        let advance = self.advance_manager.issue_advance(params, issued_by).await?;
        self.notify(LedgerEvent::AdvanceIssued {
            advance_id: advance.id.clone(),
            staff_id: advance.staff_id.clone(),
            amount: advance.amount.clone(),
        });
        Ok(advance)
    }

    /// Get an advance by ID
    pub async fn get_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>> {
        self.advance_manager.get_advance(advance_id).await
    }

    /// Get an advance by ID, returning an error if not found
    pub async fn get_advance_required(&self, advance_id: &str) -> LedgerResult<Advance> {
        self.advance_manager.get_advance_required(advance_id).await
    }

    /// Re-read an advance after a mutation; a vanished advance is not an error
    pub async fn refresh_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>> {
        match self.advance_manager.get_advance_required(advance_id).await {
            Ok(advance) => Ok(Some(advance)),
            Err(err) if err.is_not_found() => {
                debug!(advance_id, "advance gone during refresh");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// List all advances
    pub async fn list_advances(&self) -> LedgerResult<Vec<Advance>> {
        self.advance_manager.list_advances().await
    }

    /// List the advances issued to one staff member
    pub async fn list_staff_advances(&self, staff_id: &str) -> LedgerResult<Vec<Advance>> {
        self.advance_manager.list_staff_advances(staff_id).await
    }

    /// Current settlement figures of an advance
    pub async fn advance_balance(&self, advance_id: &str) -> LedgerResult<AdvanceBalance> {
        self.advance_manager.advance_balance(advance_id).await
    }

    // Expense operations
    /// Submit an expense claim for review
    pub async fn submit_expense(
        &self,
        params: SubmitExpenseParams,
        submitted_by: &User,
    ) -> LedgerResult<Expense> {
        let expense = self
            .expense_manager
            .submit_expense(params, submitted_by)
            .await?;
        self.notify(LedgerEvent::ExpenseSubmitted {
            expense_id: expense.id.clone(),
            advance_id: expense.advance_id.clone(),
            total_amount: expense.total_amount.clone(),
        });
        Ok(expense)
    }

    /// Approve an expense and recompute its advance
    pub async fn approve_expense(
        &self,
        expense_id: &str,
        reviewer: &User,
    ) -> LedgerResult<ApprovalOutcome> {
        let outcome = self
            .expense_manager
            .approve_expense(expense_id, reviewer)
            .await?;
        self.notify(LedgerEvent::ExpenseApproved {
            expense_id: expense_id.to_string(),
            advance_id: outcome.advance.id.clone(),
            balance_to_settle: outcome.advance.balance_to_settle.clone(),
        });
        self.notify_settlement(&outcome);
        Ok(outcome)
    }

    /// Reject an expense with a note
    pub async fn reject_expense(
        &self,
        expense_id: &str,
        reviewer: &User,
        note: &str,
    ) -> LedgerResult<Expense> {
        let expense = self
            .expense_manager
            .reject_expense(expense_id, reviewer, note)
            .await?;
        self.notify(LedgerEvent::ExpenseRejected {
            expense_id: expense.id.clone(),
            advance_id: expense.advance_id.clone(),
        });
        Ok(expense)
    }

    /// Get an expense by ID
    pub async fn get_expense(&self, expense_id: &str) -> LedgerResult<Option<Expense>> {
        self.expense_manager.get_expense(expense_id).await
    }

    /// List all expenses
    pub async fn list_expenses(&self) -> LedgerResult<Vec<Expense>> {
        self.expense_manager.list_expenses().await
    }

    /// List the expenses drawn on one advance
    pub async fn list_advance_expenses(&self, advance_id: &str) -> LedgerResult<Vec<Expense>> {
        self.expense_manager.list_advance_expenses(advance_id).await
    }

    /// Expenses awaiting review, oldest first
    pub async fn pending_expenses(&self) -> LedgerResult<Vec<Expense>> {
        self.expense_manager.pending_expenses().await
    }

    // Return operations
    /// Submit a cash return for review
    pub async fn submit_return(
        &self,
        params: SubmitReturnParams,
        submitted_by: &User,
    ) -> LedgerResult<CashReturn> {
        let cash_return = self
            .return_manager
            .submit_return(params, submitted_by)
            .await?;
        self.notify(LedgerEvent::ReturnSubmitted {
            return_id: cash_return.id.clone(),
            advance_id: cash_return.advance_id.clone(),
            amount: cash_return.amount.clone(),
        });
        Ok(cash_return)
    }

    /// Approve a return and recompute its advance
    pub async fn approve_return(
        &self,
        return_id: &str,
        reviewer: &User,
    ) -> LedgerResult<ApprovalOutcome> {
        let outcome = self
            .return_manager
            .approve_return(return_id, reviewer)
            .await?;
        self.notify(LedgerEvent::ReturnApproved {
            return_id: return_id.to_string(),
            advance_id: outcome.advance.id.clone(),
            balance_to_settle: outcome.advance.balance_to_settle.clone(),
        });
        self.notify_settlement(&outcome);
        Ok(outcome)
    }

    /// Reject a return with a note
    pub async fn reject_return(
        &self,
        return_id: &str,
        reviewer: &User,
        note: &str,
    ) -> LedgerResult<CashReturn> {
        let cash_return = self
            .return_manager
            .reject_return(return_id, reviewer, note)
            .await?;
        self.notify(LedgerEvent::ReturnRejected {
            return_id: cash_return.id.clone(),
            advance_id: cash_return.advance_id.clone(),
        });
        Ok(cash_return)
    }

    /// Get a return by ID
    pub async fn get_return(&self, return_id: &str) -> LedgerResult<Option<CashReturn>> {
        self.return_manager.get_return(return_id).await
    }

    /// List all returns
    pub async fn list_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        self.return_manager.list_returns().await
    }

    /// List the returns made against one advance
    pub async fn list_advance_returns(&self, advance_id: &str) -> LedgerResult<Vec<CashReturn>> {
        self.return_manager.list_advance_returns(advance_id).await
    }

    /// Returns awaiting review, oldest first
    pub async fn pending_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        self.return_manager.pending_returns().await
    }

    // Cash entry operations
    /// Log a payment made to a transport operator
    pub async fn record_transport_payment(
        &self,
        params: RecordTransportPaymentParams,
        entered_by: &User,
    ) -> LedgerResult<TransportPayment> {
        let payment = self
            .cash_entry_manager
            .record_transport_payment(params, entered_by)
            .await?;
        self.notify(LedgerEvent::TransportPaymentRecorded {
            payment_id: payment.id.clone(),
            staff_id: payment.staff_id.clone(),
            company: payment.company,
            amount: payment.amount.clone(),
        });
        Ok(payment)
    }

    /// Log cash collected from a customer
    pub async fn record_collection(
        &self,
        params: RecordCollectionParams,
        entered_by: &User,
    ) -> LedgerResult<CashCollection> {
        let collection = self
            .cash_entry_manager
            .record_collection(params, entered_by)
            .await?;
        self.notify(LedgerEvent::CollectionRecorded {
            collection_id: collection.id.clone(),
            staff_id: collection.staff_id.clone(),
            amount: collection.amount.clone(),
        });
        Ok(collection)
    }

    pub async fn list_transport_payments(&self) -> LedgerResult<Vec<TransportPayment>> {
        self.cash_entry_manager.list_transport_payments().await
    }

    pub async fn list_collections(&self) -> LedgerResult<Vec<CashCollection>> {
        self.cash_entry_manager.list_collections().await
    }

    // Visibility
    /// Advances the user may see: all for admins, their own for staff
    pub async fn list_visible_advances(&self, user: &User) -> LedgerResult<Vec<Advance>> {
        let advances = self.list_advances().await?;
        Ok(advances
            .into_iter()
            .filter(|advance| user.can_access(&advance.staff_id))
            .collect())
    }

    /// Expenses the user may see
    pub async fn list_visible_expenses(&self, user: &User) -> LedgerResult<Vec<Expense>> {
        let expenses = self.list_expenses().await?;
        Ok(expenses
            .into_iter()
            .filter(|expense| user.can_access(&expense.staff_id))
            .collect())
    }

    /// Returns the user may see
    pub async fn list_visible_returns(&self, user: &User) -> LedgerResult<Vec<CashReturn>> {
        let returns = self.list_returns().await?;
        Ok(returns
            .into_iter()
            .filter(|cash_return| user.can_access(&cash_return.staff_id))
            .collect())
    }

    /// Transport payments the user may see
    pub async fn list_visible_transport_payments(
        &self,
        user: &User,
    ) -> LedgerResult<Vec<TransportPayment>> {
        let payments = self.list_transport_payments().await?;
        Ok(payments
            .into_iter()
            .filter(|payment| user.can_access(&payment.staff_id))
            .collect())
    }

    /// Collections the user may see
    pub async fn list_visible_collections(&self, user: &User) -> LedgerResult<Vec<CashCollection>> {
        let collections = self.list_collections().await?;
        Ok(collections
            .into_iter()
            .filter(|collection| user.can_access(&collection.staff_id))
            .collect())
    }

    // Reporting operations
    /// Build a report range bounded by the configured maximum span
    pub fn report_range(&self, start: NaiveDate, end: NaiveDate) -> LedgerResult<ReportRange> {
        ReportRange::new(start, end, self.config.max_report_days)
    }

    /// Advances issued within a date range
    pub async fn advances_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<Advance>> {
        let range = self.report_range(start, end)?;
        Ok(reports::filter_in_range(self.list_advances().await?, &range))
    }

    /// Expenses submitted within a date range
    pub async fn expenses_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<Expense>> {
        let range = self.report_range(start, end)?;
        Ok(reports::filter_in_range(self.list_expenses().await?, &range))
    }

    /// Returns submitted within a date range
    pub async fn returns_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<CashReturn>> {
        let range = self.report_range(start, end)?;
        Ok(reports::filter_in_range(self.list_returns().await?, &range))
    }

    /// Transport payments made within a date range, optionally for one company
    pub async fn transport_payments_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        company: Option<TransportCompany>,
    ) -> LedgerResult<Vec<TransportPayment>> {
        let range = self.report_range(start, end)?;
        let payments = reports::filter_in_range(self.list_transport_payments().await?, &range);
        Ok(match company {
            Some(company) => payments
                .into_iter()
                .filter(|payment| payment.company == company)
                .collect(),
            None => payments,
        })
    }

    /// Collections made within a date range
    pub async fn collections_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<CashCollection>> {
        let range = self.report_range(start, end)?;
        Ok(reports::filter_in_range(self.list_collections().await?, &range))
    }

    /// Per-company transport totals within a date range
    pub async fn transport_company_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<CompanyTotal>> {
        let payments = self.transport_payments_in_range(start, end, None).await?;
        Ok(reports::company_totals(&payments))
    }

    /// Totals across one staff member's advances
    pub async fn staff_summary(&self, staff_id: &str) -> LedgerResult<StaffSummary> {
        let advances = self.list_advances().await?;
        let expenses = self.list_expenses().await?;
        let returns = self.list_returns().await?;
        Ok(reports::summarize_staff(
            staff_id, &advances, &expenses, &returns,
        ))
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(&self) -> LedgerResult<LedgerIntegrityReport> {
        let advances = self.list_advances().await?;
        let expenses = self.list_expenses().await?;
        let returns = self.list_returns().await?;
        Ok(reports::check_integrity(&advances, &expenses, &returns))
    }
}
