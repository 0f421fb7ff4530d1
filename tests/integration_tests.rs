//! Integration tests for advance-ledger

use advance_ledger::{
    utils::MemoryStorage, Advance, AdvanceStatus, CashCollection, CashReturn, CategoryAmounts,
    Expense, ExpenseCategory, IssueAdvanceParams, LedgerConfig, LedgerEngine, LedgerError,
    LedgerResult, LedgerStorage, RecordCollectionParams, RecordTransportPaymentParams,
    ReviewStatus, Role, SettlementStatus, SubmissionValidator, SubmitExpenseParams,
    SubmitReturnParams, TransportCompany, TransportPayment, UnitOfWork, User,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn admin() -> User {
    User::new(
        "admin1".to_string(),
        "Office Admin".to_string(),
        "admin@example.com".to_string(),
        Role::Admin,
        "system".to_string(),
    )
}

fn staff(id: &str) -> User {
    User::new(
        id.to_string(),
        format!("Staff {id}"),
        format!("{id}@example.com"),
        Role::Staff,
        "admin1".to_string(),
    )
}

async fn issue<S: LedgerStorage + Clone>(
    engine: &LedgerEngine<S>,
    staff_id: &str,
    amount: i64,
) -> Advance {
    engine
        .issue_advance(
            IssueAdvanceParams {
                staff_id: staff_id.to_string(),
                staff_name: format!("Staff {staff_id}"),
                amount: BigDecimal::from(amount),
                purpose: "Field visit".to_string(),
            },
            &admin(),
        )
        .await
        .unwrap()
}

fn fare_claim(advance_id: &str, fare: i64) -> SubmitExpenseParams {
    SubmitExpenseParams {
        advance_id: advance_id.to_string(),
        category: ExpenseCategory::Transport,
        sub_category: "Auto rickshaw".to_string(),
        amounts: CategoryAmounts::default().fare(BigDecimal::from(fare)),
        remarks: String::new(),
        bill_image: None,
    }
}

fn return_of(advance_id: &str, amount: i64) -> SubmitReturnParams {
    SubmitReturnParams {
        advance_id: advance_id.to_string(),
        amount: BigDecimal::from(amount),
        note: "Unused cash".to_string(),
    }
}

fn assert_balance_invariants(advance: &Advance) {
    assert_eq!(
        advance.balance_to_settle,
        &advance.amount - &advance.total_expenses - &advance.total_returned
    );
    assert_eq!(
        advance.status == AdvanceStatus::Settled,
        advance.balance_to_settle <= BigDecimal::from(0)
    );
}

/// Yields after every advance read so concurrent approvals interleave
#[derive(Clone, Default)]
struct InterleavingStorage {
    inner: MemoryStorage,
    conflicts: Arc<AtomicU32>,
}

#[async_trait]
impl LedgerStorage for InterleavingStorage {
    async fn create_advance(&self, advance: Advance) -> LedgerResult<Advance> {
        self.inner.create_advance(advance).await
    }

    async fn get_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>> {
        let advance = self.inner.get_advance(advance_id).await;
        tokio::task::yield_now().await;
        advance
    }

    async fn list_advances(&self) -> LedgerResult<Vec<Advance>> {
        self.inner.list_advances().await
    }

    async fn create_expense(&self, expense: Expense) -> LedgerResult<Expense> {
        self.inner.create_expense(expense).await
    }

    async fn get_expense(&self, expense_id: &str) -> LedgerResult<Option<Expense>> {
        self.inner.get_expense(expense_id).await
    }

    async fn list_expenses(&self) -> LedgerResult<Vec<Expense>> {
        self.inner.list_expenses().await
    }

    async fn create_return(&self, cash_return: CashReturn) -> LedgerResult<CashReturn> {
        self.inner.create_return(cash_return).await
    }

    async fn get_return(&self, return_id: &str) -> LedgerResult<Option<CashReturn>> {
        self.inner.get_return(return_id).await
    }

    async fn list_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        self.inner.list_returns().await
    }

    async fn create_transport_payment(
        &self,
        payment: TransportPayment,
    ) -> LedgerResult<TransportPayment> {
        self.inner.create_transport_payment(payment).await
    }

    async fn list_transport_payments(&self) -> LedgerResult<Vec<TransportPayment>> {
        self.inner.list_transport_payments().await
    }

    async fn create_collection(&self, collection: CashCollection) -> LedgerResult<CashCollection> {
        self.inner.create_collection(collection).await
    }

    async fn list_collections(&self) -> LedgerResult<Vec<CashCollection>> {
        self.inner.list_collections().await
    }

    async fn run_atomic(&self, unit: UnitOfWork) -> LedgerResult<()> {
        let result = self.inner.run_atomic(unit).await;
        if matches!(result, Err(LedgerError::ConcurrencyConflict(_))) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

/// Simulates another session writing the advance just before each commit
#[derive(Clone)]
struct ContendedStorage {
    inner: MemoryStorage,
    interference_left: Arc<AtomicU32>,
}

impl ContendedStorage {
    fn new(interference: u32) -> Self {
        Self {
            inner: MemoryStorage::new(),
            interference_left: Arc::new(AtomicU32::new(interference)),
        }
    }
}

#[async_trait]
impl LedgerStorage for ContendedStorage {
    async fn create_advance(&self, advance: Advance) -> LedgerResult<Advance> {
        self.inner.create_advance(advance).await
    }

    async fn get_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>> {
        self.inner.get_advance(advance_id).await
    }

    async fn list_advances(&self) -> LedgerResult<Vec<Advance>> {
        self.inner.list_advances().await
    }

    async fn create_expense(&self, expense: Expense) -> LedgerResult<Expense> {
        self.inner.create_expense(expense).await
    }

    async fn get_expense(&self, expense_id: &str) -> LedgerResult<Option<Expense>> {
        self.inner.get_expense(expense_id).await
    }

    async fn list_expenses(&self) -> LedgerResult<Vec<Expense>> {
        self.inner.list_expenses().await
    }

    async fn create_return(&self, cash_return: CashReturn) -> LedgerResult<CashReturn> {
        self.inner.create_return(cash_return).await
    }

    async fn get_return(&self, return_id: &str) -> LedgerResult<Option<CashReturn>> {
        self.inner.get_return(return_id).await
    }

    async fn list_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        self.inner.list_returns().await
    }

    async fn create_transport_payment(
        &self,
        payment: TransportPayment,
    ) -> LedgerResult<TransportPayment> {
        self.inner.create_transport_payment(payment).await
    }

    async fn list_transport_payments(&self) -> LedgerResult<Vec<TransportPayment>> {
        self.inner.list_transport_payments().await
    }

    async fn create_collection(&self, collection: CashCollection) -> LedgerResult<CashCollection> {
        self.inner.create_collection(collection).await
    }

    async fn list_collections(&self) -> LedgerResult<Vec<CashCollection>> {
        self.inner.list_collections().await
    }

    async fn run_atomic(&self, unit: UnitOfWork) -> LedgerResult<()> {
        let interfere = self
            .interference_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();

        if interfere {
            for write in unit.writes() {
                if let advance_ledger::AtomicWrite::Advance(advance) = write {
                    let current = self.inner.get_advance(&advance.id).await?.unwrap();
                    self.inner
                        .run_atomic(UnitOfWork::new().update_advance(current))
                        .await?;
                }
            }
        }

        self.inner.run_atomic(unit).await
    }
}

#[tokio::test]
async fn test_complete_settlement_workflow() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let ravi = staff("staff1");
    let advance = issue(&engine, "staff1", 5000).await;

    let expense = engine
        .submit_expense(fare_claim(&advance.id, 2000), &ravi)
        .await
        .unwrap();
    assert_eq!(expense.status, ReviewStatus::Pending);
    assert_eq!(expense.settlement_status, SettlementStatus::Pending);
    assert_eq!(expense.staff_id, "staff1");

    // Submission alone never moves money.
    let untouched = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(untouched.balance_to_settle, BigDecimal::from(5000));

    engine.approve_expense(&expense.id, &admin()).await.unwrap();
    let after_expense = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(after_expense.total_expenses, BigDecimal::from(2000));
    assert_eq!(after_expense.balance_to_settle, BigDecimal::from(3000));
    assert_eq!(after_expense.status, AdvanceStatus::Active);
    assert_balance_invariants(&after_expense);

    let approved = engine.get_expense(&expense.id).await.unwrap().unwrap();
    assert_eq!(approved.status, ReviewStatus::Approved);
    assert_eq!(approved.settlement_status, SettlementStatus::Settled);
    assert_eq!(approved.reviewed_by.as_deref(), Some("admin1"));
    assert!(approved.reviewed_at.is_some());

    let cash_return = engine
        .submit_return(return_of(&advance.id, 3000), &ravi)
        .await
        .unwrap();
    engine
        .approve_return(&cash_return.id, &admin())
        .await
        .unwrap();

    let settled = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(settled.total_returned, BigDecimal::from(3000));
    assert_eq!(settled.balance_to_settle, BigDecimal::from(0));
    assert_eq!(settled.status, AdvanceStatus::Settled);
    assert!(settled.settlement_date.is_some());
    assert_eq!(settled.settled_by.as_deref(), Some("admin1"));
    assert_balance_invariants(&settled);

    let balance = engine.advance_balance(&advance.id).await.unwrap();
    assert_eq!(balance.status, AdvanceStatus::Settled);

    let report = engine.validate_integrity().await.unwrap();
    assert!(report.is_valid, "{:?}", report.issues);
}

#[tokio::test]
async fn test_double_approval_is_rejected() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let expense = engine
        .submit_expense(fare_claim(&advance.id, 400), &staff("staff1"))
        .await
        .unwrap();

    engine.approve_expense(&expense.id, &admin()).await.unwrap();
    let second = engine.approve_expense(&expense.id, &admin()).await;
    assert!(matches!(second, Err(LedgerError::InvalidState(_))));

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored.total_expenses, BigDecimal::from(400));
    assert_eq!(stored.balance_to_settle, BigDecimal::from(600));
}

#[tokio::test]
async fn test_expense_above_balance_creates_nothing() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;

    let result = engine
        .submit_expense(fare_claim(&advance.id, 1001), &staff("staff1"))
        .await;
    assert!(matches!(result, Err(LedgerError::Validation(_))));
    assert!(engine.list_expenses().await.unwrap().is_empty());

    let zero = engine
        .submit_expense(fare_claim(&advance.id, 0), &staff("staff1"))
        .await;
    assert!(matches!(zero, Err(LedgerError::Validation(_))));
}

#[tokio::test]
async fn test_expense_amount_rules() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let ravi = staff("staff1");

    let mut others_without_remarks = fare_claim(&advance.id, 100);
    others_without_remarks.amounts = others_without_remarks.amounts.others(BigDecimal::from(50));
    assert!(matches!(
        engine.submit_expense(others_without_remarks.clone(), &ravi).await,
        Err(LedgerError::Validation(_))
    ));

    let mut with_remarks = others_without_remarks;
    with_remarks.remarks = "Tea for the loading crew".to_string();
    let expense = engine.submit_expense(with_remarks, &ravi).await.unwrap();
    assert_eq!(expense.total_amount, BigDecimal::from(150));

    let mut negative = fare_claim(&advance.id, 100);
    negative.amounts = negative.amounts.parking(BigDecimal::from(-20));
    assert!(matches!(
        engine.submit_expense(negative, &ravi).await,
        Err(LedgerError::Validation(_))
    ));
}

#[tokio::test]
async fn test_remarks_rule_can_be_disabled() {
    let config = LedgerConfig {
        require_remarks_for_others: false,
        ..LedgerConfig::default()
    };
    let engine = LedgerEngine::with_config(MemoryStorage::new(), config);
    let advance = issue(&engine, "staff1", 1000).await;

    let mut claim = fare_claim(&advance.id, 0);
    claim.amounts = claim.amounts.others(BigDecimal::from(75));
    let expense = engine.submit_expense(claim, &staff("staff1")).await.unwrap();
    assert_eq!(expense.total_amount, BigDecimal::from(75));
}

#[tokio::test]
async fn test_rejecting_expense_leaves_advance_alone() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let expense = engine
        .submit_expense(fare_claim(&advance.id, 300), &staff("staff1"))
        .await
        .unwrap();

    assert!(matches!(
        engine.reject_expense(&expense.id, &admin(), "  ").await,
        Err(LedgerError::Validation(_))
    ));

    let rejected = engine
        .reject_expense(&expense.id, &admin(), "Bill is unreadable")
        .await
        .unwrap();
    assert_eq!(rejected.status, ReviewStatus::Rejected);
    assert_eq!(rejected.rejection_note.as_deref(), Some("Bill is unreadable"));
    assert_eq!(rejected.settlement_status, SettlementStatus::Pending);

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored.total_expenses, BigDecimal::from(0));
    assert_eq!(stored.balance_to_settle, BigDecimal::from(1000));
    assert_eq!(stored.version, advance.version);

    // Rejection is terminal.
    assert!(matches!(
        engine.approve_expense(&expense.id, &admin()).await,
        Err(LedgerError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_return_review() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let ravi = staff("staff1");

    assert!(matches!(
        engine.submit_return(return_of(&advance.id, 0), &ravi).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        engine.submit_return(return_of(&advance.id, 1500), &ravi).await,
        Err(LedgerError::Validation(_))
    ));

    let first = engine
        .submit_return(return_of(&advance.id, 200), &ravi)
        .await
        .unwrap();
    let second = engine
        .submit_return(return_of(&advance.id, 300), &ravi)
        .await
        .unwrap();
    assert_eq!(engine.pending_returns().await.unwrap().len(), 2);

    let rejected = engine
        .reject_return(&first.id, &admin(), "Cash not received")
        .await
        .unwrap();
    assert_eq!(rejected.status, ReviewStatus::Rejected);

    let outcome = engine.approve_return(&second.id, &admin()).await.unwrap();
    assert_eq!(outcome.advance.total_returned, BigDecimal::from(300));
    assert_eq!(outcome.advance.balance_to_settle, BigDecimal::from(700));
    assert!(!outcome.settled);

    assert!(matches!(
        engine.approve_return(&second.id, &admin()).await,
        Err(LedgerError::InvalidState(_))
    ));
    assert!(matches!(
        engine.approve_return("missing", &admin()).await,
        Err(LedgerError::ReturnNotFound(_))
    ));
    assert!(engine.pending_returns().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authorization_rules() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let owner = staff("staff1");
    let stranger = staff("staff2");

    assert!(matches!(
        engine.submit_expense(fare_claim(&advance.id, 100), &stranger).await,
        Err(LedgerError::Unauthorized(_))
    ));

    let expense = engine
        .submit_expense(fare_claim(&advance.id, 100), &owner)
        .await
        .unwrap();
    assert!(matches!(
        engine.approve_expense(&expense.id, &owner).await,
        Err(LedgerError::Unauthorized(_))
    ));
    assert!(matches!(
        engine.reject_expense(&expense.id, &owner, "no").await,
        Err(LedgerError::Unauthorized(_))
    ));

    // Admins may file on behalf of staff; the claim stays with the advance holder.
    let on_behalf = engine
        .submit_expense(fare_claim(&advance.id, 50), &admin())
        .await
        .unwrap();
    assert_eq!(on_behalf.staff_id, "staff1");

    issue(&engine, "staff2", 500).await;
    assert_eq!(engine.list_visible_advances(&owner).await.unwrap().len(), 1);
    assert_eq!(engine.list_visible_advances(&admin()).await.unwrap().len(), 2);
    assert_eq!(engine.list_visible_expenses(&owner).await.unwrap().len(), 2);
    assert!(engine.list_visible_expenses(&stranger).await.unwrap().is_empty());
    assert!(engine.list_visible_returns(&stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claims_on_settled_advance_exceed_balance() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 500).await;
    let ravi = staff("staff1");

    let cash_return = engine
        .submit_return(return_of(&advance.id, 500), &ravi)
        .await
        .unwrap();
    let outcome = engine
        .approve_return(&cash_return.id, &admin())
        .await
        .unwrap();
    assert!(outcome.settled);

    // Any positive claim exceeds a settled advance's balance.
    assert!(matches!(
        engine.submit_expense(fare_claim(&advance.id, 10), &ravi).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        engine.submit_return(return_of(&advance.id, 10), &ravi).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(engine.list_advance_expenses(&advance.id).await.unwrap().is_empty());
    assert_eq!(engine.list_advance_returns(&advance.id).await.unwrap().len(), 1);
}

/// Accepts every submission, leaving only the engine's own state checks
struct PermissiveValidator;

impl SubmissionValidator for PermissiveValidator {
    fn validate_expense(&self, _expense: &Expense, _advance: &Advance) -> LedgerResult<()> {
        Ok(())
    }

    fn validate_return(&self, _cash_return: &CashReturn, _advance: &Advance) -> LedgerResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_settled_advance_refused_even_without_balance_check() {
    let engine = LedgerEngine::with_validator(
        MemoryStorage::new(),
        LedgerConfig::default(),
        Arc::new(PermissiveValidator),
    );
    let advance = issue(&engine, "staff1", 300).await;
    let ravi = staff("staff1");

    let expense = engine
        .submit_expense(fare_claim(&advance.id, 300), &ravi)
        .await
        .unwrap();
    assert!(engine.approve_expense(&expense.id, &admin()).await.unwrap().settled);

    assert!(matches!(
        engine.submit_expense(fare_claim(&advance.id, 10), &ravi).await,
        Err(LedgerError::InvalidState(_))
    ));
    assert!(matches!(
        engine.submit_return(return_of(&advance.id, 10), &ravi).await,
        Err(LedgerError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_late_approval_keeps_advance_settled() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let ravi = staff("staff1");

    // Both claims pass the soft balance check before either is approved.
    let first = engine
        .submit_expense(fare_claim(&advance.id, 800), &ravi)
        .await
        .unwrap();
    let second = engine
        .submit_expense(fare_claim(&advance.id, 700), &ravi)
        .await
        .unwrap();

    let outcome = engine.approve_expense(&first.id, &admin()).await.unwrap();
    assert!(!outcome.settled);
    let outcome = engine.approve_expense(&second.id, &admin()).await.unwrap();
    assert!(outcome.settled);
    assert_eq!(outcome.advance.balance_to_settle, BigDecimal::from(-500));
    assert_balance_invariants(&outcome.advance);
    let settled_at = outcome.advance.settlement_date;

    let third = engine
        .submit_expense(fare_claim(&advance.id, 1), &admin())
        .await;
    assert!(matches!(third, Err(LedgerError::Validation(_))));

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored.status, AdvanceStatus::Settled);
    assert_eq!(stored.settlement_date, settled_at);
}

#[tokio::test]
async fn test_missing_records() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    assert_eq!(
        engine.approve_expense("nope", &admin()).await,
        Err(LedgerError::ExpenseNotFound("nope".to_string()))
    );
    assert!(matches!(
        engine
            .submit_expense(fare_claim("nope", 10), &staff("staff1"))
            .await,
        Err(LedgerError::AdvanceNotFound(_))
    ));
    assert_eq!(engine.get_advance("nope").await, Ok(None));
}

#[tokio::test]
async fn test_concurrent_approvals_do_not_lose_updates() {
    let storage = InterleavingStorage::default();
    let conflicts = storage.conflicts.clone();
    let engine = LedgerEngine::new(storage);
    let ravi = staff("staff1");
    let advance = issue(&engine, "staff1", 5000).await;

    let first = engine
        .submit_expense(fare_claim(&advance.id, 1200), &ravi)
        .await
        .unwrap();
    let second = engine
        .submit_expense(fare_claim(&advance.id, 800), &ravi)
        .await
        .unwrap();

    let reviewer = admin();
    let (a, b) = tokio::join!(
        engine.approve_expense(&first.id, &reviewer),
        engine.approve_expense(&second.id, &reviewer),
    );
    a.unwrap();
    b.unwrap();

    assert!(conflicts.load(Ordering::SeqCst) >= 1);

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored.total_expenses, BigDecimal::from(2000));
    assert_eq!(stored.balance_to_settle, BigDecimal::from(3000));
    assert_balance_invariants(&stored);
    assert!(engine.validate_integrity().await.unwrap().is_valid);
}

#[tokio::test]
async fn test_concurrent_expense_and_return_settle_once() {
    let storage = InterleavingStorage::default();
    let engine = LedgerEngine::new(storage);
    let ravi = staff("staff1");
    let advance = issue(&engine, "staff1", 1000).await;

    let expense = engine
        .submit_expense(fare_claim(&advance.id, 600), &ravi)
        .await
        .unwrap();
    let cash_return = engine
        .submit_return(return_of(&advance.id, 400), &ravi)
        .await
        .unwrap();

    let reviewer = admin();
    let (a, b) = tokio::join!(
        engine.approve_expense(&expense.id, &reviewer),
        engine.approve_return(&cash_return.id, &reviewer),
    );
    let settled_count = [a.unwrap().settled, b.unwrap().settled]
        .iter()
        .filter(|settled| **settled)
        .count();
    assert_eq!(settled_count, 1);

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored.total_expenses, BigDecimal::from(600));
    assert_eq!(stored.total_returned, BigDecimal::from(400));
    assert_eq!(stored.status, AdvanceStatus::Settled);
    assert_balance_invariants(&stored);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_approvals_across_tasks() {
    let config = LedgerConfig {
        max_conflict_retries: 20,
        ..LedgerConfig::default()
    };
    let engine = LedgerEngine::with_config(MemoryStorage::new(), config);
    let ravi = staff("staff1");
    let advance = issue(&engine, "staff1", 10_000).await;

    let mut expense_ids = Vec::new();
    for _ in 0..10 {
        let expense = engine
            .submit_expense(fare_claim(&advance.id, 100), &ravi)
            .await
            .unwrap();
        expense_ids.push(expense.id);
    }

    let engine = Arc::new(engine);

    let handles: Vec<_> = expense_ids
        .into_iter()
        .map(|expense_id| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.approve_expense(&expense_id, &admin()).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored.total_expenses, BigDecimal::from(1000));
    assert_eq!(stored.balance_to_settle, BigDecimal::from(9000));
    assert!(engine.validate_integrity().await.unwrap().is_valid);
}

#[tokio::test]
async fn test_conflict_is_retried_transparently() {
    let engine = LedgerEngine::new(ContendedStorage::new(2));
    let advance = issue(&engine, "staff1", 1000).await;
    let expense = engine
        .submit_expense(fare_claim(&advance.id, 250), &staff("staff1"))
        .await
        .unwrap();

    let outcome = engine.approve_expense(&expense.id, &admin()).await.unwrap();
    assert_eq!(outcome.advance.total_expenses, BigDecimal::from(250));

    let stored = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored, outcome.advance);
}

#[tokio::test]
async fn test_exhausted_retries_leave_records_untouched() {
    let config = LedgerConfig {
        max_conflict_retries: 2,
        ..LedgerConfig::default()
    };
    let storage = ContendedStorage::new(u32::MAX);
    let engine = LedgerEngine::with_config(storage, config);
    let advance = issue(&engine, "staff1", 1000).await;
    let expense = engine
        .submit_expense(fare_claim(&advance.id, 250), &staff("staff1"))
        .await
        .unwrap();

    let result = engine.approve_expense(&expense.id, &admin()).await;
    assert!(matches!(result, Err(LedgerError::ConcurrencyConflict(_))));

    let stored_expense = engine.get_expense(&expense.id).await.unwrap().unwrap();
    assert_eq!(stored_expense.status, ReviewStatus::Pending);
    assert_eq!(stored_expense.settlement_status, SettlementStatus::Pending);

    let stored_advance = engine.get_advance_required(&advance.id).await.unwrap();
    assert_eq!(stored_advance.total_expenses, BigDecimal::from(0));
    assert_eq!(stored_advance.balance_to_settle, BigDecimal::from(1000));
}

#[tokio::test]
async fn test_reports() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let ravi = staff("staff1");
    let first = issue(&engine, "staff1", 1000).await;
    let second = issue(&engine, "staff1", 400).await;
    issue(&engine, "staff2", 900).await;

    let expense = engine
        .submit_expense(fare_claim(&first.id, 300), &ravi)
        .await
        .unwrap();
    engine.approve_expense(&expense.id, &admin()).await.unwrap();
    engine
        .submit_expense(fare_claim(&first.id, 100), &ravi)
        .await
        .unwrap();
    let cash_return = engine
        .submit_return(return_of(&second.id, 400), &ravi)
        .await
        .unwrap();
    engine
        .approve_return(&cash_return.id, &admin())
        .await
        .unwrap();

    let summary = engine.staff_summary("staff1").await.unwrap();
    assert_eq!(summary.advance_count, 2);
    assert_eq!(summary.settled_advances, 1);
    assert_eq!(summary.total_issued, BigDecimal::from(1400));
    assert_eq!(summary.total_expenses, BigDecimal::from(300));
    assert_eq!(summary.total_returned, BigDecimal::from(400));
    assert_eq!(summary.outstanding_balance, BigDecimal::from(700));
    assert_eq!(summary.pending_expenses, 1);

    let today = chrono::Utc::now().date_naive();
    let week_ago = today - chrono::Duration::days(7);
    assert_eq!(
        engine.advances_in_range(week_ago, today).await.unwrap().len(),
        3
    );
    assert_eq!(
        engine.expenses_in_range(week_ago, today).await.unwrap().len(),
        2
    );
    assert_eq!(
        engine.returns_in_range(week_ago, today).await.unwrap().len(),
        1
    );
    assert!(matches!(
        engine
            .expenses_in_range(today - chrono::Duration::days(30), today)
            .await,
        Err(LedgerError::Validation(_))
    ));
}

#[tokio::test]
async fn test_cash_entries_and_company_totals() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let ravi = staff("staff1");
    let mina = staff("staff2");

    for (user, company, amount) in [
        (&ravi, TransportCompany::Canter, 900),
        (&mina, TransportCompany::Canter, 600),
        (&ravi, TransportCompany::TataAce, 450),
    ] {
        engine
            .record_transport_payment(
                RecordTransportPaymentParams {
                    staff_id: user.id.clone(),
                    staff_name: user.name.clone(),
                    company,
                    amount: BigDecimal::from(amount),
                    details: "Delivery run".to_string(),
                },
                user,
            )
            .await
            .unwrap();
    }

    engine
        .record_collection(
            RecordCollectionParams {
                staff_id: ravi.id.clone(),
                staff_name: ravi.name.clone(),
                amount: BigDecimal::from(2500),
                source: "Sharma Traders".to_string(),
                details: "Invoice 114".to_string(),
            },
            &ravi,
        )
        .await
        .unwrap();

    assert!(matches!(
        engine
            .record_transport_payment(
                RecordTransportPaymentParams {
                    staff_id: ravi.id.clone(),
                    staff_name: ravi.name.clone(),
                    company: TransportCompany::Truck,
                    amount: BigDecimal::from(100),
                    details: String::new(),
                },
                &mina,
            )
            .await,
        Err(LedgerError::Unauthorized(_))
    ));

    let today = chrono::Utc::now().date_naive();
    let start = today - chrono::Duration::days(3);

    let totals = engine.transport_company_totals(start, today).await.unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].company, TransportCompany::Canter);
    assert_eq!(totals[0].payment_count, 2);
    assert_eq!(totals[0].total_amount, BigDecimal::from(1500));
    assert_eq!(totals[1].company, TransportCompany::TataAce);
    assert_eq!(totals[1].total_amount, BigDecimal::from(450));

    let tata_ace = engine
        .transport_payments_in_range(start, today, Some(TransportCompany::TataAce))
        .await
        .unwrap();
    assert_eq!(tata_ace.len(), 1);
    assert_eq!(
        engine.collections_in_range(start, today).await.unwrap().len(),
        1
    );
    assert_eq!(
        engine.list_visible_transport_payments(&mina).await.unwrap().len(),
        1
    );
    assert!(engine.list_visible_collections(&mina).await.unwrap().is_empty());
    assert_eq!(
        engine.list_visible_collections(&admin()).await.unwrap().len(),
        1
    );

    // Cash entries never touch advances.
    assert!(engine.list_advances().await.unwrap().is_empty());
    assert!(engine.validate_integrity().await.unwrap().is_valid);
}

#[tokio::test]
async fn test_records_serialize_for_callers() {
    let engine = LedgerEngine::new(MemoryStorage::new());
    let advance = issue(&engine, "staff1", 1000).await;
    let mut claim = fare_claim(&advance.id, 120);
    claim.category = ExpenseCategory::OutStation;
    let expense = engine.submit_expense(claim, &staff("staff1")).await.unwrap();

    let json = serde_json::to_value(&expense).unwrap();
    assert_eq!(json["category"], "Out Station");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["settlement_status"], "pending");
    assert!(json.get("fare").is_some());

    let back: Expense = serde_json::from_value(json).unwrap();
    assert_eq!(back, expense);
}
