//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    advances: HashMap<String, Advance>,
    expenses: HashMap<String, Expense>,
    returns: HashMap<String, CashReturn>,
    transport_payments: HashMap<String, TransportPayment>,
    collections: HashMap<String, CashCollection>,
}

/// In-memory storage implementation for testing and development
///
/// All collections live behind one lock so a [`UnitOfWork`] touching an
/// expense and its advance is applied as a single step.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        let mut tables = self.write()?;
        tables.advances.clear();
        tables.expenses.clear();
        tables.returns.clear();
        tables.transport_payments.clear();
        tables.collections.clear();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }

    fn next_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn check_version(kind: &str, id: &str, expected: u64, actual: u64) -> LedgerResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LedgerError::ConcurrencyConflict(format!(
            "{kind} '{id}' expected version {expected}, found {actual}"
        )))
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn create_advance(&self, mut advance: Advance) -> LedgerResult<Advance> {
        advance.id = Self::next_id();
        advance.version = 1;
        self.write()?
            .advances
            .insert(advance.id.clone(), advance.clone());
        Ok(advance)
    }

    async fn get_advance(&self, advance_id: &str) -> LedgerResult<Option<Advance>> {
        Ok(self.read()?.advances.get(advance_id).cloned())
    }

    async fn list_advances(&self) -> LedgerResult<Vec<Advance>> {
        let mut advances: Vec<Advance> = self.read()?.advances.values().cloned().collect();
        advances.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(advances)
    }

    async fn create_expense(&self, mut expense: Expense) -> LedgerResult<Expense> {
        expense.id = Self::next_id();
        expense.version = 1;
        self.write()?
            .expenses
            .insert(expense.id.clone(), expense.clone());
        Ok(expense)
    }

    async fn get_expense(&self, expense_id: &str) -> LedgerResult<Option<Expense>> {
        Ok(self.read()?.expenses.get(expense_id).cloned())
    }

    async fn list_expenses(&self) -> LedgerResult<Vec<Expense>> {
        let mut expenses: Vec<Expense> = self.read()?.expenses.values().cloned().collect();
        expenses.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(expenses)
    }

    async fn create_return(&self, mut cash_return: CashReturn) -> LedgerResult<CashReturn> {
        cash_return.id = Self::next_id();
        cash_return.version = 1;
        self.write()?
            .returns
            .insert(cash_return.id.clone(), cash_return.clone());
        Ok(cash_return)
    }

    async fn get_return(&self, return_id: &str) -> LedgerResult<Option<CashReturn>> {
        Ok(self.read()?.returns.get(return_id).cloned())
    }

    async fn list_returns(&self) -> LedgerResult<Vec<CashReturn>> {
        let mut returns: Vec<CashReturn> = self.read()?.returns.values().cloned().collect();
        returns.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(returns)
    }

    async fn create_transport_payment(
        &self,
        mut payment: TransportPayment,
    ) -> LedgerResult<TransportPayment> {
        payment.id = Self::next_id();
        self.write()?
            .transport_payments
            .insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn list_transport_payments(&self) -> LedgerResult<Vec<TransportPayment>> {
        let mut payments: Vec<TransportPayment> =
            self.read()?.transport_payments.values().cloned().collect();
        payments.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn create_collection(
        &self,
        mut collection: CashCollection,
    ) -> LedgerResult<CashCollection> {
        collection.id = Self::next_id();
        self.write()?
            .collections
            .insert(collection.id.clone(), collection.clone());
        Ok(collection)
    }

    async fn list_collections(&self) -> LedgerResult<Vec<CashCollection>> {
        let mut collections: Vec<CashCollection> =
            self.read()?.collections.values().cloned().collect();
        collections.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(collections)
    }

    async fn run_atomic(&self, unit: UnitOfWork) -> LedgerResult<()> {
        if unit.is_empty() {
            return Ok(());
        }
        let mut tables = self.write()?;

        // Check every precondition before touching anything.
        for write in unit.writes() {
            let id = write.record_id();
            let expected = write.expected_version();
            match write {
                AtomicWrite::Advance(_) => {
                    let stored = tables
                        .advances
                        .get(id)
                        .ok_or_else(|| LedgerError::AdvanceNotFound(id.to_string()))?;
                    check_version("Advance", id, expected, stored.version)?;
                }
                AtomicWrite::Expense(_) => {
                    let stored = tables
                        .expenses
                        .get(id)
                        .ok_or_else(|| LedgerError::ExpenseNotFound(id.to_string()))?;
                    check_version("Expense", id, expected, stored.version)?;
                }
                AtomicWrite::Return(_) => {
                    let stored = tables
                        .returns
                        .get(id)
                        .ok_or_else(|| LedgerError::ReturnNotFound(id.to_string()))?;
                    check_version("Return", id, expected, stored.version)?;
                }
            }
        }

        for write in unit.into_writes() {
            match write {
                AtomicWrite::Advance(mut advance) => {
                    advance.version += 1;
                    tables.advances.insert(advance.id.clone(), advance);
                }
                AtomicWrite::Expense(mut expense) => {
                    expense.version += 1;
                    tables.expenses.insert(expense.id.clone(), expense);
                }
                AtomicWrite::Return(mut cash_return) => {
                    cash_return.version += 1;
                    tables.returns.insert(cash_return.id.clone(), cash_return);
                }
            }
        }

        Ok(())
    }
}
