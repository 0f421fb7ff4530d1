//! Read-side reports over advances, expenses and returns

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::*;

/// Records that carry the date used for report filtering
pub trait Dated {
    fn recorded_at(&self) -> NaiveDateTime;
}

impl Dated for Advance {
    fn recorded_at(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for Expense {
    fn recorded_at(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for CashReturn {
    fn recorded_at(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for TransportPayment {
    fn recorded_at(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for CashCollection {
    fn recorded_at(&self) -> NaiveDateTime {
        self.date
    }
}

/// Inclusive day range for reports, bounded in length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportRange {
    /// Create a range covering `start` through `end`, at most `max_days` apart
    pub fn new(start: NaiveDate, end: NaiveDate, max_days: i64) -> LedgerResult<Self> {
        if start > end {
            return Err(LedgerError::Validation(format!(
                "Report start {start} is after end {end}"
            )));
        }

        let span = (end - start).num_days();
        if span > max_days {
            return Err(LedgerError::Validation(format!(
                "Date range cannot exceed {max_days} days for reports (got {span})"
            )));
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether a timestamp falls on any day of the range
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let day = at.date();
        day >= self.start && day <= self.end
    }
}

/// Keep the records dated within `range`
pub fn filter_in_range<T: Dated>(records: Vec<T>, range: &ReportRange) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| range.contains(record.recorded_at()))
        .collect()
}

/// Totals across one staff member's advances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffSummary {
    pub staff_id: String,
    pub advance_count: usize,
    pub active_advances: usize,
    pub settled_advances: usize,
    pub total_issued: BigDecimal,
    pub total_expenses: BigDecimal,
    pub total_returned: BigDecimal,
    /// Sum of the balances of active advances
    pub outstanding_balance: BigDecimal,
    pub pending_expenses: usize,
    pub pending_returns: usize,
}

/// Summarize the records belonging to `staff_id`
pub fn summarize_staff(
    staff_id: &str,
    advances: &[Advance],
    expenses: &[Expense],
    returns: &[CashReturn],
) -> StaffSummary {
    let owned: Vec<&Advance> = advances
        .iter()
        .filter(|advance| advance.staff_id == staff_id)
        .collect();

    let settled_advances = owned.iter().filter(|advance| advance.is_settled()).count();

    StaffSummary {
        staff_id: staff_id.to_string(),
        advance_count: owned.len(),
        active_advances: owned.len() - settled_advances,
        settled_advances,
        total_issued: owned.iter().map(|advance| &advance.amount).sum(),
        total_expenses: owned.iter().map(|advance| &advance.total_expenses).sum(),
        total_returned: owned.iter().map(|advance| &advance.total_returned).sum(),
        outstanding_balance: owned
            .iter()
            .filter(|advance| !advance.is_settled())
            .map(|advance| &advance.balance_to_settle)
            .sum(),
        pending_expenses: expenses
            .iter()
            .filter(|expense| expense.staff_id == staff_id && expense.is_pending())
            .count(),
        pending_returns: returns
            .iter()
            .filter(|cash_return| cash_return.staff_id == staff_id && cash_return.is_pending())
            .count(),
    }
}

/// Transport payments grouped under one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyTotal {
    pub company: TransportCompany,
    pub payment_count: usize,
    pub total_amount: BigDecimal,
}

/// Total the payments per company, in [`TransportCompany::ALL`] order.
/// Companies without payments are left out.
pub fn company_totals(payments: &[TransportPayment]) -> Vec<CompanyTotal> {
    TransportCompany::ALL
        .iter()
        .filter_map(|company| {
            let paid: Vec<&TransportPayment> = payments
                .iter()
                .filter(|payment| payment.company == *company)
                .collect();
            if paid.is_empty() {
                return None;
            }
            Some(CompanyTotal {
                company: *company,
                payment_count: paid.len(),
                total_amount: paid.iter().map(|payment| &payment.amount).sum(),
            })
        })
        .collect()
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub advances_checked: usize,
}

/// Cross-check every advance against the approved expenses and returns
/// drawn on it
pub fn check_integrity(
    advances: &[Advance],
    expenses: &[Expense],
    returns: &[CashReturn],
) -> LedgerIntegrityReport {
    let zero = BigDecimal::from(0);
    let mut approved_expenses: HashMap<&str, BigDecimal> = HashMap::new();
    let mut approved_returns: HashMap<&str, BigDecimal> = HashMap::new();
    let mut issues = Vec::new();

    for expense in expenses {
        match (expense.status, expense.settlement_status) {
            (ReviewStatus::Approved, SettlementStatus::Settled) => {
                *approved_expenses
                    .entry(expense.advance_id.as_str())
                    .or_insert_with(|| BigDecimal::from(0)) += &expense.total_amount;
            }
            (ReviewStatus::Approved, SettlementStatus::Pending) => issues.push(format!(
                "Expense '{}' is approved but not settled",
                expense.id
            )),
            (_, SettlementStatus::Settled) => issues.push(format!(
                "Expense '{}' is settled but {}",
                expense.id, expense.status
            )),
            _ => {}
        }

        if expense.total_amount != expense.amounts.total() {
            issues.push(format!(
                "Expense '{}' total {} does not match its category amounts {}",
                expense.id,
                expense.total_amount,
                expense.amounts.total()
            ));
        }
    }

    for cash_return in returns {
        if cash_return.status == ReviewStatus::Approved {
            *approved_returns
                .entry(cash_return.advance_id.as_str())
                .or_insert_with(|| BigDecimal::from(0)) += &cash_return.amount;
        }
    }

    let known: std::collections::HashSet<&str> =
        advances.iter().map(|advance| advance.id.as_str()).collect();

    for advance in advances {
        let id = advance.id.as_str();
        let expected_expenses = approved_expenses.get(id).unwrap_or(&zero);
        let expected_returns = approved_returns.get(id).unwrap_or(&zero);

        if &advance.total_expenses != expected_expenses {
            issues.push(format!(
                "Advance '{id}' total expenses {} differ from approved expenses {}",
                advance.total_expenses, expected_expenses
            ));
        }

        if &advance.total_returned != expected_returns {
            issues.push(format!(
                "Advance '{id}' total returned {} differs from approved returns {}",
                advance.total_returned, expected_returns
            ));
        }

        if advance.balance_to_settle != advance.computed_balance() {
            issues.push(format!(
                "Advance '{id}' balance {} is not amount - expenses - returns = {}",
                advance.balance_to_settle,
                advance.computed_balance()
            ));
        }

        let should_be_settled = advance.balance_to_settle <= zero;
        if advance.is_settled() != should_be_settled {
            issues.push(format!(
                "Advance '{id}' is {:?} with balance {}",
                advance.status, advance.balance_to_settle
            ));
        }

        if advance.is_settled()
            && (advance.settlement_date.is_none() || advance.settled_by.is_none())
        {
            issues.push(format!("Advance '{id}' is settled without a settlement stamp"));
        }
    }

    for expense in expenses {
        if !known.contains(expense.advance_id.as_str()) {
            issues.push(format!(
                "Expense '{}' references missing advance '{}'",
                expense.id, expense.advance_id
            ));
        }
    }

    for cash_return in returns {
        if !known.contains(cash_return.advance_id.as_str()) {
            issues.push(format!(
                "Return '{}' references missing advance '{}'",
                cash_return.id, cash_return.advance_id
            ));
        }
    }

    LedgerIntegrityReport {
        is_valid: issues.is_empty(),
        issues,
        advances_checked: advances.len(),
    }
}
