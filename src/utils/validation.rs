//! Validation utilities

use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal, what: &str) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(format!("{what} must be positive")))
    } else {
        Ok(())
    }
}

/// Validate that an amount is zero or positive
pub fn validate_non_negative_amount(amount: &BigDecimal, what: &str) -> LedgerResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(LedgerError::Validation(format!(
            "{what} cannot be negative"
        )))
    } else {
        Ok(())
    }
}

/// Validate that a free-text note is present
pub fn validate_note(note: &str, what: &str) -> LedgerResult<()> {
    if note.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{what} cannot be empty")));
    }

    if note.len() > 500 {
        return Err(LedgerError::Validation(format!(
            "{what} cannot exceed 500 characters"
        )));
    }

    Ok(())
}

/// Validate that a record or user ID is usable as a lookup key
pub fn validate_record_id(id: &str, what: &str) -> LedgerResult<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{what} ID cannot be empty")));
    }

    if id.len() > 64 {
        return Err(LedgerError::Validation(format!(
            "{what} ID cannot exceed 64 characters"
        )));
    }

    Ok(())
}

/// Require the acting user to be an admin
pub fn require_admin(user: &User, action: &str) -> LedgerResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized(format!(
            "User '{}' is not allowed to {action}",
            user.id
        )))
    }
}

/// Require the acting user to own `staff_id`'s records, or be an admin
pub fn require_access(user: &User, staff_id: &str) -> LedgerResult<()> {
    if user.can_access(staff_id) {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized(format!(
            "User '{}' cannot act on records of staff '{staff_id}'",
            user.id
        )))
    }
}
