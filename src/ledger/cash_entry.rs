//! Transport payments and cash collections entered by staff

use bigdecimal::BigDecimal;
use tracing::info;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{
    require_access, validate_note, validate_positive_amount, validate_record_id,
};

/// Parameters for logging a payment to a transport operator
#[derive(Debug, Clone)]
pub struct RecordTransportPaymentParams {
    pub staff_id: String,
    pub staff_name: String,
    pub company: TransportCompany,
    pub amount: BigDecimal,
    pub details: String,
}

/// Parameters for logging cash collected from a customer
#[derive(Debug, Clone)]
pub struct RecordCollectionParams {
    pub staff_id: String,
    pub staff_name: String,
    pub amount: BigDecimal,
    pub source: String,
    pub details: String,
}

/// Manager for cash entries that sit beside the advance ledger.
///
/// Entries are stored as given and never reviewed; they only feed reports.
pub struct CashEntryManager<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> CashEntryManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Record a transport payment for a staff member
    pub async fn record_transport_payment(
        &self,
        params: RecordTransportPaymentParams,
        entered_by: &User,
    ) -> LedgerResult<TransportPayment> {
        validate_record_id(&params.staff_id, "Staff")?;
        require_access(entered_by, &params.staff_id)?;
        validate_note(&params.staff_name, "Staff name")?;
        validate_positive_amount(&params.amount, "Payment amount")?;

        let payment = TransportPayment {
            id: String::new(),
            staff_id: params.staff_id,
            staff_name: params.staff_name,
            company: params.company,
            amount: params.amount,
            details: params.details,
            date: chrono::Utc::now().naive_utc(),
            entered_by: entered_by.id.clone(),
        };
        let payment = self.storage.create_transport_payment(payment).await?;

        info!(
            payment_id = %payment.id,
            staff_id = %payment.staff_id,
            company = ?payment.company,
            amount = %payment.amount,
            "transport payment recorded"
        );
        Ok(payment)
    }

    /// Record cash collected by a staff member
    pub async fn record_collection(
        &self,
        params: RecordCollectionParams,
        entered_by: &User,
    ) -> LedgerResult<CashCollection> {
        validate_record_id(&params.staff_id, "Staff")?;
        require_access(entered_by, &params.staff_id)?;
        validate_note(&params.staff_name, "Staff name")?;
        validate_note(&params.source, "Collection source")?;
        validate_positive_amount(&params.amount, "Collection amount")?;

        let collection = CashCollection {
            id: String::new(),
            staff_id: params.staff_id,
            staff_name: params.staff_name,
            amount: params.amount,
            source: params.source,
            details: params.details,
            date: chrono::Utc::now().naive_utc(),
            entered_by: entered_by.id.clone(),
        };
        let collection = self.storage.create_collection(collection).await?;

        info!(
            collection_id = %collection.id,
            staff_id = %collection.staff_id,
            amount = %collection.amount,
            "collection recorded"
        );
        Ok(collection)
    }

    pub async fn list_transport_payments(&self) -> LedgerResult<Vec<TransportPayment>> {
        self.storage.list_transport_payments().await
    }

    pub async fn list_collections(&self) -> LedgerResult<Vec<CashCollection>> {
        self.storage.list_collections().await
    }
}
