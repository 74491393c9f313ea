//! Invoice workflow: validation, totals, persistence and sequencing.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use invoicer_core::DomainError;
use invoicer_invoicing::{Invoice, InvoiceNumber};

use crate::sequence::{InvoiceSequence, SequenceError};
use crate::store::{CounterStore, InvoiceRepository, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => ServiceError::Domain(DomainError::conflict(msg)),
            other => ServiceError::Store(other),
        }
    }
}

/// Invoice CRUD plus the sequence allocator, over one backend.
#[derive(Debug, Clone)]
pub struct InvoiceService<S> {
    store: S,
    sequence: InvoiceSequence<S, S>,
}

impl<S> InvoiceService<S>
where
    S: InvoiceRepository + CounterStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            sequence: InvoiceSequence::new(store.clone(), store.clone()),
            store,
        }
    }

    pub async fn list(&self) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self.store.list_invoices().await?)
    }

    pub async fn get(&self, number: &InvoiceNumber) -> Result<Invoice, ServiceError> {
        self.store
            .find_invoice(number)
            .await?
            .ok_or_else(|| not_found(number).into())
    }

    /// Persist a new invoice and advance the sequence past its number.
    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number), err)]
    pub async fn create(&self, mut invoice: Invoice) -> Result<Invoice, ServiceError> {
        invoice.validate()?;
        invoice.recalculate();
        invoice.mark_saved(Utc::now());

        let saved = self.store.insert_invoice(invoice).await?;

        // The document is durable at this point; a lagging counter is
        // repaired by reconciliation, so the request still succeeds.
        if let Err(err) = self.sequence.commit(&saved.invoice_number).await {
            tracing::warn!(
                invoice_number = %saved.invoice_number,
                error = %err,
                "invoice saved but sequence commit failed"
            );
        }
        tracing::info!(invoice_number = %saved.invoice_number, total = saved.total, "invoice created");
        Ok(saved)
    }

    /// Replace an existing invoice. The number in `number` wins over the body.
    #[instrument(skip(self, invoice), fields(invoice_number = %number), err)]
    pub async fn update(
        &self,
        number: &InvoiceNumber,
        mut invoice: Invoice,
    ) -> Result<Invoice, ServiceError> {
        let previous = self.get(number).await?;

        invoice.supersede(&previous, Utc::now());
        invoice.validate()?;
        invoice.recalculate();

        self.store
            .replace_invoice(invoice)
            .await?
            .ok_or_else(|| not_found(number).into())
    }

    /// Remove an invoice. Its number is not reused.
    #[instrument(skip(self), fields(invoice_number = %number), err)]
    pub async fn delete(&self, number: &InvoiceNumber) -> Result<(), ServiceError> {
        if self.store.delete_invoice(number).await? {
            Ok(())
        } else {
            Err(not_found(number).into())
        }
    }

    pub async fn last_number(&self) -> Result<u64, ServiceError> {
        Ok(self.sequence.peek_last().await?)
    }

    pub async fn next_number(&self) -> Result<u64, ServiceError> {
        Ok(self.sequence.peek_next().await?)
    }
}

fn not_found(number: &InvoiceNumber) -> DomainError {
    DomainError::not_found(format!("invoice '{number}'"))
}
