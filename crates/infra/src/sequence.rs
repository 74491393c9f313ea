//! Invoice sequence allocator.
//!
//! Derives the last/next invoice number from a persisted counter and keeps
//! that counter monotone. The counter is advanced only through
//! [`CounterStore::advance_counter`], which is an atomic compare-and-advance,
//! so concurrent or replayed commits converge on the maximum.
//!
//! Only the first run of digits in a label counts: `"INV-2024-007"` is
//! sequenced as 2024. Runs above [`MAX_SEQUENCE`] carry no sequence value,
//! so every backend sees the same numeric range.

use thiserror::Error;
use tracing::instrument;

use invoicer_invoicing::{InvoiceNumber, MAX_SEQUENCE, extract_first_numeric_run};

use crate::store::{CounterStore, InvoiceRepository, StoreError};

/// Key of the invoice counter record.
pub const INVOICE_COUNTER_KEY: &str = "lastInvoiceNumber";

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The counter is at [`MAX_SEQUENCE`]; there is no next number.
    #[error("invoice sequence exhausted")]
    Exhausted,
}

/// Allocator over a counter store and the invoice repository it reconciles
/// against. Both are usually the same backend.
#[derive(Debug, Clone)]
pub struct InvoiceSequence<C, R> {
    counters: C,
    invoices: R,
}

impl<C, R> InvoiceSequence<C, R>
where
    C: CounterStore,
    R: InvoiceRepository,
{
    pub fn new(counters: C, invoices: R) -> Self {
        Self { counters, invoices }
    }

    /// Last allocated number; reconciles first when the counter is absent or 0.
    #[instrument(skip(self), err)]
    pub async fn peek_last(&self) -> Result<u64, SequenceError> {
        match self.counters.read_counter(INVOICE_COUNTER_KEY).await? {
            Some(last) if last > 0 => Ok(last),
            _ => self.reconcile().await,
        }
    }

    /// Advisory next number. Nothing is reserved.
    pub async fn peek_next(&self) -> Result<u64, SequenceError> {
        self.peek_last()
            .await?
            .checked_add(1)
            .filter(|next| *next <= MAX_SEQUENCE)
            .ok_or(SequenceError::Exhausted)
    }

    /// Record that `number` has been durably persisted.
    ///
    /// Labels without digits, and the run 0, leave the counter alone.
    #[instrument(skip(self, number), fields(invoice_number = %number), err)]
    pub async fn commit(&self, number: &InvoiceNumber) -> Result<(), SequenceError> {
        let Some(run) = number.numeric_run().filter(|run| *run > 0) else {
            tracing::debug!("invoice number carries no sequence value; counter unchanged");
            return Ok(());
        };
        self.counters.advance_counter(INVOICE_COUNTER_KEY, run).await?;
        Ok(())
    }

    /// Rebuild the counter from the highest numbered stored invoice.
    ///
    /// Returns 0 without writing when no stored label has a number.
    #[instrument(skip(self), err)]
    pub async fn reconcile(&self) -> Result<u64, SequenceError> {
        let numbers = self.invoices.scan_invoice_numbers().await?;
        let scanned = numbers.len();
        let Some(highest) = numbers
            .iter()
            .filter_map(|n| extract_first_numeric_run(n.as_str()))
            .max()
        else {
            return Ok(0);
        };
        if highest == 0 {
            return Ok(0);
        }

        let stored = self
            .counters
            .advance_counter(INVOICE_COUNTER_KEY, highest)
            .await?;
        tracing::info!(
            recovered = stored,
            scanned,
            "invoice counter reconciled from stored invoices"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use invoicer_invoicing::Invoice;

    use super::*;
    use crate::store::InMemoryStore;

    type Sequence = InvoiceSequence<Arc<InMemoryStore>, Arc<InMemoryStore>>;

    fn sequence(store: &Arc<InMemoryStore>) -> Sequence {
        InvoiceSequence::new(store.clone(), store.clone())
    }

    async fn seed(store: &InMemoryStore, labels: &[&str]) {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (i, label) in labels.iter().enumerate() {
            let mut inv = Invoice::new(*label, "2024-01-01");
            inv.mark_saved(base + Duration::minutes(i as i64));
            store.insert_invoice(inv).await.unwrap();
        }
    }

    #[tokio::test]
    async fn empty_store_starts_at_one() {
        let store = Arc::new(InMemoryStore::new());
        let seq = sequence(&store);

        assert_eq!(seq.peek_last().await.unwrap(), 0);
        assert_eq!(seq.peek_next().await.unwrap(), 1);
        assert_eq!(store.read_counter(INVOICE_COUNTER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reconciliation_takes_numeric_maximum_regardless_of_order() {
        for labels in [
            ["INV-1", "INV-2", "INV-10"],
            ["INV-10", "INV-2", "INV-1"],
            ["INV-2", "INV-10", "INV-1"],
        ] {
            let store = Arc::new(InMemoryStore::new());
            seed(&store, &labels).await;
            assert_eq!(sequence(&store).peek_last().await.unwrap(), 10);
        }
    }

    #[tokio::test]
    async fn reconciliation_persists_recovered_value() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, &["A-3", "A-9", "draft"]).await;

        assert_eq!(sequence(&store).peek_last().await.unwrap(), 9);
        assert_eq!(store.read_counter(INVOICE_COUNTER_KEY).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn zero_counter_is_treated_as_missing() {
        let store = Arc::new(InMemoryStore::new());
        store.advance_counter(INVOICE_COUNTER_KEY, 0).await.unwrap();
        seed(&store, &["INV-4"]).await;

        assert_eq!(sequence(&store).peek_last().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn present_counter_skips_reconciliation() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, &["INV-50"]).await;
        store.advance_counter(INVOICE_COUNTER_KEY, 7).await.unwrap();

        assert_eq!(sequence(&store).peek_last().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn commit_only_moves_forward_and_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let seq = sequence(&store);

        seq.commit(&"INV-5".into()).await.unwrap();
        seq.commit(&"INV-3".into()).await.unwrap();
        assert_eq!(seq.peek_last().await.unwrap(), 5);

        seq.commit(&"INV-5".into()).await.unwrap();
        assert_eq!(seq.peek_last().await.unwrap(), 5);
        assert_eq!(seq.peek_next().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn commit_without_digits_is_a_noop() {
        let store = Arc::new(InMemoryStore::new());
        let seq = sequence(&store);
        seq.commit(&"INV-8".into()).await.unwrap();

        seq.commit(&"NO-DIGITS-HERE".into()).await.unwrap();
        assert_eq!(store.read_counter(INVOICE_COUNTER_KEY).await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn only_first_digit_run_counts() {
        let store = Arc::new(InMemoryStore::new());
        let seq = sequence(&store);
        seq.commit(&"INV-2024-007".into()).await.unwrap();
        assert_eq!(seq.peek_last().await.unwrap(), 2024);
    }

    #[tokio::test]
    async fn exhausted_counter_has_no_next_number() {
        let store = Arc::new(InMemoryStore::new());
        store
            .advance_counter(INVOICE_COUNTER_KEY, MAX_SEQUENCE)
            .await
            .unwrap();
        let err = sequence(&store).peek_next().await.unwrap_err();
        assert!(matches!(err, SequenceError::Exhausted));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_converge_on_the_maximum() {
        for _ in 0..20 {
            let store = Arc::new(InMemoryStore::new());
            let seq = Arc::new(sequence(&store));

            let late = {
                let seq = seq.clone();
                tokio::spawn(async move { seq.commit(&"INV-101".into()).await })
            };
            let early = {
                let seq = seq.clone();
                tokio::spawn(async move { seq.commit(&"INV-100".into()).await })
            };
            late.await.unwrap().unwrap();
            early.await.unwrap().unwrap();

            assert_eq!(seq.peek_last().await.unwrap(), 101);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lower_commit_finishing_last_does_not_rewind() {
        let store = Arc::new(InMemoryStore::new());
        let seq = Arc::new(sequence(&store));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

        // INV-100 is issued first but only lands after INV-101 has finished.
        let lower = {
            let seq = seq.clone();
            tokio::spawn(async move {
                done_rx.await.unwrap();
                seq.commit(&"INV-100".into()).await
            })
        };
        let higher = {
            let seq = seq.clone();
            tokio::spawn(async move {
                let result = seq.commit(&"INV-101".into()).await;
                done_tx.send(()).unwrap();
                result
            })
        };
        higher.await.unwrap().unwrap();
        assert_eq!(store.read_counter(INVOICE_COUNTER_KEY).await.unwrap(), Some(101));
        lower.await.unwrap().unwrap();

        assert_eq!(store.read_counter(INVOICE_COUNTER_KEY).await.unwrap(), Some(101));
        assert_eq!(seq.peek_next().await.unwrap(), 102);
    }

    /// Counter store that refuses values outside the Postgres `BIGINT` range.
    #[derive(Default)]
    struct BigintCounters {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl CounterStore for BigintCounters {
        async fn read_counter(&self, key: &str) -> Result<Option<u64>, StoreError> {
            self.inner.read_counter(key).await
        }

        async fn advance_counter(&self, key: &str, candidate: u64) -> Result<u64, StoreError> {
            if i64::try_from(candidate).is_err() {
                return Err(StoreError::OutOfRange(format!("{candidate} exceeds BIGINT")));
            }
            self.inner.advance_counter(key, candidate).await
        }
    }

    #[tokio::test]
    async fn oversized_labels_never_reach_the_counter() {
        let invoices = Arc::new(InMemoryStore::new());
        seed(&invoices, &["INV-12", "INV-9300000000000000000"]).await;
        let seq = InvoiceSequence::new(BigintCounters::default(), invoices.clone());

        assert_eq!(seq.peek_last().await.unwrap(), 12);
        seq.commit(&"INV-9300000000000000000".into()).await.unwrap();
        assert_eq!(seq.peek_next().await.unwrap(), 13);
    }

    #[tokio::test]
    async fn largest_sequence_value_is_the_last_one() {
        let seq = InvoiceSequence::new(BigintCounters::default(), Arc::new(InMemoryStore::new()));
        seq.commit(&InvoiceNumber::with_sequence("INV-", MAX_SEQUENCE)).await.unwrap();

        assert_eq!(seq.peek_last().await.unwrap(), MAX_SEQUENCE);
        assert!(matches!(seq.peek_next().await, Err(SequenceError::Exhausted)));
    }

    /// Store whose every call fails as if the backend were down.
    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn read_counter(&self, _key: &str) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn advance_counter(&self, _key: &str, _candidate: u64) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl InvoiceRepository for UnreachableStore {
        async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn find_invoice(&self, _: &InvoiceNumber) -> Result<Option<Invoice>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn insert_invoice(&self, _: Invoice) -> Result<Invoice, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn replace_invoice(&self, _: Invoice) -> Result<Option<Invoice>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn delete_invoice(&self, _: &InvoiceNumber) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn scan_invoice_numbers(&self) -> Result<Vec<InvoiceNumber>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_instead_of_a_guess() {
        let seq = InvoiceSequence::new(UnreachableStore, UnreachableStore);
        assert!(matches!(
            seq.peek_last().await,
            Err(SequenceError::Store(StoreError::Unavailable(_)))
        ));
        assert!(matches!(
            seq.peek_next().await,
            Err(SequenceError::Store(StoreError::Unavailable(_)))
        ));
        assert!(seq.commit(&"INV-1".into()).await.is_err());
        // Nothing to advance, so nothing to fail.
        assert!(seq.commit(&"draft".into()).await.is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn run<F: std::future::Future>(fut: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(fut)
        }

        proptest! {
            #[test]
            fn any_commit_order_ends_at_the_maximum(
                numbers in proptest::collection::vec(1u64..1_000_000, 1..20)
                    .prop_shuffle(),
            ) {
                let expected = *numbers.iter().max().unwrap();
                let last = run(async {
                    let store = Arc::new(InMemoryStore::new());
                    let seq = sequence(&store);
                    for n in &numbers {
                        seq.commit(&InvoiceNumber::with_sequence("INV-", *n)).await.unwrap();
                    }
                    seq.peek_last().await.unwrap()
                });
                prop_assert_eq!(last, expected);
            }

            #[test]
            fn reconciliation_matches_the_largest_stored_number(
                numbers in proptest::collection::hash_set(1u64..100_000, 1..15),
            ) {
                let expected = *numbers.iter().max().unwrap();
                let labels: Vec<String> = numbers.iter().map(|n| format!("INV-{n}")).collect();
                let last = run(async {
                    let store = Arc::new(InMemoryStore::new());
                    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
                    seed(&store, &refs).await;
                    sequence(&store).peek_last().await.unwrap()
                });
                prop_assert_eq!(last, expected);
            }
        }
    }
}
