//! Traits for storage abstraction and record matching

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::types::*;

/// Storage abstraction for transaction sets and reconciliation outcomes
///
/// This trait allows the reconciliation engine to work with any storage backend
/// (SQL Server, PostgreSQL, SQLite, in-memory, etc.) by implementing these methods.
/// Every read of transactions returns only records of `Completed` uploads, in a
/// stable order, since matching is order-dependent.
#[async_trait]
pub trait ReconciliationStorage: Send + Sync {
    /// MPR records of completed uploads, optionally restricted to one calendar day
    async fn completed_mpr_transactions(
        &self,
        date: Option<NaiveDate>,
    ) -> ReconResult<Vec<MprTransaction>>;

    /// Internal records of completed uploads, optionally restricted to one calendar day
    async fn completed_internal_transactions(
        &self,
        date: Option<NaiveDate>,
    ) -> ReconResult<Vec<InternalTransaction>>;

    /// Bank entries (credits and debits) of completed uploads, optionally restricted to one day
    async fn completed_bank_transactions(
        &self,
        date: Option<NaiveDate>,
    ) -> ReconResult<Vec<BankTransaction>>;

    /// Look up a single MPR record by id
    async fn get_mpr_transaction(&self, id: RecordId) -> ReconResult<Option<MprTransaction>>;

    /// Look up a single internal record by id
    async fn get_internal_transaction(
        &self,
        id: RecordId,
    ) -> ReconResult<Option<InternalTransaction>>;

    /// Persist a new outcome row
    async fn insert_outcome(&mut self, outcome: &ReconciliationOutcome) -> ReconResult<()>;

    /// All outcome rows, optionally only those with the given status
    async fn list_outcomes(
        &self,
        status: Option<ReconciliationStatus>,
    ) -> ReconResult<Vec<ReconciliationOutcome>>;

    /// Delete every outcome row created on the given calendar day, returning how many went
    async fn delete_outcomes_created_on(&mut self, date: NaiveDate) -> ReconResult<usize>;

    /// Operator acknowledgement of an anomaly: ANOMALY -> RESOLVED
    async fn resolve_outcome(
        &mut self,
        outcome_id: Uuid,
        resolved_at: NaiveDateTime,
    ) -> ReconResult<ReconciliationOutcome>;
}

/// Reference fields that can serve as an exact matching key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey {
    TransactionId,
    Utr,
}

/// A record that can take part in a matching pass
pub trait Matchable {
    /// Identifier reported in the emitted candidate
    fn record_id(&self) -> RecordId;

    fn amount(&self) -> Option<&BigDecimal>;

    /// Raw timestamp text, if the record carries one
    fn timestamp(&self) -> Option<&str>;

    /// Value of the requested key field; `None` when the record has no such field
    fn key(&self, key: MatchKey) -> Option<&str>;
}

impl<T: Matchable + ?Sized> Matchable for &T {
    fn record_id(&self) -> RecordId {
        (**self).record_id()
    }

    fn amount(&self) -> Option<&BigDecimal> {
        (**self).amount()
    }

    fn timestamp(&self) -> Option<&str> {
        (**self).timestamp()
    }

    fn key(&self, key: MatchKey) -> Option<&str> {
        (**self).key(key)
    }
}

impl Matchable for MprTransaction {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn amount(&self) -> Option<&BigDecimal> {
        self.amount.as_ref()
    }

    fn timestamp(&self) -> Option<&str> {
        self.transaction_time.as_deref()
    }

    fn key(&self, key: MatchKey) -> Option<&str> {
        match key {
            MatchKey::TransactionId => self.transaction_id.as_deref(),
            MatchKey::Utr => self.utr.as_deref(),
        }
    }
}

impl Matchable for InternalTransaction {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn amount(&self) -> Option<&BigDecimal> {
        self.amount.as_ref()
    }

    fn timestamp(&self) -> Option<&str> {
        self.transaction_time.as_deref()
    }

    fn key(&self, key: MatchKey) -> Option<&str> {
        match key {
            MatchKey::TransactionId => self.transaction_id.as_deref(),
            MatchKey::Utr => None,
        }
    }
}

impl Matchable for BankTransaction {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn amount(&self) -> Option<&BigDecimal> {
        self.amount.as_ref()
    }

    fn timestamp(&self) -> Option<&str> {
        self.transaction_date.as_deref()
    }

    fn key(&self, key: MatchKey) -> Option<&str> {
        match key {
            MatchKey::TransactionId => None,
            MatchKey::Utr => self.utr.as_deref(),
        }
    }
}
