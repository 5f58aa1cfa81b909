//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::timestamp_date;

/// In-memory storage implementation for testing and development
///
/// Clones share the same underlying data. Records are returned in insertion order.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    uploads: Arc<RwLock<HashMap<RecordId, Upload>>>,
    mpr_transactions: Arc<RwLock<Vec<MprTransaction>>>,
    internal_transactions: Arc<RwLock<Vec<InternalTransaction>>>,
    bank_transactions: Arc<RwLock<Vec<BankTransaction>>>,
    outcomes: Arc<RwLock<Vec<ReconciliationOutcome>>>,
    /// Remaining outcome inserts before writes start failing; `None` means unlimited
    insert_budget: Arc<RwLock<Option<usize>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(RwLock::new(HashMap::new())),
            mpr_transactions: Arc::new(RwLock::new(Vec::new())),
            internal_transactions: Arc::new(RwLock::new(Vec::new())),
            bank_transactions: Arc::new(RwLock::new(Vec::new())),
            outcomes: Arc::new(RwLock::new(Vec::new())),
            insert_budget: Arc::new(RwLock::new(None)),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        write(&self.uploads).clear();
        write(&self.mpr_transactions).clear();
        write(&self.internal_transactions).clear();
        write(&self.bank_transactions).clear();
        write(&self.outcomes).clear();
        *write(&self.insert_budget) = None;
    }

    /// Register an upload batch, replacing any batch with the same id
    pub fn add_upload(&self, upload: Upload) {
        write(&self.uploads).insert(upload.id, upload);
    }

    /// Mark an upload batch as completed
    pub fn complete_upload(&self, upload_id: RecordId) -> ReconResult<()> {
        match write(&self.uploads).get_mut(&upload_id) {
            Some(upload) => {
                upload.status = UploadStatus::Completed;
                Ok(())
            }
            None => Err(ReconError::Storage(format!(
                "Upload {} does not exist",
                upload_id
            ))),
        }
    }

    pub fn add_mpr_transaction(&self, transaction: MprTransaction) {
        write(&self.mpr_transactions).push(transaction);
    }

    pub fn add_internal_transaction(&self, transaction: InternalTransaction) {
        write(&self.internal_transactions).push(transaction);
    }

    pub fn add_bank_transaction(&self, transaction: BankTransaction) {
        write(&self.bank_transactions).push(transaction);
    }

    /// Let the next `inserts` outcome inserts succeed and fail every one after that
    pub fn fail_inserts_after(&self, inserts: usize) {
        *write(&self.insert_budget) = Some(inserts);
    }

    fn upload_completed(&self, upload_id: RecordId, source: TransactionSource) -> bool {
        read(&self.uploads)
            .get(&upload_id)
            .is_some_and(|upload| upload.source == source && upload.is_completed())
    }

    fn on_day(timestamp: Option<&str>, date: Option<NaiveDate>) -> bool {
        match date {
            None => true,
            Some(day) => timestamp.and_then(timestamp_date) == Some(day),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReconciliationStorage for MemoryStorage {
    async fn completed_mpr_transactions(
        &self,
        date: Option<NaiveDate>,
    ) -> ReconResult<Vec<MprTransaction>> {
        let transactions = read(&self.mpr_transactions);
        Ok(transactions
            .iter()
            .filter(|txn| self.upload_completed(txn.upload_id, TransactionSource::Mpr))
            .filter(|txn| Self::on_day(txn.transaction_time.as_deref(), date))
            .cloned()
            .collect())
    }

    async fn completed_internal_transactions(
        &self,
        date: Option<NaiveDate>,
    ) -> ReconResult<Vec<InternalTransaction>> {
        let transactions = read(&self.internal_transactions);
        Ok(transactions
            .iter()
            .filter(|txn| self.upload_completed(txn.upload_id, TransactionSource::Internal))
            .filter(|txn| Self::on_day(txn.transaction_time.as_deref(), date))
            .cloned()
            .collect())
    }

    async fn completed_bank_transactions(
        &self,
        date: Option<NaiveDate>,
    ) -> ReconResult<Vec<BankTransaction>> {
        let transactions = read(&self.bank_transactions);
        Ok(transactions
            .iter()
            .filter(|txn| self.upload_completed(txn.upload_id, TransactionSource::Bank))
            .filter(|txn| Self::on_day(txn.transaction_date.as_deref(), date))
            .cloned()
            .collect())
    }

    async fn get_mpr_transaction(&self, id: RecordId) -> ReconResult<Option<MprTransaction>> {
        Ok(read(&self.mpr_transactions)
            .iter()
            .find(|txn| txn.id == id)
            .cloned())
    }

    async fn get_internal_transaction(
        &self,
        id: RecordId,
    ) -> ReconResult<Option<InternalTransaction>> {
        Ok(read(&self.internal_transactions)
            .iter()
            .find(|txn| txn.id == id)
            .cloned())
    }

    async fn insert_outcome(&mut self, outcome: &ReconciliationOutcome) -> ReconResult<()> {
        outcome.validate()?;

        {
            let mut budget = write(&self.insert_budget);
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(ReconError::Storage(format!(
                        "Failed to insert outcome {}: write rejected",
                        outcome.id
                    )));
                }
                *remaining -= 1;
            }
        }

        write(&self.outcomes).push(outcome.clone());
        Ok(())
    }

    async fn list_outcomes(
        &self,
        status: Option<ReconciliationStatus>,
    ) -> ReconResult<Vec<ReconciliationOutcome>> {
        Ok(read(&self.outcomes)
            .iter()
            .filter(|outcome| status.is_none_or(|s| outcome.status == s))
            .cloned()
            .collect())
    }

    async fn delete_outcomes_created_on(&mut self, date: NaiveDate) -> ReconResult<usize> {
        let mut outcomes = write(&self.outcomes);
        let before = outcomes.len();
        outcomes.retain(|outcome| !outcome.created_on(date));
        Ok(before - outcomes.len())
    }

    async fn resolve_outcome(
        &mut self,
        outcome_id: Uuid,
        resolved_at: NaiveDateTime,
    ) -> ReconResult<ReconciliationOutcome> {
        let mut outcomes = write(&self.outcomes);
        let outcome = outcomes
            .iter_mut()
            .find(|outcome| outcome.id == outcome_id)
            .ok_or(ReconError::OutcomeNotFound(outcome_id))?;

        if outcome.status != ReconciliationStatus::Anomaly {
            return Err(ReconError::InvalidTransition(format!(
                "Outcome {} has status {}; only ANOMALY rows can be resolved",
                outcome_id, outcome.status
            )));
        }

        outcome.status = ReconciliationStatus::Resolved;
        outcome.resolved_at = Some(resolved_at);
        Ok(outcome.clone())
    }
}
