//! Anomaly detection over unmatched records and inconsistent matches

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::settings::ReconConfig;
use crate::traits::*;
use crate::types::*;

/// Transaction ids already accounted for by some outcome or match of the current run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferencedIds {
    pub mpr: HashSet<RecordId>,
    pub internal: HashSet<RecordId>,
}

impl ReferencedIds {
    /// Collect every MPR and internal id referenced by existing outcome rows, whatever their status
    pub fn from_outcomes(outcomes: &[ReconciliationOutcome]) -> Self {
        let mut ids = Self::default();
        for outcome in outcomes {
            if let Some(mpr_id) = outcome.mpr_transaction_id {
                ids.mpr.insert(mpr_id);
            }
            if let Some(internal_id) = outcome.internal_transaction_id {
                ids.internal.insert(internal_id);
            }
        }
        ids
    }

    pub fn add_pair(&mut self, mpr_id: RecordId, internal_id: RecordId) {
        self.mpr.insert(mpr_id);
        self.internal.insert(internal_id);
    }
}

/// Classifies leftovers and inconsistent matches into anomaly kinds.
///
/// `MissingBank` and `Duplicate` have no detection path here.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector<'c> {
    config: &'c ReconConfig,
}

impl<'c> AnomalyDetector<'c> {
    pub fn new(config: &'c ReconConfig) -> Self {
        Self { config }
    }

    /// Flag MPR records without an internal counterpart and internal records without an
    /// MPR counterpart. MPR anomalies come first, each group in input order.
    pub fn detect_missing(
        &self,
        mpr: &[MprTransaction],
        internal: &[InternalTransaction],
        referenced: &ReferencedIds,
    ) -> Vec<Anomaly> {
        let missing_internal = mpr
            .iter()
            .filter(|txn| !referenced.mpr.contains(&txn.id))
            .map(|txn| Anomaly {
                mpr_id: Some(txn.id),
                internal_id: None,
                bank_id: None,
                anomaly_type: AnomalyType::MissingInternal,
                description: format!(
                    "MPR transaction {} ({}) has no matching internal record",
                    label(txn.id, txn.transaction_id.as_deref()),
                    display_amount(txn.amount.as_ref())
                ),
            });

        let missing_mpr = internal
            .iter()
            .filter(|txn| !referenced.internal.contains(&txn.id))
            .map(|txn| Anomaly {
                mpr_id: None,
                internal_id: Some(txn.id),
                bank_id: None,
                anomaly_type: AnomalyType::MissingMpr,
                description: format!(
                    "Internal transaction {} ({}) has no matching MPR record",
                    label(txn.id, txn.transaction_id.as_deref()),
                    display_amount(txn.amount.as_ref())
                ),
            });

        missing_internal.chain(missing_mpr).collect()
    }

    /// Check one MATCHED row's amounts. Rows with a missing amount on either side are skipped.
    pub fn check_amount_mismatch(
        &self,
        outcome: &ReconciliationOutcome,
        mpr: &MprTransaction,
        internal: &InternalTransaction,
    ) -> Option<Anomaly> {
        if outcome.status != ReconciliationStatus::Matched {
            return None;
        }
        let (Some(mpr_amount), Some(internal_amount)) = (mpr.amount(), internal.amount()) else {
            return None;
        };
        if self
            .config
            .amounts_within_tolerance(mpr_amount, internal_amount)
        {
            return None;
        }

        Some(Anomaly {
            mpr_id: Some(mpr.id),
            internal_id: Some(internal.id),
            bank_id: None,
            anomaly_type: AnomalyType::AmountMismatch,
            description: format!(
                "Amount mismatch: MPR {} amount {} vs Internal {} amount {}",
                label(mpr.id, mpr.transaction_id.as_deref()),
                mpr_amount,
                label(internal.id, internal.transaction_id.as_deref()),
                internal_amount
            ),
        })
    }

    /// Scan every persisted MATCHED row for MPR/internal amount disagreement
    pub async fn scan_amount_mismatches<S: ReconciliationStorage>(
        &self,
        storage: &S,
    ) -> ReconResult<Vec<Anomaly>> {
        let matched = storage
            .list_outcomes(Some(ReconciliationStatus::Matched))
            .await?;
        let mut anomalies = Vec::new();

        for outcome in &matched {
            let (Some(mpr_id), Some(internal_id)) =
                (outcome.mpr_transaction_id, outcome.internal_transaction_id)
            else {
                continue;
            };

            let Some(mpr) = storage.get_mpr_transaction(mpr_id).await? else {
                continue;
            };
            let Some(internal) = storage.get_internal_transaction(internal_id).await? else {
                continue;
            };

            if let Some(anomaly) = self.check_amount_mismatch(outcome, &mpr, &internal) {
                anomalies.push(anomaly);
            }
        }

        Ok(anomalies)
    }
}

fn label(id: RecordId, transaction_id: Option<&str>) -> String {
    match transaction_id {
        Some(reference) => reference.to_string(),
        None => format!("#{}", id),
    }
}

fn display_amount(amount: Option<&BigDecimal>) -> String {
    amount
        .map(|a| a.to_string())
        .unwrap_or_else(|| "no amount".to_string())
}
