//! Reconciliation orchestrator that sequences matching, anomaly detection and persistence

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::reconciliation::anomaly::{AnomalyDetector, ReferencedIds};
use crate::reconciliation::matcher::{Claims, MatchRule, Matcher, ResolvedPair};
use crate::reconciliation::report::ReconciliationSummary;
use crate::settings::ReconConfig;
use crate::traits::*;
use crate::types::*;

/// Everything one reconciliation run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub date_filter: Option<NaiveDate>,
    /// First-stage MPR/internal links
    pub mpr_internal_matches: Vec<MatchCandidate>,
    /// Links that were additionally matched to a bank credit
    pub bank_matches: Vec<BankMatch>,
    /// Rows written during the run, in write order
    pub outcomes: Vec<ReconciliationOutcome>,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
}

impl ReconciliationRun {
    /// Number of outcome rows written
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary::from_outcomes(&self.outcomes)
    }
}

/// Runs full reconciliation passes against a storage backend.
///
/// Runs execute their stages strictly one after another. Two engines sharing one
/// store are not coordinated and may interleave their writes.
pub struct ReconciliationEngine<S: ReconciliationStorage> {
    storage: S,
    config: ReconConfig,
}

impl<S: ReconciliationStorage> ReconciliationEngine<S> {
    /// Create a new engine with the given storage backend and tolerances
    pub fn new(storage: S, config: ReconConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Run a complete reconciliation, optionally scoped to one calendar day.
    ///
    /// With a date, outcome rows created on that day are deleted first. Failures in the
    /// clearing, matching and detection stages are logged and yield no results for that
    /// stage; a failed outcome write aborts the run, keeping rows already written.
    pub async fn run(&mut self, date_filter: Option<NaiveDate>) -> ReconResult<ReconciliationRun> {
        let started_at = chrono::Utc::now().naive_utc();
        tracing::info!(date = ?date_filter, "Starting reconciliation");

        if let Some(date) = date_filter {
            match self.storage.delete_outcomes_created_on(date).await {
                Ok(deleted) => tracing::debug!(%date, deleted, "Cleared previous results"),
                Err(err) => {
                    tracing::error!(%date, error = %err, "Failed to clear previous results")
                }
            }
        }

        let mpr_internal_matches = self
            .match_mpr_with_internal(date_filter)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "MPR-internal matching failed");
                Vec::new()
            });

        let bank_matches = self
            .match_with_bank(date_filter, &mpr_internal_matches)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "Bank statement matching failed");
                Vec::new()
            });

        let mut anomalies = self
            .detect_missing(date_filter, &mpr_internal_matches, &bank_matches)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "Missing counterpart detection failed");
                Vec::new()
            });

        let mut outcomes = Vec::new();
        self.persist_links(&mpr_internal_matches, &bank_matches, &mut outcomes)
            .await
            .inspect_err(|err| {
                tracing::error!(written = outcomes.len(), error = %err, "Writing matches failed")
            })?;

        // Runs against persisted state, so rows written above are included.
        let detector = AnomalyDetector::new(&self.config);
        match detector.scan_amount_mismatches(&self.storage).await {
            Ok(mismatches) => anomalies.extend(mismatches),
            Err(err) => tracing::error!(error = %err, "Amount mismatch scan failed"),
        }
        tracing::info!(anomalies = anomalies.len(), "Anomaly detection completed");

        for anomaly in &anomalies {
            let outcome = ReconciliationOutcome::from_anomaly(anomaly);
            self.storage
                .insert_outcome(&outcome)
                .await
                .inspect_err(|err| {
                    tracing::error!(written = outcomes.len(), error = %err, "Writing anomalies failed")
                })?;
            outcomes.push(outcome);
        }

        tracing::info!(results = outcomes.len(), "Reconciliation completed");

        Ok(ReconciliationRun {
            date_filter,
            mpr_internal_matches,
            bank_matches,
            outcomes,
            started_at,
            finished_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Link completed MPR records to completed internal records.
    ///
    /// Pairs already confirmed by persisted MATCHED rows are left out, so a re-run does
    /// not link them a second time.
    pub async fn match_mpr_with_internal(
        &self,
        date_filter: Option<NaiveDate>,
    ) -> ReconResult<Vec<MatchCandidate>> {
        let mpr = self.storage.completed_mpr_transactions(date_filter).await?;
        let internal = self
            .storage
            .completed_internal_transactions(date_filter)
            .await?;

        let mut claims = Claims::default();
        for outcome in self
            .storage
            .list_outcomes(Some(ReconciliationStatus::Matched))
            .await?
        {
            if let Some(mpr_id) = outcome.mpr_transaction_id {
                claims.a.insert(mpr_id);
            }
            if let Some(internal_id) = outcome.internal_transaction_id {
                claims.b.insert(internal_id);
            }
        }

        let matches = Matcher::new(&self.config).match_with_claims(
            &mpr,
            &internal,
            &MatchRule::MPR_INTERNAL,
            &mut claims,
        );

        tracing::info!(
            mpr = mpr.len(),
            internal = internal.len(),
            matches = matches.len(),
            "MPR-internal matching completed"
        );
        Ok(matches)
    }

    /// Refine first-stage links with a bank credit.
    ///
    /// Bank records already referenced by persisted MATCHED rows are not linked again.
    pub async fn match_with_bank(
        &self,
        date_filter: Option<NaiveDate>,
        links: &[MatchCandidate],
    ) -> ReconResult<Vec<BankMatch>> {
        let bank = self.storage.completed_bank_transactions(date_filter).await?;

        let claimed_bank: HashSet<RecordId> = self
            .storage
            .list_outcomes(Some(ReconciliationStatus::Matched))
            .await?
            .into_iter()
            .filter_map(|outcome| outcome.bank_transaction_id)
            .collect();

        let mut linked = Vec::with_capacity(links.len());
        for link in links {
            match self.storage.get_mpr_transaction(link.source_a_id).await? {
                Some(mpr) => linked.push((mpr, link.source_b_id)),
                None => tracing::warn!(mpr_id = link.source_a_id, "Linked MPR record vanished"),
            }
        }
        let pairs: Vec<ResolvedPair<'_>> = linked
            .iter()
            .map(|(mpr, internal_id)| ResolvedPair {
                mpr,
                internal_id: *internal_id,
            })
            .collect();

        let matches = Matcher::new(&self.config).match_bank(&pairs, &bank, &claimed_bank);

        tracing::info!(
            pairs = pairs.len(),
            bank = bank.len(),
            matches = matches.len(),
            "Bank statement matching completed"
        );
        Ok(matches)
    }

    /// Flag records that neither an existing outcome row nor this run's links account for
    pub async fn detect_missing(
        &self,
        date_filter: Option<NaiveDate>,
        links: &[MatchCandidate],
        bank_matches: &[BankMatch],
    ) -> ReconResult<Vec<Anomaly>> {
        let mpr = self.storage.completed_mpr_transactions(date_filter).await?;
        let internal = self
            .storage
            .completed_internal_transactions(date_filter)
            .await?;

        let mut referenced = ReferencedIds::from_outcomes(&self.storage.list_outcomes(None).await?);
        for link in links {
            referenced.add_pair(link.source_a_id, link.source_b_id);
        }
        for bank_match in bank_matches {
            referenced.add_pair(bank_match.mpr_id, bank_match.internal_id);
        }

        Ok(AnomalyDetector::new(&self.config).detect_missing(&mpr, &internal, &referenced))
    }

    /// Write MATCHED rows for bank-qualified links, then PENDING rows for the rest
    async fn persist_links(
        &mut self,
        links: &[MatchCandidate],
        bank_matches: &[BankMatch],
        written: &mut Vec<ReconciliationOutcome>,
    ) -> ReconResult<()> {
        for bank_match in bank_matches {
            let outcome = ReconciliationOutcome::matched(
                bank_match.mpr_id,
                bank_match.internal_id,
                bank_match.bank_id,
            );
            self.storage.insert_outcome(&outcome).await?;
            written.push(outcome);
        }

        let bank_qualified: HashSet<RecordId> = bank_matches.iter().map(|m| m.mpr_id).collect();
        for link in links
            .iter()
            .filter(|link| !bank_qualified.contains(&link.source_a_id))
        {
            let outcome = ReconciliationOutcome::pending(link.source_a_id, link.source_b_id);
            self.storage.insert_outcome(&outcome).await?;
            written.push(outcome);
        }

        Ok(())
    }
}
