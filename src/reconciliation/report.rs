//! Aggregation of persisted outcomes into summaries and listings

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traits::*;
use crate::types::*;

/// Outcome counts by status, with anomalies broken down by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_matched: usize,
    pub total_pending: usize,
    pub total_anomalies: usize,
    pub total_resolved: usize,
    /// Open anomalies per kind; resolved rows are not included
    pub anomaly_breakdown: HashMap<AnomalyType, usize>,
}

impl ReconciliationSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a ReconciliationOutcome>) -> Self {
        let mut summary = Self::default();

        for outcome in outcomes {
            match outcome.status {
                ReconciliationStatus::Matched => summary.total_matched += 1,
                ReconciliationStatus::Pending => summary.total_pending += 1,
                ReconciliationStatus::Resolved => summary.total_resolved += 1,
                ReconciliationStatus::Anomaly => {
                    summary.total_anomalies += 1;
                    if let Some(anomaly_type) = outcome.anomaly_type {
                        *summary.anomaly_breakdown.entry(anomaly_type).or_default() += 1;
                    }
                }
            }
        }

        summary
    }

    /// Total number of rows counted
    pub fn total(&self) -> usize {
        self.total_matched + self.total_pending + self.total_anomalies + self.total_resolved
    }
}

/// Read-side queries over persisted outcomes
pub struct ReconciliationReport;

impl ReconciliationReport {
    /// Summarise outcome rows, optionally only those created on one day
    pub async fn summary<S: ReconciliationStorage>(
        storage: &S,
        date_filter: Option<NaiveDate>,
    ) -> ReconResult<ReconciliationSummary> {
        let outcomes = storage.list_outcomes(None).await?;
        Ok(ReconciliationSummary::from_outcomes(
            outcomes
                .iter()
                .filter(|outcome| date_filter.is_none_or(|date| outcome.created_on(date))),
        ))
    }

    /// Newest outcome rows first, optionally restricted to one status
    pub async fn detailed_results<S: ReconciliationStorage>(
        storage: &S,
        status_filter: Option<ReconciliationStatus>,
        limit: usize,
    ) -> ReconResult<Vec<ReconciliationOutcome>> {
        let mut outcomes = storage.list_outcomes(status_filter).await?;
        outcomes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        outcomes.truncate(limit);
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStorage;

    fn anomaly(anomaly_type: AnomalyType) -> ReconciliationOutcome {
        ReconciliationOutcome::from_anomaly(&Anomaly {
            mpr_id: Some(1),
            internal_id: None,
            bank_id: None,
            anomaly_type,
            description: String::new(),
        })
    }

    #[test]
    fn test_summary_counts() {
        let mut resolved = anomaly(AnomalyType::MissingInternal);
        resolved.status = ReconciliationStatus::Resolved;
        let outcomes = vec![
            ReconciliationOutcome::matched(1, 1, 1),
            ReconciliationOutcome::pending(2, 2),
            ReconciliationOutcome::pending(3, 3),
            anomaly(AnomalyType::MissingInternal),
            anomaly(AnomalyType::MissingInternal),
            anomaly(AnomalyType::AmountMismatch),
            resolved,
        ];

        let summary = ReconciliationSummary::from_outcomes(&outcomes);

        assert_eq!(summary.total_matched, 1);
        assert_eq!(summary.total_pending, 2);
        assert_eq!(summary.total_anomalies, 3);
        assert_eq!(summary.total_resolved, 1);
        assert_eq!(summary.total(), outcomes.len());
        assert_eq!(summary.anomaly_breakdown[&AnomalyType::MissingInternal], 2);
        assert_eq!(summary.anomaly_breakdown[&AnomalyType::AmountMismatch], 1);
        assert!(!summary
            .anomaly_breakdown
            .contains_key(&AnomalyType::Duplicate));
    }

    #[tokio::test]
    async fn test_summary_by_day_and_detailed_listing() {
        let mut storage = MemoryStorage::new();
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let older = ReconciliationOutcome::pending(1, 1)
            .with_created_at(day.and_hms_opt(8, 0, 0).unwrap());
        let newer = ReconciliationOutcome::matched(2, 2, 2)
            .with_created_at(day.and_hms_opt(9, 0, 0).unwrap());
        let other_day = ReconciliationOutcome::pending(3, 3)
            .with_created_at(day.succ_opt().unwrap().and_hms_opt(9, 0, 0).unwrap());
        for outcome in [&older, &newer, &other_day] {
            storage.insert_outcome(outcome).await.unwrap();
        }

        let summary = ReconciliationReport::summary(&storage, Some(day)).await.unwrap();
        assert_eq!(summary.total_pending, 1);
        assert_eq!(summary.total_matched, 1);

        let listing = ReconciliationReport::detailed_results(&storage, None, 2)
            .await
            .unwrap();
        assert_eq!(listing, vec![other_day.clone(), newer.clone()]);

        let pending = ReconciliationReport::detailed_results(
            &storage,
            Some(ReconciliationStatus::Pending),
            10,
        )
        .await
        .unwrap();
        assert_eq!(pending, vec![other_day, older]);
    }
}
