//! Core types and data structures for the reconciliation system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a transaction record or upload batch within its source
pub type RecordId = i64;

/// The three independently-sourced ledgers being reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    /// Channel-reported settlement report
    Mpr,
    /// The organization's own transaction log
    Internal,
    /// Bank statement entries
    Bank,
}

/// Processing state of an upload batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    Completed,
}

/// An upload batch that transaction records belong to.
///
/// Only records of `Completed` uploads take part in reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: RecordId,
    pub source: TransactionSource,
    pub status: UploadStatus,
    pub uploaded_at: NaiveDateTime,
}

impl Upload {
    /// Create a new upload batch in `Pending` state
    pub fn new(id: RecordId, source: TransactionSource) -> Self {
        Self {
            id,
            source,
            status: UploadStatus::Pending,
            uploaded_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Create an upload batch that has already finished processing
    pub fn completed(id: RecordId, source: TransactionSource) -> Self {
        let mut upload = Self::new(id, source);
        upload.status = UploadStatus::Completed;
        upload
    }

    pub fn is_completed(&self) -> bool {
        self.status == UploadStatus::Completed
    }
}

/// A record from a channel settlement report (MPR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MprTransaction {
    pub id: RecordId,
    pub upload_id: RecordId,
    /// External reference shared with the internal log; not guaranteed unique
    pub transaction_id: Option<String>,
    pub amount: Option<BigDecimal>,
    /// Raw timestamp text as delivered by the upload
    pub transaction_time: Option<String>,
    /// Bank settlement reference
    pub utr: Option<String>,
}

impl MprTransaction {
    /// Create a new MPR record with an amount and no optional fields
    pub fn new(id: RecordId, upload_id: RecordId, amount: BigDecimal) -> Self {
        Self {
            id,
            upload_id,
            transaction_id: None,
            amount: Some(amount),
            transaction_time: None,
            utr: None,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_time(mut self, transaction_time: impl Into<String>) -> Self {
        self.transaction_time = Some(transaction_time.into());
        self
    }

    pub fn with_utr(mut self, utr: impl Into<String>) -> Self {
        self.utr = Some(utr.into());
        self
    }
}

/// A record from the organization's internal transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTransaction {
    pub id: RecordId,
    pub upload_id: RecordId,
    pub transaction_id: Option<String>,
    pub amount: Option<BigDecimal>,
    pub transaction_time: Option<String>,
}

impl InternalTransaction {
    /// Create a new internal record with an amount and no optional fields
    pub fn new(id: RecordId, upload_id: RecordId, amount: BigDecimal) -> Self {
        Self {
            id,
            upload_id,
            transaction_id: None,
            amount: Some(amount),
            transaction_time: None,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_time(mut self, transaction_time: impl Into<String>) -> Self {
        self.transaction_time = Some(transaction_time.into());
        self
    }
}

/// A bank statement entry. Positive amounts are credits, negative amounts debits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: RecordId,
    pub upload_id: RecordId,
    pub amount: Option<BigDecimal>,
    pub utr: Option<String>,
    pub transaction_date: Option<String>,
    /// Statement narration
    pub description: Option<String>,
}

impl BankTransaction {
    /// Create a new bank entry with a signed amount and no optional fields
    pub fn new(id: RecordId, upload_id: RecordId, amount: BigDecimal) -> Self {
        Self {
            id,
            upload_id,
            amount: Some(amount),
            utr: None,
            transaction_date: None,
            description: None,
        }
    }

    pub fn with_utr(mut self, utr: impl Into<String>) -> Self {
        self.utr = Some(utr.into());
        self
    }

    pub fn with_date(mut self, transaction_date: impl Into<String>) -> Self {
        self.transaction_date = Some(transaction_date.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this entry is a credit (strictly positive amount)
    pub fn is_credit(&self) -> bool {
        self.amount
            .as_ref()
            .is_some_and(|amount| *amount > BigDecimal::from(0))
    }
}

/// How a match candidate was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Equal external transaction id within amount tolerance
    ExactId,
    /// Amount within tolerance and dates within the date window
    AmountDate,
    /// Equal bank settlement reference within amount tolerance
    Utr,
    /// Amount within tolerance only
    Amount,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactId => "EXACT_ID",
            MatchType::AmountDate => "AMOUNT_DATE",
            MatchType::Utr => "UTR",
            MatchType::Amount => "AMOUNT",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link between one record of collection A and one record of collection B
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub source_a_id: RecordId,
    pub source_b_id: RecordId,
    pub match_type: MatchType,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// An MPR/internal pair that was additionally linked to a bank credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankMatch {
    pub mpr_id: RecordId,
    pub internal_id: RecordId,
    pub bank_id: RecordId,
    pub match_type: MatchType,
    pub confidence: f64,
}

/// Status of a reconciliation outcome row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    /// MPR and internal linked, no bank credit found yet
    Pending,
    /// Linked across MPR, internal and bank
    Matched,
    /// Missing counterpart or inconsistent amounts
    Anomaly,
    /// Anomaly acknowledged by an operator
    Resolved,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Pending => "PENDING",
            ReconciliationStatus::Matched => "MATCHED",
            ReconciliationStatus::Anomaly => "ANOMALY",
            ReconciliationStatus::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationStatus {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReconciliationStatus::Pending),
            "MATCHED" => Ok(ReconciliationStatus::Matched),
            "ANOMALY" => Ok(ReconciliationStatus::Anomaly),
            "RESOLVED" => Ok(ReconciliationStatus::Resolved),
            other => Err(ReconError::Validation(format!(
                "Unknown reconciliation status: {}",
                other
            ))),
        }
    }
}

/// Classification of a reconciliation anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    /// A matched pair whose MPR and internal amounts differ beyond tolerance
    AmountMismatch,
    /// MPR record with no internal counterpart
    MissingInternal,
    /// Internal record with no MPR counterpart
    MissingMpr,
    /// Reserved: no detection path produces it yet
    MissingBank,
    /// Reserved: no detection path produces it yet
    Duplicate,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::AmountMismatch => "AMOUNT_MISMATCH",
            AnomalyType::MissingInternal => "MISSING_INTERNAL",
            AnomalyType::MissingMpr => "MISSING_MPR",
            AnomalyType::MissingBank => "MISSING_BANK",
            AnomalyType::Duplicate => "DUPLICATE",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyType {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AMOUNT_MISMATCH" => Ok(AnomalyType::AmountMismatch),
            "MISSING_INTERNAL" => Ok(AnomalyType::MissingInternal),
            "MISSING_MPR" => Ok(AnomalyType::MissingMpr),
            "MISSING_BANK" => Ok(AnomalyType::MissingBank),
            "DUPLICATE" => Ok(AnomalyType::Duplicate),
            other => Err(ReconError::Validation(format!(
                "Unknown anomaly type: {}",
                other
            ))),
        }
    }
}

/// An anomaly found by the detector, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub mpr_id: Option<RecordId>,
    pub internal_id: Option<RecordId>,
    pub bank_id: Option<RecordId>,
    pub anomaly_type: AnomalyType,
    /// Human-readable explanation naming the offending records
    pub description: String,
}

/// A persisted reconciliation result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub id: Uuid,
    pub mpr_transaction_id: Option<RecordId>,
    pub internal_transaction_id: Option<RecordId>,
    pub bank_transaction_id: Option<RecordId>,
    pub status: ReconciliationStatus,
    pub anomaly_type: Option<AnomalyType>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

impl ReconciliationOutcome {
    fn new(
        mpr_transaction_id: Option<RecordId>,
        internal_transaction_id: Option<RecordId>,
        bank_transaction_id: Option<RecordId>,
        status: ReconciliationStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mpr_transaction_id,
            internal_transaction_id,
            bank_transaction_id,
            status,
            anomaly_type: None,
            description: None,
            created_at: chrono::Utc::now().naive_utc(),
            resolved_at: None,
        }
    }

    /// A linkage confirmed across MPR, internal and bank
    pub fn matched(mpr_id: RecordId, internal_id: RecordId, bank_id: RecordId) -> Self {
        Self::new(
            Some(mpr_id),
            Some(internal_id),
            Some(bank_id),
            ReconciliationStatus::Matched,
        )
    }

    /// An MPR/internal linkage still waiting for a bank credit
    pub fn pending(mpr_id: RecordId, internal_id: RecordId) -> Self {
        Self::new(
            Some(mpr_id),
            Some(internal_id),
            None,
            ReconciliationStatus::Pending,
        )
    }

    /// An anomaly row carrying whatever ids the anomaly involves
    pub fn from_anomaly(anomaly: &Anomaly) -> Self {
        let mut outcome = Self::new(
            anomaly.mpr_id,
            anomaly.internal_id,
            anomaly.bank_id,
            ReconciliationStatus::Anomaly,
        );
        outcome.anomaly_type = Some(anomaly.anomaly_type);
        outcome.description = Some(anomaly.description.clone());
        outcome
    }

    /// Override the creation timestamp (used when importing historical rows)
    pub fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = created_at;
        self
    }

    /// Whether the row was created on the given calendar day
    pub fn created_on(&self, date: NaiveDate) -> bool {
        self.created_at.date() == date
    }

    /// Whether any of the three transaction references is set
    pub fn has_reference(&self) -> bool {
        self.mpr_transaction_id.is_some()
            || self.internal_transaction_id.is_some()
            || self.bank_transaction_id.is_some()
    }

    /// Check the structural invariants of an outcome row.
    ///
    /// Only ANOMALY rows must carry an anomaly type. RESOLVED rows may keep the type of the
    /// anomaly they acknowledge; every other status must have none.
    pub fn validate(&self) -> ReconResult<()> {
        if !self.has_reference() {
            return Err(ReconError::Validation(format!(
                "Outcome {} references no transaction",
                self.id
            )));
        }

        let expects_anomaly_type = matches!(
            self.status,
            ReconciliationStatus::Anomaly | ReconciliationStatus::Resolved
        );
        match (self.status, self.anomaly_type.is_some()) {
            (ReconciliationStatus::Anomaly, false) => Err(ReconError::Validation(format!(
                "Outcome {} has status ANOMALY but no anomaly type",
                self.id
            ))),
            (status, true) if !expects_anomaly_type => Err(ReconError::Validation(format!(
                "Outcome {} has status {} but carries an anomaly type",
                self.id, status
            ))),
            _ => Ok(()),
        }
    }
}

/// Errors that can occur in the reconciliation system
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Outcome not found: {0}")]
    OutcomeNotFound(Uuid),
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),
}

impl From<config::ConfigError> for ReconError {
    fn from(err: config::ConfigError) -> Self {
        ReconError::Config(err.to_string())
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
