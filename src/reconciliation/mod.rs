//! Three-way reconciliation of MPR, internal and bank transactions
//!
//! The [`Matcher`] links records pairwise, the [`AnomalyDetector`] classifies what is
//! left over or inconsistent, and the [`ReconciliationEngine`] sequences both and
//! persists one outcome row per linkage or anomaly.

pub mod anomaly;
pub mod engine;
pub mod matcher;
pub mod report;

pub use anomaly::*;
pub use engine::*;
pub use matcher::*;
pub use report::*;
