//! # Recon Core
//!
//! A settlement reconciliation library that links channel settlement reports (MPR),
//! internal transaction logs and bank statements, and flags what does not line up.
//!
//! ## Features
//!
//! - **Layered matching**: Exact reference matching followed by amount/date tolerance matching
//! - **Bank refinement**: MPR/internal pairs confirmed against bank credits by UTR or amount
//! - **Anomaly detection**: Missing counterparts and amount mismatches on matched pairs
//! - **Day-scoped re-runs**: Results for a calendar day are cleared and rebuilt
//! - **Reporting**: Status summaries and anomaly breakdowns over persisted outcomes
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use recon_core::{ReconConfig, ReconciliationEngine};
//! use recon_core::utils::MemoryStorage;
//!
//! // Any ReconciliationStorage implementation works; MemoryStorage is bundled for tests.
//! let storage = MemoryStorage::new();
//! let engine = ReconciliationEngine::new(storage, ReconConfig::default());
//! // engine.run(None).await?;
//! # let _ = engine;
//! ```

pub mod reconciliation;
pub mod settings;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use reconciliation::*;
pub use settings::*;
pub use traits::*;
pub use types::*;
