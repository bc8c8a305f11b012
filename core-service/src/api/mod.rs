//! API Module
//!
//! Structure:
//! - service.rs: `MarineService`, every operation collaborators call
//! - types.rs: serializable results (prediction, batch report, status)

pub mod service;
pub mod types;

pub use service::MarineService;
pub use types::{BatchItem, BatchReport, PredictionResult, ServiceStatus};
