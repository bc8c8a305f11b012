//! Marine Core - pollution classification for marine report images
//!
//! Architecture:
//! - `logic/water`: cheap color-statistics water gate
//! - `logic/detector`: dual detector (ONNX models, heuristic fallback)
//! - `logic/decision`: policy-driven decision engine
//! - `logic/acquisition`: gateway-aware image fetch with disk cache
//! - `logic/store`: persisted predictions keyed by report id
//! - `api`: `MarineService`, the façade over all of the above

pub mod api;
pub mod constants;
pub mod error;
pub mod logic;

pub use api::{BatchReport, MarineService, PredictionResult};
pub use error::{MarineError, MarineResult};
pub use logic::config::ServiceConfig;
pub use logic::decision::{Label, PolicyName};
