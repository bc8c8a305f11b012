//! Logic Module - classification engines and shared resources
//!
//! - `sample` - decoded image + color statistics
//! - `water` - water gate (standard rules, strict saturation variant)
//! - `detector` - plastic/oil probabilities
//! - `decision` - labels from probabilities under a named policy
//! - `acquisition` - fetch with retries, gateway fallback, disk cache
//! - `store` - JSON-backed prediction store

pub mod acquisition;
pub mod config;
pub mod decision;
pub mod detector;
pub mod sample;
pub mod storage;
pub mod store;
pub mod water;
