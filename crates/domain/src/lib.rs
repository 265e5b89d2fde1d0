//! Domain-level building blocks shared across the API and monitor crates:
//! the composite key layout, the views assembled from it, the store
//! capabilities every component is handed, and the settings resolver.

pub mod clock;
pub mod config;
pub mod keys;
pub mod model;
pub mod services;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model::*;
pub use storage::*;
