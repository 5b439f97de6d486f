pub mod alerts;
pub mod calendar;
pub mod error;
pub mod fleet;
pub mod hours;
pub mod ledger;
pub mod model;
pub mod positions;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use crate::error::{EngineError, StoreError};
pub use crate::fleet::{Fleet, FleetSettings};
