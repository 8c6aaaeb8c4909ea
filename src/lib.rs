//! Season rating engine: preseason seeding, exactly-once result processing,
//! point-in-time snapshots, predictions and retrospective backfill.

pub mod accuracy;
pub mod backfill;
pub mod calibration;
pub mod config;
pub mod error;
pub mod import;
pub mod model;
pub mod predict;
pub mod preseason;
pub mod processor;
pub mod rating;
pub mod snapshot;
pub mod sos;
pub mod store;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind, Result};
pub use model::{Contest, ContestId, Prediction, RatingSnapshot, Team, TeamId, Tier};
pub use processor::{ApplyOutcome, GameProcessor};
pub use store::Store;
