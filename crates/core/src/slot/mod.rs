//! Upload slot model.
//!
//! A slot is the orchestrator's unit of work for one selected file. Only the
//! orchestrator mutates slots; everything else sees cloned snapshots.

mod model;
mod seed;
mod types;

pub use model::UploadSlot;
pub use seed::{load_previous_uploads, parse_previous_uploads, SeedError};
pub use types::*;
