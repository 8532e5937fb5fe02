//! Server-side transcoding status.
//!
//! `StatusClient` performs one batched query for many video ids;
//! `StatusPoller` decides when that query runs and which slots it covers.

mod http;
mod poller;
mod traits;
mod types;

pub use http::HttpStatusClient;
pub use poller::{StatusPoller, StatusUpdate};
pub use traits::StatusClient;
pub use types::*;
