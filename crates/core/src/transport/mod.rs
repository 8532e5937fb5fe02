//! Upload transport abstraction.
//!
//! This module provides an `UploadTransport` trait for streaming one file to
//! the submission endpoint, reporting byte progress and honouring
//! cancellation.

mod http;
mod traits;
mod types;

pub use http::HttpUploadTransport;
pub use traits::UploadTransport;
pub use types::*;
