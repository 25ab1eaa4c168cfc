//! REST client for the DICOM archive's QIDO-RS instance index.

mod client;
mod error;
mod types;

pub use client::RestClient;
pub use error::RestError;
pub use types::{InstanceQuery, ReportFields};
