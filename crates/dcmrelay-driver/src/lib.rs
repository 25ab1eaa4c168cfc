//! Toolkit location and dcm4che/DCMTK command/output drivers.
//!
//! This crate is the one seam the rest of the workspace crosses to talk to
//! either toolkit family: [`Driver`] hides `storescu`/`echoscu`/`dcmdump`
//! invocation and output classification behind a single trait, so
//! `dcmrelay-send`/`dcmrelay-validate` never branch on `Toolkit` themselves.

pub mod classify;
pub mod cmdlen;
pub mod driver;
pub mod error;
pub mod java;
pub mod locate;
pub mod toolf;
pub mod toolt;

pub use classify::looks_like_dicom_payload_file;
pub use driver::{BatchCorrelation, Driver, ExtractedMetadata, FileOutcome, ParsedSendOutput};
pub use error::DriverError;
pub use locate::find_toolkit_bin;
pub use toolf::{DCM4CHE_CRITICAL_JAR_MARKERS, ToolFDriver, check_critical_jars};
pub use toolt::ToolTDriver;
