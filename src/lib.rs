//! dcmrelay: bulk DICOM C-STORE transfer orchestration and archive
//! reconciliation.
//!
//! This crate wires the per-stage workflow crates (`dcmrelay-analyze`,
//! `dcmrelay-send`, `dcmrelay-validate`, `dcmrelay-report`) behind a single
//! `clap`-based CLI. The workflow crates are the stable, programmatically
//! driveable core (spec §1); this crate is the one external collaborator
//! the core specifies an interface for but does not implement itself.

pub mod cli;

pub use dcmrelay_config::Config;
pub use dcmrelay_util::ExitCode;
