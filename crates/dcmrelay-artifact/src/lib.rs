//! Run-directory artifact layout, hand-rolled CSV I/O, telemetry sink, and
//! IUID-map bookkeeping shared by every dcmrelay workflow (spec §4.2-4.3,
//! §11).

pub mod checkpoint;
pub mod csv_io;
pub mod csv_record;
pub mod error;
pub mod events;
pub mod iuid_map;
pub mod layout;

pub use csv_record::CsvRecord;
pub use error::ArtifactError;
