//! One module per subcommand, plus `common` for the helpers they share.

pub mod analyze;
pub mod common;
pub mod doctor;
pub mod report;
pub mod send;
pub mod validate;
