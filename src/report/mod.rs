//! Report module - stage report, exports and console summary

pub mod export;
pub mod stage_report;
pub mod summary;

pub use export::*;
pub use stage_report::*;
pub use summary::*;
