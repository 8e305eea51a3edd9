//! Line coverage of Solidity sources, collected from execution traces.

mod collector;
pub mod config;
/// Types for code coverage reporting.
pub mod reporter;

pub use self::{
    collector::{CoverageCollector, CoverageState},
    config::{IncludeSources, ReportOptions},
    reporter::{CodeCoverageReporter, LcovReport},
};
