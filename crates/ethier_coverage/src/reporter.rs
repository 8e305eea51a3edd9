use std::{fmt, sync::Arc};

use derive_more::Debug;
use dyn_clone::DynClone;
use ethier_solidity::Registry;

use crate::{CoverageCollector, CoverageState, config::ReportOptions};

/// The coverage record of one source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Path of the source file.
    pub path: Arc<str>,
    /// Known lines and their hit counts, sorted by line.
    pub lines: Vec<(u32, u64)>,
}

impl FileRecord {
    /// Number of known lines that were executed at least once.
    pub fn lines_hit(&self) -> usize {
        self.lines.iter().filter(|(_, hits)| *hits > 0).count()
    }

    /// Number of known lines.
    pub fn lines_found(&self) -> usize {
        self.lines.len()
    }
}

/// A line coverage report in the LCOV trace file format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LcovReport {
    /// Records sorted by path.
    pub records: Vec<FileRecord>,
}

impl LcovReport {
    /// Returns the report as LCOV trace file contents.
    pub fn into_bytes(self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for LcovReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "SF:{}", record.path)?;
            // Function coverage is not tracked
            writeln!(f, "FNF:0")?;
            writeln!(f, "FNH:0")?;
            for (line, hits) in &record.lines {
                writeln!(f, "DA:{line},{hits}")?;
            }
            writeln!(f, "LH:{}", record.lines_hit())?;
            writeln!(f, "LF:{}", record.lines_found())?;
            writeln!(f, "end_of_record")?;
        }

        Ok(())
    }
}

/// Builds the report of the coverage state. Files without known lines are
/// omitted, as are external files unless the options include them.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn emit(registry: &Registry, state: &CoverageState, options: ReportOptions) -> LcovReport {
    let records = state
        .files()
        .filter(|(_, lines)| !lines.is_empty())
        .filter(|(path, _)| {
            registry.source(path).is_some_and(|source| {
                options.include_sources.should_include(source.is_external)
            })
        })
        .map(|(path, lines)| FileRecord {
            path: path.clone(),
            lines: lines.iter().map(|(line, hits)| (*line, *hits)).collect(),
        })
        .collect();

    LcovReport { records }
}

pub trait SyncOnCollectedCoverageCallback:
    Fn(LcovReport) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + DynClone + Send + Sync
{
}

impl<F> SyncOnCollectedCoverageCallback for F where
    F: Fn(LcovReport) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
        + DynClone
        + Send
        + Sync
{
}

dyn_clone::clone_trait_object!(SyncOnCollectedCoverageCallback);

/// A reporter for code coverage that collects line hits and reports them to
/// a callback.
#[derive(Debug)]
pub struct CodeCoverageReporter {
    pub collector: CoverageCollector,
    pub options: ReportOptions,
    #[debug(skip)]
    callback: Box<dyn SyncOnCollectedCoverageCallback>,
}

impl CodeCoverageReporter {
    /// Creates a new instance with the provided collector and callback.
    pub fn new(
        collector: CoverageCollector,
        options: ReportOptions,
        callback: Box<dyn SyncOnCollectedCoverageCallback>,
    ) -> Self {
        Self {
            collector,
            options,
            callback,
        }
    }

    /// Reports the collected coverage to the callback.
    pub fn collect_and_report(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let report = self.collector.report(self.options);
        (self.callback)(report)
    }

    /// Flushes the collected coverage to the callback, replacing the current
    /// coverage with a zero-seeded state.
    pub fn flush_and_report(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let state = self.collector.take_state();
        let report = emit(
            self.collector.deployments().registry(),
            &state,
            self.options,
        );
        (self.callback)(report)
    }
}
