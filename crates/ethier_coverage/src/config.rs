//! Configuration of coverage reports.

/// Configuration that controls which source files are included in coverage
/// reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IncludeSources {
    /// Only sources that are part of the project are included.
    #[default]
    Internal,
    /// External sources, such as dependencies, are included as well.
    All,
}

impl IncludeSources {
    /// Whether a source file should be included based on this configuration
    /// and whether the file is external.
    pub fn should_include(&self, is_external: bool) -> bool {
        match self {
            IncludeSources::Internal => !is_external,
            IncludeSources::All => true,
        }
    }
}

/// Options for emitting a coverage report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Which source files to report.
    pub include_sources: IncludeSources,
}

impl From<IncludeSources> for ReportOptions {
    fn from(include_sources: IncludeSources) -> Self {
        Self { include_sources }
    }
}
