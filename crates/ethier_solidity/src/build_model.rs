//! Defines the source model used to attribute execution to source code.
//!
//! The source model consists of the following:
//! - [`SourceFile`]s and their path, content and [`LineIndex`]
//! - [`Location`]s decoded from a compiler source map, each pointing inside a
//!   source file
//! - [`CompiledContract`]s and their bytecode, [`InstructionIndex`] and
//!   per-instruction locations

use std::sync::Arc;

use crate::bytecode::InstructionIndex;

/// A 1-based line and column pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineColumn {
    /// The 1-based line number.
    pub line: u32,
    /// The 1-based column, counted in bytes.
    pub column: u32,
}

/// An error that occurs when resolving a byte offset to a [`LineColumn`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No source file was registered under the path.
    #[error("unknown source file '{0}'")]
    UnknownSource(String),
    /// The source file has no content to resolve against.
    #[error("source file '{0}' is empty")]
    EmptySource(String),
    /// The offset lies past the end of the source file.
    #[error("offset {offset} is out of range for '{path}' of length {len}")]
    OffsetOutOfRange {
        /// Path of the source file.
        path: String,
        /// The requested byte offset.
        offset: u32,
        /// Length of the source file in bytes.
        len: u32,
    },
}

/// Maps byte offsets within a source file to [`LineColumn`]s.
#[derive(Clone, Debug, Default)]
pub struct LineIndex {
    /// Byte offset at which each line starts. Always starts with 0.
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Builds the index for the provided content.
    pub fn new(content: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                content
                    .match_indices('\n')
                    .map(|(offset, _)| offset as u32 + 1),
            )
            .collect();

        Self {
            line_starts,
            len: content.len() as u32,
        }
    }

    /// Whether the indexed content is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the indexed content in bytes.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns the 1-based line and column of the byte offset. The offset one
    /// past the last byte is valid, as it marks the end of a range.
    pub fn line_column(&self, offset: u32) -> Option<LineColumn> {
        if self.is_empty() || offset > self.len {
            return None;
        }

        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = *self.line_starts.get(line.checked_sub(1)?)?;

        Some(LineColumn {
            line: line as u32,
            column: offset - line_start + 1,
        })
    }
}

/// A source file.
#[derive(Debug)]
pub struct SourceFile {
    /// The path of the source file, as listed in the compiler's source list.
    pub path: Arc<str>,
    /// The content of the source file.
    pub content: String,
    /// Whether the source file is external to the project, in which case it
    /// is excluded from coverage reports.
    pub is_external: bool,

    line_index: LineIndex,
}

impl SourceFile {
    /// Creates a new [`SourceFile`] with the provided path and content.
    pub fn new(path: Arc<str>, content: String, is_external: bool) -> SourceFile {
        let line_index = LineIndex::new(&content);

        SourceFile {
            path,
            content,
            is_external,
            line_index,
        }
    }

    /// Returns the [`LineIndex`] of the source file.
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Resolves the byte offset to a 1-based line and column.
    pub fn resolve(&self, offset: u32) -> Result<LineColumn, ResolveError> {
        if self.line_index.is_empty() {
            return Err(ResolveError::EmptySource(self.path.to_string()));
        }

        self.line_index
            .line_column(offset)
            .ok_or_else(|| ResolveError::OffsetOutOfRange {
                path: self.path.to_string(),
                offset,
                len: self.line_index.len(),
            })
    }
}

/// The type of a jump.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum JumpType {
    /// The instruction jumps into a function.
    #[strum(serialize = "i")]
    IntoFunction,
    /// The instruction returns out of a function.
    #[strum(serialize = "o")]
    OutOfFunction,
    /// The instruction is an ordinary instruction or jump.
    #[default]
    #[strum(serialize = "-")]
    Regular,
}

/// A source location of a single instruction, decoded from a source map.
///
/// The compiler encodes missing information as `-1`; this is represented as
/// `None` in `start`, `length` and `file_index`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// Byte offset of the range in the source file.
    pub start: Option<u32>,
    /// Byte length of the range in the source file.
    pub length: Option<u32>,
    /// Index of the source file in the contract's source list.
    pub file_index: Option<u32>,
    /// The jump type of the instruction.
    pub jump_type: JumpType,
    /// Nesting depth of the modifiers applied at the instruction.
    pub modifier_depth: u32,
    /// Path of the source file, if the file index is part of the source list.
    pub source: Option<Arc<str>>,
    /// Position of `start`, if the source file was registered.
    pub start_position: Option<LineColumn>,
    /// Position of `start + length`, if the source file was registered.
    pub end_position: Option<LineColumn>,
}

impl Location {
    /// Whether the compiler associated a source range with the instruction.
    pub fn is_resolved(&self) -> bool {
        self.start.is_some() && self.length.is_some() && self.file_index.is_some()
    }

    /// The 1-based line on which the location starts.
    pub fn line(&self) -> Option<u32> {
        self.start_position.map(|position| position.line)
    }

    /// The 1-based column at which the location starts.
    pub fn column(&self) -> Option<u32> {
        self.start_position.map(|position| position.column)
    }

    /// The 1-based line on which the location ends.
    pub fn end_line(&self) -> Option<u32> {
        self.end_position.map(|position| position.line)
    }

    /// The 1-based column at which the location ends.
    pub fn end_column(&self) -> Option<u32> {
        self.end_position.map(|position| position.column)
    }
}

/// A compiled contract, resolved against the registered sources.
#[derive(Debug)]
pub struct CompiledContract {
    /// Source path and contract name, e.g. `contracts/Counter.sol:Counter`.
    pub qualified_name: String,
    /// Hex-encoded runtime bytecode, possibly with library placeholders.
    pub runtime_bytecode: String,
    /// Hex-encoded creation bytecode, possibly with library placeholders.
    pub creation_bytecode: String,
    /// Paths of the sources the contract was compiled from. The position of
    /// a path is the file index used in the source map.
    pub source_list: Vec<Arc<str>>,

    instruction_index: InstructionIndex,
    locations: Vec<Location>,
}

impl CompiledContract {
    /// Creates a new [`CompiledContract`] with the provided arguments.
    pub fn new(
        qualified_name: String,
        runtime_bytecode: String,
        creation_bytecode: String,
        source_list: Vec<Arc<str>>,
        instruction_index: InstructionIndex,
        locations: Vec<Location>,
    ) -> CompiledContract {
        CompiledContract {
            qualified_name,
            runtime_bytecode,
            creation_bytecode,
            source_list,
            instruction_index,
            locations,
        }
    }

    /// Returns the [`InstructionIndex`] of the runtime bytecode.
    pub fn instruction_index(&self) -> &InstructionIndex {
        &self.instruction_index
    }

    /// Returns the locations of the runtime bytecode, one per instruction.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Returns the [`Location`] of the instruction at the provided program
    /// counter (PC).
    pub fn location_at(&self, pc: usize) -> Option<&Location> {
        let instruction = self.instruction_index.get(pc)?;
        self.locations.get(instruction as usize)
    }
}
