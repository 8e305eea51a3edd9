//! Registry of the source files and compiled contracts of a project.
//!
//! The registry is populated once, before execution is traced, and is
//! read-only afterwards. It can therefore be shared between tracing sessions
//! behind an [`Arc`].

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    artifacts::CombinedJson,
    build_model::{CompiledContract, LineColumn, Location, ResolveError, SourceFile},
    bytecode::{BytecodeError, BytecodeKind, InstructionIndex},
    contracts_identifier::{ContractMatcher, ContractsIdentifier, MatcherError},
    library_utils,
    source_map::{self, SourceMapError},
};

/// An error that occurs when registering a contract.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The runtime or creation bytecode could not be decoded.
    #[error("failed to decode bytecode of '{contract}'")]
    Bytecode {
        /// Qualified name of the contract.
        contract: String,
        /// The decoding error.
        source: BytecodeError,
    },
    /// The source map could not be decompressed.
    #[error("failed to decompress source map of '{contract}'")]
    SourceMap {
        /// Qualified name of the contract.
        contract: String,
        /// The decompression error.
        source: SourceMapError,
    },
    /// The wildcard pattern for the creation bytecode could not be built.
    #[error("failed to build bytecode pattern of '{contract}'")]
    InvalidPattern {
        /// Qualified name of the contract.
        contract: String,
        /// The regex error.
        source: regex::Error,
    },
    /// A compiler output entry lacks a field required for registration.
    #[error("'{contract}' is missing its {field}")]
    MissingBytecode {
        /// Qualified name of the contract.
        contract: String,
        /// Name of the missing field.
        field: &'static str,
    },
    /// No contract is registered under the name.
    #[error("unknown contract '{0}'")]
    UnknownContract(String),
}

/// Source files and compiled contracts, keyed by path and qualified name
/// respectively.
#[derive(Debug, Default)]
pub struct Registry {
    sources: IndexMap<Arc<str>, SourceFile>,
    contracts: IndexMap<String, Arc<CompiledContract>>,
    identifier: ContractsIdentifier,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source file. Contracts compiled from the file only carry
    /// line information if the file is registered before them.
    pub fn register_source(&mut self, path: &str, content: impl Into<String>, is_external: bool) {
        let path: Arc<str> = Arc::from(path);
        let file = SourceFile::new(path.clone(), content.into(), is_external);

        if let Some(previous) = self.sources.insert(path, file) {
            log::debug!("Replaced source file '{}'", previous.path);
        }
    }

    /// Resolves a byte offset in a registered source file to its 1-based line
    /// and column.
    pub fn resolve(&self, path: &str, offset: u32) -> Result<LineColumn, ResolveError> {
        self.sources
            .get(path)
            .ok_or_else(|| ResolveError::UnknownSource(path.to_string()))?
            .resolve(offset)
    }

    /// Registers a compiled contract.
    ///
    /// The runtime bytecode is indexed by instruction and the source map is
    /// decompressed and resolved against the registered sources. Deployments
    /// of the creation bytecode are identified by its hash or, if it links
    /// libraries, by a pattern that accepts any linked address.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(contract = qualified_name)))]
    pub fn register_contract(
        &mut self,
        qualified_name: &str,
        runtime_bytecode: &str,
        creation_bytecode: &str,
        source_map: &str,
        source_list: &[String],
    ) -> Result<Arc<CompiledContract>, RegistrationError> {
        let (matcher, contract) = self.compile_contract(
            qualified_name,
            runtime_bytecode,
            creation_bytecode,
            source_map,
            source_list,
        )?;

        Ok(self.insert_contract(matcher, contract))
    }

    fn compile_contract(
        &self,
        qualified_name: &str,
        runtime_bytecode: &str,
        creation_bytecode: &str,
        source_map: &str,
        source_list: &[String],
    ) -> Result<(ContractMatcher, Arc<CompiledContract>), RegistrationError> {
        let runtime_code = library_utils::decode_bytecode(runtime_bytecode).map_err(|source| {
            RegistrationError::Bytecode {
                contract: qualified_name.to_string(),
                source: BytecodeError::InvalidHex {
                    kind: BytecodeKind::Runtime,
                    source,
                },
            }
        })?;
        let instruction_index = InstructionIndex::from_bytecode(&runtime_code);

        let mut locations =
            source_map::decompress(source_map).map_err(|source| RegistrationError::SourceMap {
                contract: qualified_name.to_string(),
                source,
            })?;

        if locations.len() > instruction_index.instruction_count() {
            log::warn!(
                "Source map of '{qualified_name}' has {} entries for {} instructions",
                locations.len(),
                instruction_index.instruction_count()
            );
        }

        let source_list = source_list
            .iter()
            .map(|path| self.intern_path(path))
            .collect::<Vec<_>>();

        for path in &source_list {
            match self.sources.get(path) {
                None => log::debug!(
                    "Source file '{path}' of '{qualified_name}' is not registered; its locations have no lines"
                ),
                Some(file) if file.line_index().is_empty() => {
                    log::debug!("Source file '{path}' of '{qualified_name}' is empty");
                }
                Some(_) => {}
            }
        }

        for location in &mut locations {
            self.resolve_location(location, &source_list);
        }

        let matcher = ContractMatcher::new(creation_bytecode).map_err(|error| match error {
            MatcherError::InvalidBytecode(source) => RegistrationError::Bytecode {
                contract: qualified_name.to_string(),
                source: BytecodeError::InvalidHex {
                    kind: BytecodeKind::Creation,
                    source,
                },
            },
            MatcherError::InvalidPattern(source) => RegistrationError::InvalidPattern {
                contract: qualified_name.to_string(),
                source,
            },
        })?;

        let contract = Arc::new(CompiledContract::new(
            qualified_name.to_string(),
            runtime_bytecode.to_string(),
            creation_bytecode.to_string(),
            source_list,
            instruction_index,
            locations,
        ));

        Ok((matcher, contract))
    }

    /// Inserts a compiled contract, replacing any contract of the same name
    /// together with its matcher.
    fn insert_contract(
        &mut self,
        matcher: ContractMatcher,
        contract: Arc<CompiledContract>,
    ) -> Arc<CompiledContract> {
        let qualified_name = &contract.qualified_name;

        if let Some(previous) = self.contracts.get(qualified_name) {
            log::debug!("Replacing contract '{qualified_name}'");
            self.identifier.remove(previous);
        }

        if let Some(previous) = self.identifier.add(matcher, contract.clone()) {
            log::warn!(
                "Creation bytecode of '{qualified_name}' is indistinguishable from '{}', which it replaces",
                previous.qualified_name
            );
        }

        self.contracts
            .insert(qualified_name.clone(), contract.clone());

        contract
    }

    /// Registers every contract of a combined JSON compiler output. Entries
    /// without runtime bytecode, such as interfaces and abstract contracts,
    /// are skipped. Every entry is compiled before any is registered, so on
    /// error the registry is left unchanged.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn register_combined_json(
        &mut self,
        combined: &CombinedJson,
    ) -> Result<Vec<Arc<CompiledContract>>, RegistrationError> {
        let mut compiled = Vec::with_capacity(combined.contracts.len());

        for (name, contract) in &combined.contracts {
            let runtime_bytecode = contract.bin_runtime.as_deref().unwrap_or_default();
            if runtime_bytecode.is_empty() {
                log::debug!("Skipping '{name}' as it has no runtime bytecode");
                continue;
            }

            let missing = |field| RegistrationError::MissingBytecode {
                contract: name.clone(),
                field,
            };
            let creation_bytecode = contract.bin.as_deref().ok_or_else(|| missing("bin"))?;
            let source_map = contract
                .srcmap_runtime
                .as_deref()
                .ok_or_else(|| missing("srcmap-runtime"))?;

            compiled.push(self.compile_contract(
                name,
                runtime_bytecode,
                creation_bytecode,
                source_map,
                &combined.source_list,
            )?);
        }

        Ok(compiled
            .into_iter()
            .map(|(matcher, contract)| self.insert_contract(matcher, contract))
            .collect())
    }

    /// Returns the source file registered under the path.
    pub fn source(&self, path: &str) -> Option<&SourceFile> {
        self.sources.get(path)
    }

    /// Iterates over the registered source files in registration order.
    pub fn sources(&self) -> impl Iterator<Item = &SourceFile> {
        self.sources.values()
    }

    /// Returns the contract registered under the qualified name.
    pub fn contract(&self, qualified_name: &str) -> Option<&Arc<CompiledContract>> {
        self.contracts.get(qualified_name)
    }

    /// Iterates over the registered contracts in registration order.
    pub fn contracts(&self) -> impl Iterator<Item = &Arc<CompiledContract>> {
        self.contracts.values()
    }

    /// Identifies the contract deployed by the creation input.
    pub fn identify(&self, creation_input: &[u8]) -> Option<Arc<CompiledContract>> {
        self.identifier.identify(creation_input)
    }

    /// Returns the location of the instruction at the program counter of a
    /// registered contract's runtime bytecode.
    pub fn locate_by_name(&self, qualified_name: &str, pc: usize) -> Option<&Location> {
        self.contracts.get(qualified_name)?.location_at(pc)
    }

    /// Returns the registered path's shared string, so that locations and
    /// source files point to the same allocation.
    fn intern_path(&self, path: &str) -> Arc<str> {
        self.sources
            .get_key_value(path)
            .map_or_else(|| Arc::from(path), |(path, _)| path.clone())
    }

    fn resolve_location(&self, location: &mut Location, source_list: &[Arc<str>]) {
        let Some(path) = location
            .file_index
            .and_then(|file_index| source_list.get(file_index as usize))
        else {
            return;
        };
        location.source = Some(path.clone());

        let (Some(file), Some(start), Some(length)) =
            (self.sources.get(path), location.start, location.length)
        else {
            return;
        };
        if file.line_index().is_empty() {
            return;
        }

        match (file.resolve(start), file.resolve(start.saturating_add(length))) {
            (Ok(start), Ok(end)) => {
                location.start_position = Some(start);
                location.end_position = Some(end);
            }
            (Err(error), _) | (_, Err(error)) => log::warn!("{error}"),
        }
    }
}
