//! Identifies which registered contract a creation transaction deploys.
//!
//! Contracts without library dependencies are matched by the hash of their
//! creation bytecode. Contracts that link libraries can only be known up to
//! the linked addresses, so they are matched by a pattern with a wildcard in
//! place of every library placeholder.

use std::sync::Arc;

use alloy_primitives::{B256, hex, keccak256, map::B256HashMap};
use indexmap::IndexMap;
use regex::Regex;

use crate::{build_model::CompiledContract, library_utils};

/// An error that occurs when building a [`ContractMatcher`].
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    /// The creation bytecode is not valid hex.
    #[error(transparent)]
    InvalidBytecode(#[from] hex::FromHexError),
    /// The wildcard pattern could not be compiled.
    #[error(transparent)]
    InvalidPattern(#[from] regex::Error),
}

/// Describes how to recognize the creation bytecode of a contract.
#[derive(Clone, Debug)]
pub enum ContractMatcher {
    /// Keccak-256 hash of the fully linked creation bytecode.
    ExactHash(B256),
    /// Pattern over the hex encoding of the creation bytecode, with a
    /// wildcard per library placeholder.
    WildcardPattern(Regex),
}

impl ContractMatcher {
    /// Builds the matcher for the hex-encoded creation bytecode.
    pub fn new(creation_bytecode: &str) -> Result<Self, MatcherError> {
        if library_utils::has_library_placeholders(creation_bytecode) {
            let pattern = library_utils::wildcard_pattern(creation_bytecode)?;
            Ok(Self::WildcardPattern(pattern))
        } else {
            let code = library_utils::decode_bytecode(creation_bytecode)?;
            Ok(Self::ExactHash(keccak256(code)))
        }
    }
}

/// Lookup tables from creation bytecode to compiled contract.
#[derive(Debug, Default)]
pub struct ContractsIdentifier {
    by_hash: B256HashMap<Arc<CompiledContract>>,
    /// Keyed by pattern source, tried in insertion order.
    by_pattern: IndexMap<String, (Regex, Arc<CompiledContract>)>,
}

impl ContractsIdentifier {
    /// Adds a contract under the provided matcher. Returns the contract that
    /// was previously registered under an identical matcher, if any.
    pub fn add(
        &mut self,
        matcher: ContractMatcher,
        contract: Arc<CompiledContract>,
    ) -> Option<Arc<CompiledContract>> {
        match matcher {
            ContractMatcher::ExactHash(hash) => self.by_hash.insert(hash, contract),
            ContractMatcher::WildcardPattern(pattern) => self
                .by_pattern
                .insert(pattern.as_str().to_string(), (pattern, contract))
                .map(|(_pattern, previous)| previous),
        }
    }

    /// Removes every matcher that resolves to the contract.
    pub fn remove(&mut self, contract: &Arc<CompiledContract>) {
        self.by_hash
            .retain(|_hash, registered| !Arc::ptr_eq(registered, contract));
        self.by_pattern
            .retain(|_pattern, (_, registered)| !Arc::ptr_eq(registered, contract));
    }

    /// Identifies the contract deployed by the creation input. Exact hashes
    /// take precedence over patterns.
    pub fn identify(&self, input: &[u8]) -> Option<Arc<CompiledContract>> {
        if let Some(contract) = self.by_hash.get(&keccak256(input)) {
            return Some(contract.clone());
        }

        if self.by_pattern.is_empty() {
            return None;
        }

        let encoded = hex::encode(input);
        self.by_pattern
            .values()
            .find(|(pattern, _)| pattern.is_match(&encoded))
            .map(|(_, contract)| contract.clone())
    }

    /// Number of registered matchers.
    pub fn len(&self) -> usize {
        self.by_hash.len() + self.by_pattern.len()
    }

    /// Whether no matchers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
