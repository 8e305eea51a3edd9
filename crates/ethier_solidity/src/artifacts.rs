//! Represents the output of the Solidity compiler in the combined JSON format,
//! as produced by `solc --combined-json bin,bin-runtime,srcmap,srcmap-runtime`.
#![allow(missing_docs)]

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The combined JSON output of a compiler run.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedJson {
    /// Keyed by qualified contract name, e.g. `contracts/Counter.sol:Counter`.
    pub contracts: IndexMap<String, CombinedJsonContract>,
    #[serde(default)]
    pub source_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CombinedJson {
    /// Parses the combined JSON output.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// The compiled artifacts of a single contract.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CombinedJsonContract {
    pub bin: Option<String>,
    pub bin_runtime: Option<String>,
    pub srcmap: Option<String>,
    pub srcmap_runtime: Option<String>,
}
