#![warn(missing_docs)]

//! Attribution of EVM execution to the Solidity sources of compiled
//! contracts.

pub mod artifacts;
pub mod build_model;
pub mod bytecode;
pub mod contracts_identifier;
pub mod deployments;
pub mod library_utils;
pub mod registry;
pub mod source_map;

pub use self::{
    deployments::DeployedContracts,
    registry::{Registry, RegistrationError},
};
