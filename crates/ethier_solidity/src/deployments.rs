//! Bindings from deployed addresses to compiled contracts.

use std::sync::Arc;

use alloy_primitives::{Address, map::AddressHashMap};

use crate::{
    build_model::{CompiledContract, Location},
    registry::{Registry, RegistrationError},
};

/// The contracts deployed during one execution session, e.g. on one
/// simulated chain.
#[derive(Debug)]
pub struct DeployedContracts {
    registry: Arc<Registry>,
    bindings: AddressHashMap<Arc<CompiledContract>>,
}

impl DeployedContracts {
    /// Creates an empty set of deployments of the registry's contracts.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            bindings: AddressHashMap::default(),
        }
    }

    /// Returns the registry the deployments are identified against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Identifies the contract created at the address by its creation input
    /// and binds the address to it. Creations of unregistered bytecode leave
    /// the address unbound.
    pub fn on_contract_created(
        &mut self,
        address: Address,
        creation_input: &[u8],
    ) -> Option<Arc<CompiledContract>> {
        let Some(contract) = self.registry.identify(creation_input) else {
            log::debug!("Contract created at {address} is not registered");
            return None;
        };

        self.insert(address, contract.clone());
        Some(contract)
    }

    /// Binds the address to the contract registered under the qualified name.
    pub fn bind(
        &mut self,
        address: Address,
        qualified_name: &str,
    ) -> Result<Arc<CompiledContract>, RegistrationError> {
        let contract = self
            .registry
            .contract(qualified_name)
            .cloned()
            .ok_or_else(|| RegistrationError::UnknownContract(qualified_name.to_string()))?;

        self.insert(address, contract.clone());
        Ok(contract)
    }

    /// Returns the contract bound to the address.
    pub fn contract_at(&self, address: &Address) -> Option<&Arc<CompiledContract>> {
        self.bindings.get(address)
    }

    /// Returns the source location of the instruction at the program counter
    /// of the contract deployed at the address.
    pub fn locate(&self, address: &Address, pc: usize) -> Option<&Location> {
        self.bindings.get(address)?.location_at(pc)
    }

    fn insert(&mut self, address: Address, contract: Arc<CompiledContract>) {
        if let Some(previous) = self.bindings.insert(address, contract) {
            log::debug!("Rebound {address}, previously '{}'", previous.qualified_name);
        }
    }
}
