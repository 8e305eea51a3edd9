use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::Address;
use ethier_solidity::{DeployedContracts, Registry, build_model::Location};
use ethier_tracing::Tracer;

use crate::{
    config::ReportOptions,
    reporter::{self, LcovReport},
};

/// Line hit counts accumulated over any number of transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageState {
    hit_counts: BTreeMap<Arc<str>, BTreeMap<u32, u64>>,
    /// File index and line of the most recently attributed location.
    last_location: Option<(u32, u32)>,
    /// Addresses whose code is executing, innermost last.
    call_stack: Vec<Address>,
}

impl CoverageState {
    /// Creates a state with a zero count for every line that any registered
    /// contract has instructions on, so that unexecuted lines are reported.
    pub fn seeded(registry: &Registry) -> Self {
        let mut hit_counts: BTreeMap<Arc<str>, BTreeMap<u32, u64>> = BTreeMap::new();

        for contract in registry.contracts() {
            for location in contract.locations() {
                if let (Some(source), Some(line)) = (&location.source, location.line()) {
                    hit_counts
                        .entry(source.clone())
                        .or_default()
                        .entry(line)
                        .or_insert(0);
                }
            }
        }

        Self {
            hit_counts,
            ..Self::default()
        }
    }

    /// Attributes one execution step to the location's line. Consecutive
    /// steps on the same line count once. Returns whether a hit was counted.
    pub fn record(&mut self, location: &Location) -> bool {
        let (Some(source), Some(file_index), Some(line)) =
            (&location.source, location.file_index, location.line())
        else {
            return false;
        };

        if self.last_location == Some((file_index, line)) {
            return false;
        }
        self.last_location = Some((file_index, line));

        *self
            .hit_counts
            .entry(source.clone())
            .or_default()
            .entry(line)
            .or_insert(0) += 1;

        true
    }

    /// Returns the hit count of the line, if it is known.
    pub fn hit_count(&self, path: &str, line: u32) -> Option<u64> {
        self.hit_counts.get(path)?.get(&line).copied()
    }

    /// Iterates over the known lines and their hit counts per file, sorted
    /// by path and line.
    pub fn files(&self) -> impl Iterator<Item = (&Arc<str>, &BTreeMap<u32, u64>)> {
        self.hit_counts.iter()
    }

    /// Returns the current call stack, innermost frame last.
    pub fn call_stack(&self) -> &[Address] {
        &self.call_stack
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Status {
    #[default]
    Idle,
    Tracing,
}

/// A [`Tracer`] that attributes executed instructions to source lines.
#[derive(Debug)]
pub struct CoverageCollector {
    deployments: DeployedContracts,
    state: CoverageState,
    status: Status,
}

impl CoverageCollector {
    /// Creates a collector for the contracts of the registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_deployments(DeployedContracts::new(registry))
    }

    /// Creates a collector that continues from existing deployments.
    pub fn with_deployments(deployments: DeployedContracts) -> Self {
        let state = CoverageState::seeded(deployments.registry());

        Self {
            deployments,
            state,
            status: Status::Idle,
        }
    }

    /// Returns the deployments observed so far.
    pub fn deployments(&self) -> &DeployedContracts {
        &self.deployments
    }

    /// Returns the deployments mutably, e.g. to bind addresses by name.
    pub fn deployments_mut(&mut self) -> &mut DeployedContracts {
        &mut self.deployments
    }

    /// Returns the accumulated coverage.
    pub fn state(&self) -> &CoverageState {
        &self.state
    }

    /// Returns the accumulated coverage, replacing it with a zero-seeded
    /// state. Deployments are kept.
    pub fn take_state(&mut self) -> CoverageState {
        let seeded = CoverageState::seeded(self.deployments.registry());
        std::mem::replace(&mut self.state, seeded)
    }

    /// Emits an LCOV report of the accumulated coverage.
    pub fn report(&self, options: impl Into<ReportOptions>) -> LcovReport {
        reporter::emit(self.deployments.registry(), &self.state, options.into())
    }

    fn enter(&mut self, is_create: bool, address: Address, input: &[u8]) {
        if is_create {
            self.deployments.on_contract_created(address, input);
        }

        self.state.call_stack.push(address);
    }
}

impl Tracer for CoverageCollector {
    fn call_start(&mut self, is_create: bool, to: Address, input: &[u8]) {
        self.status = Status::Tracing;
        self.state.call_stack.clear();

        self.enter(is_create, to, input);
    }

    fn step(&mut self, pc: usize, _opcode: u8) {
        if self.status == Status::Idle {
            return;
        }

        let Some(address) = self.state.call_stack.last() else {
            return;
        };

        if let Some(location) = self.deployments.locate(address, pc) {
            self.state.record(location);
        }
    }

    fn call_enter(&mut self, is_create: bool, to: Address, input: &[u8]) {
        self.enter(is_create, to, input);
    }

    fn call_exit(&mut self) {
        if self.state.call_stack.pop().is_none() {
            log::warn!("Call exited without a matching call");
        }
    }

    fn call_end(&mut self) {
        self.state.call_stack.clear();
        self.status = Status::Idle;
    }
}
