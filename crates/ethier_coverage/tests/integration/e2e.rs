use std::{fs, path::PathBuf, sync::Arc};

use alloy_primitives::{Address, address, hex};
use ethier_coverage::{CoverageCollector, IncludeSources, ReportOptions};
use ethier_solidity::{Registry, artifacts::CombinedJson, library_utils};
use ethier_tracing::{Trace, TraceRecorder};

const EXPECTED_COVERAGE: &str = include_str!("../fixtures/coverage.lcov");

const COUNTER: &str = "contracts/Counter.sol:Counter";
const MATH_LIB: &str = "contracts/MathLib.sol:MathLib";

const LIBRARY_ADDRESS: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
const COUNTER_ADDRESS: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_registry(external_sources: &[&str]) -> anyhow::Result<Arc<Registry>> {
    let fixtures = fixtures_dir();
    let mut registry = Registry::new();

    for path in [
        "contracts/Counter.sol",
        "contracts/MathLib.sol",
        "contracts/Unused.sol",
    ] {
        let content = fs::read_to_string(fixtures.join(path))?;
        registry.register_source(path, content, external_sources.contains(&path));
    }

    let combined = CombinedJson::from_json_str(&fs::read_to_string(
        fixtures.join("combined.json"),
    )?)?;
    let registered = registry.register_combined_json(&combined)?;
    assert_eq!(registered.len(), 2);

    Ok(Arc::new(registry))
}

fn load_trace() -> anyhow::Result<Trace> {
    let json = fs::read_to_string(fixtures_dir().join("trace.json"))?;
    Ok(serde_json::from_str(&json)?)
}

#[test]
fn trace_produces_expected_lcov() -> anyhow::Result<()> {
    let mut collector = CoverageCollector::new(load_registry(&[])?);
    load_trace()?.replay(&mut collector);

    let deployments = collector.deployments();
    assert_eq!(
        deployments
            .contract_at(&LIBRARY_ADDRESS)
            .map(|contract| contract.qualified_name.as_str()),
        Some(MATH_LIB)
    );
    assert_eq!(
        deployments
            .contract_at(&COUNTER_ADDRESS)
            .map(|contract| contract.qualified_name.as_str()),
        Some(COUNTER)
    );

    similar_asserts::assert_eq!(
        collector.report(ReportOptions::default()).to_string(),
        EXPECTED_COVERAGE
    );

    Ok(())
}

#[test]
fn recorded_trace_replays_identically() -> anyhow::Result<()> {
    let mut recorder = TraceRecorder::default();
    load_trace()?.replay(&mut recorder);

    let mut collector = CoverageCollector::new(load_registry(&[])?);
    recorder.into_trace().replay(&mut collector);

    similar_asserts::assert_eq!(
        String::from_utf8(collector.report(ReportOptions::default()).into_bytes())?,
        EXPECTED_COVERAGE
    );

    Ok(())
}

#[test]
fn external_sources_are_excluded() -> anyhow::Result<()> {
    let mut collector = CoverageCollector::new(load_registry(&["contracts/MathLib.sol"])?);
    load_trace()?.replay(&mut collector);

    let internal = collector.report(IncludeSources::Internal).to_string();
    assert!(internal.contains("SF:contracts/Counter.sol\n"));
    assert!(!internal.contains("SF:contracts/MathLib.sol\n"));

    let all = collector.report(IncludeSources::All).to_string();
    similar_asserts::assert_eq!(all, EXPECTED_COVERAGE);

    Ok(())
}

#[test]
fn unexecuted_lines_are_reported_as_zero() -> anyhow::Result<()> {
    let collector = CoverageCollector::new(load_registry(&[])?);
    let report = collector.report(ReportOptions::default());

    let paths = report
        .records
        .iter()
        .map(|record| record.path.as_ref())
        .collect::<Vec<_>>();
    assert_eq!(paths, ["contracts/Counter.sol", "contracts/MathLib.sol"]);

    for record in &report.records {
        assert_eq!(record.lines_hit(), 0);
        assert!(record.lines.iter().all(|(_, hits)| *hits == 0));
    }

    let counter_lines = report.records[0]
        .lines
        .iter()
        .map(|(line, _)| *line)
        .collect::<Vec<_>>();
    assert_eq!(counter_lines, [6, 9, 10, 13, 14, 15, 18, 19]);

    Ok(())
}

#[test]
fn linked_library_deployments_are_identified() -> anyhow::Result<()> {
    let registry = load_registry(&[])?;
    let counter = registry.contract(COUNTER).expect("counter is registered");
    assert!(library_utils::has_library_placeholders(
        &counter.creation_bytecode
    ));

    for library in [
        LIBRARY_ADDRESS,
        address!("0x000000000000000000000000000000000000dEaD"),
    ] {
        let linked = library_utils::link_library_placeholders(&counter.creation_bytecode, &library);
        let identified = registry
            .identify(&hex::decode(linked)?)
            .expect("linked counter is identified");
        assert_eq!(identified.qualified_name, COUNTER);
    }

    let math_lib = registry.contract(MATH_LIB).expect("library is registered");
    let mut with_constructor_args = hex::decode(&math_lib.creation_bytecode)?;
    assert!(registry.identify(&with_constructor_args).is_some());
    with_constructor_args.extend_from_slice(&[0u8; 32]);
    assert!(registry.identify(&with_constructor_args).is_none());

    Ok(())
}

#[test]
fn bound_contracts_are_located_by_address() -> anyhow::Result<()> {
    let registry = load_registry(&[])?;
    let mut collector = CoverageCollector::new(registry.clone());
    collector.deployments_mut().bind(COUNTER_ADDRESS, COUNTER)?;

    let bound = collector
        .deployments()
        .locate(&COUNTER_ADDRESS, 0)
        .expect("first instruction has a location");
    let by_name = registry
        .locate_by_name(COUNTER, 0)
        .expect("first instruction has a location");
    assert_eq!(bound, by_name);
    assert_eq!(bound.source.as_deref(), Some("contracts/Counter.sol"));
    assert_eq!(bound.line(), Some(6));
    assert_eq!(bound.end_line(), Some(21));

    Ok(())
}
