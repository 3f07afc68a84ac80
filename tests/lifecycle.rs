//! End-to-end lifecycle tests against the in-memory runtime, plus smoke
//! tests of the installed binary's immediate-exit paths.

use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use clap::Parser;
use color_eyre::Result;
use tempfile::NamedTempFile;

use emunet::defaults::{reconcile, ControllerProbe};
use emunet::options::{Args, Options};
use emunet::orchestrator::Orchestrator;
use emunet::overrides;
use emunet::registry::{ComponentKind, RegistryStore};
use emunet::runtime::memory::{EventLog, InMemoryFactory};
use emunet::runtime::NetworkRuntime;
use emunet::selection::SelectionSpec;
use emunet::session::Session;

struct AlwaysAvailable;

impl ControllerProbe for AlwaysAvailable {
    fn default_available(&self) -> bool {
        true
    }
}

struct NeverAvailable;

impl ControllerProbe for NeverAvailable {
    fn default_available(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct SilentSession;

impl Session for SilentSession {
    fn run_script(&mut self, _net: &mut dyn NetworkRuntime, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn interact(&mut self, _net: &mut dyn NetworkRuntime) -> Result<()> {
        Ok(())
    }
}

fn orchestrate(argv: &[&str], store: &mut RegistryStore) -> (Result<()>, EventLog) {
    let mut full = vec!["emunet"];
    full.extend_from_slice(argv);
    let mut opts: Options = Args::parse_from(full).into();

    if let Some(custom) = opts.custom.clone() {
        overrides::load_custom(store, &custom).unwrap();
    }
    opts.apply_globals(store.globals());

    let components = reconcile(&mut opts, store, &AlwaysAvailable).unwrap();
    let factory = InMemoryFactory::new();
    let events = factory.events();
    let orchestrator = Orchestrator::new(
        opts,
        components,
        store.globals().clone(),
        Box::new(factory),
        Box::new(SilentSession),
    );
    (orchestrator.run(), events)
}

#[test]
fn pingall_on_minimal_topology_runs_and_stops() {
    let elapsed_from = Instant::now();
    let mut store = RegistryStore::with_defaults();
    let (result, events) = orchestrate(&["--test", "pingall"], &mut store);
    result.unwrap();

    let log = events.lock().unwrap();
    let start = log.iter().position(|e| e == "start").unwrap();
    let ping = log.iter().position(|e| e == "op ping_all").unwrap();
    let stop = log.iter().position(|e| e == "stop").unwrap();
    assert!(start < ping && ping < stop);
    assert_eq!(log.iter().filter(|e| *e == "stop").count(), 1);

    assert!(elapsed_from.elapsed().as_secs_f64() >= 0.0);
}

#[test]
fn override_file_feeds_the_whole_pipeline() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "switches:").unwrap();
    writeln!(file, "  weird:").unwrap();
    writeln!(file, "    base: ovs").unwrap();

    let custom = file.path().to_str().unwrap().to_string();
    let mut store = RegistryStore::with_defaults();
    let (result, events) = orchestrate(
        &[
            "--custom",
            &custom,
            "--switch",
            "weird,x=1",
            "--test",
            "none",
        ],
        &mut store,
    );
    result.unwrap();

    let instance = store
        .instantiate(ComponentKind::Switch, &SelectionSpec::parse("weird,x=1"))
        .unwrap();
    assert_eq!(instance.implementation, "ovs");
    assert_eq!(instance.keyword.get("x"), Some(&"1".to_string()));

    let log = events.lock().unwrap();
    assert!(log.iter().any(|e| e == "stop"));
}

#[test]
fn global_substitution_reaches_the_options() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "listenport: 6653").unwrap();

    let custom = file.path().to_str().unwrap().to_string();
    let mut full = vec!["emunet".to_string(), "--custom".to_string(), custom];
    full.push("--test".to_string());
    full.push("none".to_string());
    let args = Args::parse_from(&full);

    let mut opts: Options = args.into();
    let mut store = RegistryStore::with_defaults();
    overrides::load_custom(&mut store, &opts.custom.clone().unwrap()).unwrap();
    opts.apply_globals(store.globals());

    assert_eq!(opts.listen_port, 6653);
}

#[test]
fn reconciliation_without_controller_defaults_to_bridges() {
    let mut opts: Options = Args::parse_from(["emunet"]).into();
    let mut store = RegistryStore::with_defaults();
    let components = reconcile(&mut opts, &mut store, &NeverAvailable).unwrap();
    assert_eq!(components.switch.implementation, "ovsbr");
    assert_eq!(components.controllers[0].name, "none");
}

#[test]
fn wireless_end_to_end_uses_wireless_variants() {
    let mut store = RegistryStore::with_defaults();
    let (result, events) = orchestrate(
        &["--wifi", "--topo", "single,3", "--test", "pingall"],
        &mut store,
    );
    result.unwrap();

    let log = events.lock().unwrap();
    assert!(log.iter().any(|e| e == "build Wireless"));
    assert!(log.iter().any(|e| e == "op ping_all"));
}

#[test]
fn multi_controller_lifecycle_completes() {
    let mut store = RegistryStore::with_defaults();
    let (result, _) = orchestrate(
        &[
            "--controller",
            "remote,ip=10.0.0.9",
            "--controller",
            "ryu",
            "--test",
            "pingpair+iperf",
        ],
        &mut store,
    );
    result.unwrap();
}

#[test]
fn version_flag_exits_immediately() {
    let output = Command::new(env!("CARGO_BIN_EXE_emunet"))
        .arg("--version")
        .output()
        .expect("binary runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("emunet"));
}

#[test]
fn positional_arguments_print_usage_and_fail() {
    let output = Command::new(env!("CARGO_BIN_EXE_emunet"))
        .arg("unexpected")
        .output()
        .expect("binary runs");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.to_lowercase().contains("usage"));
}

#[test]
fn clean_exits_before_any_resolution() {
    // A nonsense switch name would abort resolution, so a clean exit proves
    // --clean returns before the registries are ever consulted.
    let output = Command::new(env!("CARGO_BIN_EXE_emunet"))
        .args(["--clean", "--switch", "definitely-not-a-switch"])
        .output()
        .expect("binary runs");
    assert!(output.status.success());
}

#[test]
fn unknown_switch_fails_with_banner() {
    let output = Command::new(env!("CARGO_BIN_EXE_emunet"))
        .args(["--switch", "definitely-not-a-switch", "--test", "none"])
        .output()
        .expect("binary runs");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Caught exception"));
    assert!(stderr.contains("definitely-not-a-switch"));
}
