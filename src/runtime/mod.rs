//! Network-runtime boundary.
//!
//! The actual emulated network (namespaces, interfaces, packet forwarding)
//! is an external collaborator; this module only specifies the interface the
//! orchestrator drives. Four runtime variants exist, selected from the
//! wireless and namespace-isolation modes. The built-in in-memory runtime
//! (see [`memory`]) implements the same interface for dry runs and tests.

pub mod memory;

use std::collections::BTreeMap;
use std::path::PathBuf;

use color_eyre::Result;
use serde::Serialize;

use crate::defaults::Reconciled;
use crate::options::Options;
use crate::selection::SelectionSpec;

/// The four runtime variants, keyed on (wireless, namespace isolation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeVariant {
    Wired,
    WiredNamespaced,
    Wireless,
    WirelessNamespaced,
}

impl RuntimeVariant {
    pub fn select(wifi: bool, in_namespace: bool) -> Self {
        match (wifi, in_namespace) {
            (false, false) => RuntimeVariant::Wired,
            (false, true) => RuntimeVariant::WiredNamespaced,
            (true, false) => RuntimeVariant::Wireless,
            (true, true) => RuntimeVariant::WirelessNamespaced,
        }
    }
}

/// Wireless-only construction parameters.
#[derive(Debug, Clone)]
pub struct WirelessPlan {
    pub channel: u32,
    pub band: u32,
    pub mode: String,
    pub ssid: String,
    pub encrypt: Option<String>,
    pub passwd: Option<String>,
    pub ieee80211w: Option<String>,
    pub client_isolation: bool,
    pub position: bool,
    pub plot: bool,
    pub plot3d: bool,
    pub docker: bool,
    pub container: String,
    pub ssh_user: String,
    pub json_file: Option<PathBuf>,
}

/// Everything the runtime needs to construct the network: resolved
/// components plus the scalar options.
#[derive(Debug, Clone)]
pub struct NetworkPlan {
    pub variant: RuntimeVariant,
    pub components: Reconciled,
    pub ipbase: String,
    pub auto_set_macs: bool,
    pub auto_static_arp: bool,
    pub xterms: bool,
    pub auto_pin_cpus: bool,
    /// `None` when `--nolistenport` was given.
    pub listen_port: Option<u16>,
    /// Substitutions installed by override sources, for collaborators that
    /// read keys beyond the scalar options.
    pub globals: BTreeMap<String, String>,
    pub wireless: Option<WirelessPlan>,
}

impl NetworkPlan {
    pub fn new(
        opts: &Options,
        components: Reconciled,
        globals: BTreeMap<String, String>,
    ) -> Self {
        let wireless = opts.wifi.then(|| WirelessPlan {
            channel: opts.channel,
            band: opts.band,
            mode: opts.mode.clone(),
            ssid: opts.ssid.clone(),
            encrypt: opts.encrypt.clone(),
            passwd: opts.passwd.clone(),
            ieee80211w: opts.ieee80211w.clone(),
            client_isolation: opts.client_isolation,
            position: opts.position,
            plot: opts.plot,
            plot3d: opts.plot3d,
            docker: opts.docker,
            container: opts.container.clone(),
            ssh_user: opts.ssh_user.clone(),
            json_file: opts.json_file.clone(),
        });

        NetworkPlan {
            variant: RuntimeVariant::select(opts.wifi, opts.in_namespace),
            components,
            ipbase: opts.ipbase.clone(),
            auto_set_macs: opts.auto_set_macs,
            auto_static_arp: opts.auto_static_arp,
            xterms: opts.xterms,
            auto_pin_cpus: opts.auto_pin_cpus,
            listen_port: (!opts.no_listen_port).then_some(opts.listen_port),
            globals,
            wireless,
        }
    }
}

/// Station or access-point position for the `--json-file` dump.
#[derive(Debug, Clone, Serialize)]
pub struct StationPosition {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Blocking interface to the emulated network.
///
/// Every call blocks until the runtime finishes the operation; the core
/// never invokes two operations concurrently.
pub trait NetworkRuntime {
    /// Start the network; blocks until the runtime reports readiness.
    fn start(&mut self) -> Result<()>;

    /// Stop the network and release its OS-level resources.
    fn stop(&mut self) -> Result<()>;

    /// Block until every switch/AP is connected to its controller.
    fn wait_connected(&mut self) -> Result<()>;

    /// Names of the operations this runtime exposes to the test dispatcher.
    fn operations(&self) -> Vec<String>;

    fn has_operation(&self, name: &str) -> bool {
        self.operations().iter().any(|op| op == name)
    }

    /// Invoke a named operation with micro-syntax arguments; returns its
    /// textual result.
    fn run_operation(&mut self, name: &str, spec: &SelectionSpec) -> Result<String>;

    /// Attach a NAT and apply its default configuration.
    fn attach_nat(&mut self, spec: &SelectionSpec) -> Result<()>;

    /// Current station/AP positions (empty for wired runtimes).
    fn station_positions(&self) -> Vec<StationPosition>;
}

/// Opaque handle to the network runtime, owned by the orchestrator for one
/// build-to-stop lifecycle.
pub type NetworkHandle = Box<dyn NetworkRuntime>;

/// Builds the runtime for a plan. The OS-level runtimes plug in here; the
/// in-memory factory is the built-in implementation.
pub trait RuntimeFactory {
    fn build(&self, plan: NetworkPlan) -> Result<NetworkHandle>;
}
