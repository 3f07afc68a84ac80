//! In-memory network runtime.
//!
//! Models the emulated network as bookkeeping only: nodes derived from the
//! topology plan, all-pairs reachability always perfect, no OS resources
//! touched. This is the built-in runtime behind dry runs and the test
//! suite; OS-level runtimes implement the same trait out of tree.

use std::sync::{Arc, Mutex};

use color_eyre::eyre::{bail, Result};
use log::{debug, info};

use crate::registry::ComponentInstance;
use crate::selection::SelectionSpec;

use super::{NetworkHandle, NetworkPlan, NetworkRuntime, RuntimeFactory, StationPosition};

/// Shared event log letting tests observe lifecycle ordering.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Factory producing [`InMemoryRuntime`] handles that append to one shared
/// event log.
#[derive(Default)]
pub struct InMemoryFactory {
    events: EventLog,
}

impl InMemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> EventLog {
        Arc::clone(&self.events)
    }
}

impl RuntimeFactory for InMemoryFactory {
    fn build(&self, plan: NetworkPlan) -> Result<NetworkHandle> {
        let hosts = host_count(&plan.components.topo);
        let events = Arc::clone(&self.events);
        record(&events, &format!("build {:?}", plan.variant));
        info!(
            "Built {:?} network: {} hosts, topology '{}'",
            plan.variant, hosts, plan.components.topo.name
        );
        Ok(Box::new(InMemoryRuntime {
            plan,
            hosts,
            started: false,
            stopped: false,
            events,
        }))
    }
}

/// Number of emulated end hosts a topology plan produces.
fn host_count(topo: &ComponentInstance) -> usize {
    let first_arg = topo
        .positional
        .first()
        .and_then(|arg| arg.parse::<usize>().ok());
    let second_arg = topo
        .positional
        .get(1)
        .and_then(|arg| arg.parse::<usize>().ok());

    match topo.implementation.as_str() {
        "minimal" | "minimal_sta" => 2,
        "single" | "single_ap" | "linear" | "linear_ap" | "reversed" => first_arg.unwrap_or(2),
        "torus" => first_arg.unwrap_or(3) * second_arg.unwrap_or(3),
        "tree" => {
            let depth = first_arg.unwrap_or(1) as u32;
            second_arg.unwrap_or(2).pow(depth)
        }
        _ => 2,
    }
}

pub struct InMemoryRuntime {
    plan: NetworkPlan,
    hosts: usize,
    started: bool,
    stopped: bool,
    events: EventLog,
}

fn record(events: &EventLog, entry: &str) {
    if let Ok(mut log) = events.lock() {
        log.push(entry.to_string());
    }
}

impl NetworkRuntime for InMemoryRuntime {
    fn start(&mut self) -> Result<()> {
        if self.started {
            bail!("network already started");
        }
        self.started = true;
        record(&self.events, "start");
        info!("Started network with {} hosts", self.hosts);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.stopped {
            bail!("network already stopped");
        }
        self.stopped = true;
        record(&self.events, "stop");
        info!("Stopped network");
        Ok(())
    }

    fn wait_connected(&mut self) -> Result<()> {
        if !self.started {
            bail!("network is not started");
        }
        // No controller latency to wait out in memory.
        record(&self.events, "wait_connected");
        Ok(())
    }

    fn operations(&self) -> Vec<String> {
        ["ping_all", "ping_pair", "iperf", "iperf_udp"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn run_operation(&mut self, name: &str, spec: &SelectionSpec) -> Result<String> {
        if !self.started {
            bail!("cannot run '{name}' before the network is started");
        }
        if self.stopped {
            bail!("cannot run '{name}' after the network is stopped");
        }
        record(&self.events, &format!("op {name}"));
        debug!("running operation '{name}' with args {:?}", spec.keyword);

        let result = match name {
            "ping_all" => {
                let pairs = self.hosts * self.hosts.saturating_sub(1);
                format!("0% dropped ({pairs}/{pairs} received)")
            }
            "ping_pair" => "0% dropped (2/2 received)".to_string(),
            "iperf" => format!("10.0 Gbits/sec between h1 and h{}", self.hosts),
            "iperf_udp" => {
                let bw = spec
                    .keyword
                    .get("bw")
                    .cloned()
                    .unwrap_or_else(|| "10M".to_string());
                format!("{bw} between h1 and h{}", self.hosts)
            }
            other => bail!("runtime has no operation '{other}'"),
        };
        Ok(result)
    }

    fn attach_nat(&mut self, spec: &SelectionSpec) -> Result<()> {
        if self.started {
            bail!("NAT must be attached before the network starts");
        }
        record(&self.events, &format!("attach_nat {}", spec.name));
        info!("Attached NAT '{}' with default route configuration", spec.name);
        Ok(())
    }

    fn station_positions(&self) -> Vec<StationPosition> {
        if self.plan.wireless.is_none() {
            return Vec::new();
        }
        (0..self.hosts)
            .map(|i| StationPosition {
                name: format!("sta{}", i + 1),
                x: (i * 10) as f64,
                y: 0.0,
                z: 0.0,
            })
            .collect()
    }
}
