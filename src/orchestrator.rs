//! Lifecycle orchestrator.
//!
//! Drives the emulated network through the fixed lifecycle:
//! build -> start -> (tests | interactive session) -> stop. The network
//! handle is owned here for exactly one lifecycle and is stopped exactly
//! once, even when the run phase fails, so no emulated OS resources leak
//! past the invocation.

use std::collections::BTreeMap;

use color_eyre::eyre::{Result, WrapErr};
use log::{debug, info, warn};

use crate::defaults::Reconciled;
use crate::dispatch;
use crate::options::Options;
use crate::runtime::{NetworkPlan, NetworkRuntime, RuntimeFactory};
use crate::selection::SelectionSpec;
use crate::session::Session;

pub struct Orchestrator {
    opts: Options,
    components: Reconciled,
    globals: BTreeMap<String, String>,
    factory: Box<dyn RuntimeFactory>,
    session: Box<dyn Session>,
}

impl Orchestrator {
    pub fn new(
        opts: Options,
        components: Reconciled,
        globals: BTreeMap<String, String>,
        factory: Box<dyn RuntimeFactory>,
        session: Box<dyn Session>,
    ) -> Self {
        Orchestrator {
            opts,
            components,
            globals,
            factory,
            session,
        }
    }

    /// Drive one full lifecycle.
    pub fn run(mut self) -> Result<()> {
        let plan = NetworkPlan::new(
            &self.opts,
            self.components.clone(),
            self.globals.clone(),
        );
        debug!("building {:?} network runtime", plan.variant);

        // Idle -> Built
        let mut net = self.factory.build(plan)?;

        if let Some(nat) = &self.opts.nat {
            let spec = SelectionSpec::parse(nat);
            info!("Attaching NAT '{}'", spec.name);
            net.attach_nat(&spec)?;
        }

        if let Some(pre) = self.opts.pre.clone() {
            self.session
                .run_script(net.as_mut(), &pre)
                .wrap_err("pre-session script failed")?;
        }

        // Built -> Started; blocks until the runtime reports readiness.
        net.start()?;

        // Started -> Stopped. The stop call must happen exactly once even if
        // the position dump, testing, the interactive session or the
        // post-script raised.
        let run_result = self.run_phase(net.as_mut());
        let stop_result = net.stop();

        if run_result.is_err() {
            if let Err(err) = &stop_result {
                warn!("stop failed after run-phase error: {err:#}");
            }
        }
        run_result?;
        stop_result?;
        Ok(())
    }

    fn run_phase(&mut self, net: &mut dyn NetworkRuntime) -> Result<()> {
        if self.opts.wifi {
            if let Some(path) = self.opts.json_file.clone() {
                let positions = net.station_positions();
                let json = serde_json::to_string_pretty(&positions)?;
                std::fs::write(&path, json)
                    .wrap_err_with(|| format!("failed to write '{}'", path.display()))?;
                info!("Wrote {} positions to {}", positions.len(), path.display());
            }
        }

        if self.opts.tests.is_empty() {
            self.session.interact(net)?;
        } else {
            dispatch::run_tests(net, self.session.as_mut(), &self.opts.tests)?;
        }

        if let Some(post) = self.opts.post.clone() {
            self.session
                .run_script(net, &post)
                .wrap_err("post-session script failed")?;
        }
        Ok(())
    }
}
