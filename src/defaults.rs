//! Defaulting reconciler.
//!
//! Runs after option parsing and before instantiation as an explicit ordered
//! rule chain; order is significant because later rules depend on earlier
//! rewrites (the switch-dependent link rewrite is tried before the
//! access-point-dependent one, for example). Each rule is a total function
//! over the options; the chain fails fast when no consistent configuration
//! exists.

use std::collections::BTreeMap;
use std::path::PathBuf;

use color_eyre::eyre::{bail, eyre, Result};
use log::{debug, info};

use crate::error::ConfigError;
use crate::options::{
    Options, AP_DEFAULT, CONTROLLER_DEFAULT, LINK_DEFAULT, SWITCH_DEFAULT,
};
use crate::registry::{
    ComponentInstance, ComponentKind, ConstructorDescriptor, RegistryStore, ValidationHook,
};
use crate::selection::SelectionSpec;

/// Bridge-only switch implementations that can run without a controller.
const BRIDGE_SWITCHES: [&str; 2] = ["ovsbr", "lxbr"];
/// Bridge-only access-point implementations.
const BRIDGE_APS: [&str; 1] = ["apbridge"];

/// Switch implementation whose links must be set up externally.
const EXTERNAL_LINK_SWITCH: &str = "user";
/// Access-point analog of [`EXTERNAL_LINK_SWITCH`].
const EXTERNAL_LINK_AP: &str = "userap";
/// Link implementation compatible with externally-driven link setup.
const EXTERNAL_COMPAT_LINK: &str = "ovs";
/// Default link implementation in wireless mode.
const WIRELESS_LINK: &str = "wtc";

/// Every component resolved for one invocation, ready for the orchestrator.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub topo: ComponentInstance,
    pub switch: ComponentInstance,
    pub ap: ComponentInstance,
    pub host: ComponentInstance,
    pub station: ComponentInstance,
    pub controllers: Vec<ComponentInstance>,
    pub link: ComponentInstance,
}

/// Probe for an available default controller implementation on the host.
pub trait ControllerProbe {
    fn default_available(&self) -> bool;
}

/// Probes `PATH` for a usable default controller binary, the same way
/// external binaries are validated elsewhere: the file must exist and carry
/// an execute bit.
pub struct PathProbe;

impl PathProbe {
    const CANDIDATES: [&'static str; 3] = ["ovs-testcontroller", "controller", "ovs-controller"];
}

impl ControllerProbe for PathProbe {
    fn default_available(&self) -> bool {
        let Some(path) = std::env::var_os("PATH") else {
            return false;
        };
        for dir in std::env::split_paths(&path) {
            for candidate in Self::CANDIDATES {
                if is_executable(&dir.join(candidate)) {
                    debug!("found default controller binary '{candidate}' in {dir:?}");
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(unix)]
fn is_executable(path: &PathBuf) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &PathBuf) -> bool {
    path.is_file()
}

/// Run the full rule chain and resolve every component.
pub fn reconcile(
    opts: &mut Options,
    store: &mut RegistryStore,
    probe: &dyn ControllerProbe,
) -> Result<Reconciled> {
    rule_controller_fallback(opts, probe)?;
    rule_wireless_substitutions(opts, store);
    rule_btvirt_substitutions(opts, store);

    let mut resolved = resolve_components(opts, store)?;
    rule_external_link_rewrite(opts, store, &mut resolved)?;
    rule_validation_hook(opts, store)?;

    Ok(resolved)
}

/// Rule 1: pick a controller when none was requested.
///
/// Falls back to the `none` controller when no default implementation is
/// discoverable, which only works with bridge-only switch and access-point
/// implementations. The access-point fallback is applied independently of
/// the switch fallback.
fn rule_controller_fallback(opts: &mut Options, probe: &dyn ControllerProbe) -> Result<()> {
    if !opts.controllers.is_empty() {
        return Ok(());
    }

    if probe.default_available() {
        debug!("no controller requested; using the default implementation");
        opts.controllers.push(CONTROLLER_DEFAULT.to_string());
        return Ok(());
    }

    opts.controllers.push("none".to_string());

    let switch = SelectionSpec::parse(&opts.switch).name;
    if switch == SWITCH_DEFAULT {
        info!("No default controller available; using bridge switch 'ovsbr'");
        opts.switch = "ovsbr".to_string();
    } else if !BRIDGE_SWITCHES.contains(&switch.as_str()) {
        return Err(ConfigError::NoDefaultController {
            kind: ComponentKind::Switch,
            name: switch,
        }
        .into());
    }

    let ap = SelectionSpec::parse(&opts.ap).name;
    if ap == AP_DEFAULT {
        info!("No default controller available; using bridge access point 'apbridge'");
        opts.ap = "apbridge".to_string();
    } else if !BRIDGE_APS.contains(&ap.as_str()) {
        return Err(ConfigError::NoDefaultController {
            kind: ComponentKind::AccessPoint,
            name: ap,
        }
        .into());
    }

    Ok(())
}

/// Rule 2: wireless mode swaps the stock topologies for their
/// wireless-capable counterparts and, when the link is untouched, the
/// wireless default link.
fn rule_wireless_substitutions(opts: &mut Options, store: &mut RegistryStore) {
    if !opts.wifi {
        return;
    }
    merge_wireless_topologies(store);
    if SelectionSpec::parse(&opts.link).name == LINK_DEFAULT {
        debug!("wireless mode: rewriting default link to '{WIRELESS_LINK}'");
        opts.link = WIRELESS_LINK.to_string();
    }
}

/// Rule 3: Bluetooth/virtual-radio mode gets the same topology
/// substitutions but keeps the link untouched.
fn rule_btvirt_substitutions(opts: &mut Options, store: &mut RegistryStore) {
    if !opts.btvirt {
        return;
    }
    merge_wireless_topologies(store);
}

fn merge_wireless_topologies(store: &mut RegistryStore) {
    let mut mapping = BTreeMap::new();
    for (name, implementation, signature) in [
        ("single", "single_ap", "single_ap(k)"),
        ("linear", "linear_ap", "linear_ap(k,n)"),
        ("minimal", "minimal_sta", "minimal_sta()"),
    ] {
        mapping.insert(
            name.to_string(),
            ConstructorDescriptor::new(implementation, signature),
        );
    }
    store.merge(ComponentKind::Topology, mapping);
}

/// Rule 4: resolve every component through the registries, honoring the
/// micro-syntax parameter binding of each option value.
fn resolve_components(opts: &Options, store: &RegistryStore) -> Result<Reconciled> {
    let topo = instantiate(store, ComponentKind::Topology, &opts.topo)?;
    let switch = instantiate(store, ComponentKind::Switch, &opts.switch)?;
    let ap = instantiate(store, ComponentKind::AccessPoint, &opts.ap)?;
    let host = instantiate(store, ComponentKind::Host, &opts.host)?;
    let station = instantiate(store, ComponentKind::Station, &opts.station)?;
    let link = instantiate(store, ComponentKind::Link, &opts.link)?;

    let mut controllers = Vec::with_capacity(opts.controllers.len());
    for value in &opts.controllers {
        controllers.push(instantiate(store, ComponentKind::Controller, value)?);
    }

    Ok(Reconciled {
        topo,
        switch,
        ap,
        host,
        station,
        controllers,
        link,
    })
}

fn instantiate(
    store: &RegistryStore,
    kind: ComponentKind,
    value: &str,
) -> Result<ComponentInstance, ConfigError> {
    let spec = SelectionSpec::parse(value);
    store.instantiate(kind, &spec)
}

/// Rule 5: a switch (or, failing that, an access point) whose links are set
/// up externally forces a compatible link implementation when the link is
/// still at its default. The switch check wins; the access-point check only
/// runs when the switch check did not trigger.
fn rule_external_link_rewrite(
    opts: &mut Options,
    store: &RegistryStore,
    resolved: &mut Reconciled,
) -> Result<()> {
    let link_is_default = SelectionSpec::parse(&opts.link).name == LINK_DEFAULT;

    let triggered = if resolved.switch.implementation == EXTERNAL_LINK_SWITCH {
        link_is_default
    } else if resolved.ap.implementation == EXTERNAL_LINK_AP {
        link_is_default
    } else {
        false
    };

    if triggered {
        info!("Link defaults to '{EXTERNAL_COMPAT_LINK}' for externally-driven link setup");
        opts.link = EXTERNAL_COMPAT_LINK.to_string();
        resolved.link = instantiate(store, ComponentKind::Link, &opts.link)?;
    }
    Ok(())
}

/// Rule 6: run the validation hook, if one was installed. Violations abort
/// startup unchanged.
fn rule_validation_hook(opts: &Options, store: &RegistryStore) -> Result<()> {
    match store.validation_hook() {
        None => Ok(()),
        Some(ValidationHook::Func(hook)) => hook(opts).map_err(|msg| eyre!(msg)),
        Some(ValidationHook::Constraints(constraints)) => {
            for (field, expected) in constraints {
                let actual = opts.field(field).ok_or_else(|| {
                    eyre!("validation hook references unknown option field '{field}'")
                })?;
                if &actual != expected {
                    bail!("validation failed: {field} is '{actual}', expected '{expected}'");
                }
            }
            Ok(())
        }
    }
}
