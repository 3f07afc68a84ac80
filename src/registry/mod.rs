//! Component registries.
//!
//! Each of the seven pluggable roles (topology, switch, access point, host,
//! station, controller, link) owns one name-to-constructor registry. All
//! registries live in a [`RegistryStore`] owned by a single CLI invocation
//! and passed by reference to the option resolver, the override loader and
//! the defaulting reconciler. There are no process-wide singletons, so
//! repeated invocations (e.g. in tests) stay isolated.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;
use crate::options::Options;
use crate::selection::SelectionSpec;

/// The seven pluggable component roles resolved by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Topology,
    Switch,
    AccessPoint,
    Host,
    Station,
    Controller,
    Link,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Topology,
        ComponentKind::Switch,
        ComponentKind::AccessPoint,
        ComponentKind::Host,
        ComponentKind::Station,
        ComponentKind::Controller,
        ComponentKind::Link,
    ];

    /// Singular label used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            ComponentKind::Topology => "topology",
            ComponentKind::Switch => "switch",
            ComponentKind::AccessPoint => "access point",
            ComponentKind::Host => "host",
            ComponentKind::Station => "station",
            ComponentKind::Controller => "controller",
            ComponentKind::Link => "link",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Constructor descriptor: an implementation capability plus help text.
///
/// `bound_positional` and `bound_keyword` are defaults baked into the
/// registry entry (e.g. by an override file); arguments from the CLI
/// micro-syntax are layered on top at instantiation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDescriptor {
    /// Implementation id handed to the network runtime.
    pub implementation: String,
    /// Human-readable constructor signature for help text.
    pub signature: String,
    pub bound_positional: Vec<String>,
    pub bound_keyword: BTreeMap<String, String>,
}

impl ConstructorDescriptor {
    pub fn new(implementation: &str, signature: &str) -> Self {
        ConstructorDescriptor {
            implementation: implementation.to_string(),
            signature: signature.to_string(),
            bound_positional: Vec::new(),
            bound_keyword: BTreeMap::new(),
        }
    }
}

/// A resolved component: the build plan handed to the network runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInstance {
    pub kind: ComponentKind,
    /// Registry key the user selected.
    pub name: String,
    /// Implementation id from the descriptor.
    pub implementation: String,
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, String>,
}

/// Post-resolution validation hook installed by an override source.
///
/// At most one hook is active at a time; installing a new one replaces the
/// previous one.
pub enum ValidationHook {
    /// Declarative field constraints from an override file: every named
    /// `Options` field must equal the given value.
    Constraints(BTreeMap<String, String>),
    /// Programmatic hook registered through the extension handle.
    Func(Box<dyn Fn(&Options) -> Result<(), String>>),
}

impl fmt::Debug for ValidationHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationHook::Constraints(map) => {
                f.debug_tuple("Constraints").field(map).finish()
            }
            ValidationHook::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// All seven registries plus override state, owned by one invocation.
#[derive(Debug)]
pub struct RegistryStore {
    registries: BTreeMap<ComponentKind, BTreeMap<String, ConstructorDescriptor>>,
    globals: BTreeMap<String, String>,
    validation_hook: Option<ValidationHook>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore {
    /// An empty store with all seven registries present but unpopulated.
    pub fn new() -> Self {
        let mut registries = BTreeMap::new();
        for kind in ComponentKind::ALL {
            registries.insert(kind, BTreeMap::new());
        }
        RegistryStore {
            registries,
            globals: BTreeMap::new(),
            validation_hook: None,
        }
    }

    /// A store seeded with the built-in implementations.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();

        store.merge(
            ComponentKind::Topology,
            descriptors(&[
                ("minimal", "minimal", "minimal()"),
                ("single", "single", "single(k)"),
                ("linear", "linear", "linear(k,n)"),
                ("torus", "torus", "torus(x,y)"),
                ("tree", "tree", "tree(depth,fanout)"),
                ("reversed", "reversed", "reversed(k)"),
            ]),
        );
        store.merge(
            ComponentKind::Switch,
            descriptors(&[
                ("default", "ovs", "ovs(...)"),
                ("ovs", "ovs", "ovs(...)"),
                ("ovsbr", "ovsbr", "ovsbr(...)"),
                ("lxbr", "lxbr", "lxbr(...)"),
                ("user", "user", "user(...)"),
            ]),
        );
        store.merge(
            ComponentKind::AccessPoint,
            descriptors(&[
                ("default", "ovsap", "ovsap(...)"),
                ("ovsap", "ovsap", "ovsap(...)"),
                ("apbridge", "apbridge", "apbridge(...)"),
                ("userap", "userap", "userap(...)"),
            ]),
        );
        store.merge(
            ComponentKind::Host,
            descriptors(&[
                ("proc", "proc", "proc(...)"),
                ("rt", "rt", "rt(sched=rt)"),
                ("cfs", "cfs", "cfs(sched=cfs)"),
            ]),
        );
        store.merge(
            ComponentKind::Station,
            descriptors(&[("sta", "sta", "sta(...)")]),
        );
        store.merge(
            ComponentKind::Controller,
            descriptors(&[
                ("default", "default", "default(...)"),
                ("ovsc", "ovsc", "ovsc(...)"),
                ("nox", "nox", "nox(...)"),
                ("remote", "remote", "remote(ip,port)"),
                ("ryu", "ryu", "ryu(...)"),
                ("none", "none", "none()"),
            ]),
        );
        store.merge(
            ComponentKind::Link,
            descriptors(&[
                ("default", "default", "default()"),
                ("tc", "tc", "tc(bw,delay,loss)"),
                ("tcu", "tcu", "tcu(bw,delay,loss)"),
                ("wtc", "wtc", "wtc(bw,delay,loss)"),
                ("ovs", "ovs", "ovs()"),
            ]),
        );

        store
    }

    /// Look up a descriptor, matching the name case-insensitively against
    /// known key casing. Exact matches win over case-folded ones.
    pub fn lookup(
        &self,
        kind: ComponentKind,
        name: &str,
    ) -> Result<&ConstructorDescriptor, ConfigError> {
        let registry = &self.registries[&kind];
        if let Some(descriptor) = registry.get(name) {
            return Ok(descriptor);
        }
        registry
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, descriptor)| descriptor)
            .ok_or_else(|| ConfigError::UnknownComponent {
                kind,
                name: name.to_string(),
                valid: self.names(kind).join(", "),
            })
    }

    /// Whether `name` resolves in the given registry.
    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        self.lookup(kind, name).is_ok()
    }

    /// Insert or overwrite entries; last writer wins, no conflict detection.
    /// Overrides are expected to replace defaults.
    pub fn merge(
        &mut self,
        kind: ComponentKind,
        mapping: BTreeMap<String, ConstructorDescriptor>,
    ) {
        self.registries
            .get_mut(&kind)
            .expect("all kinds are seeded in new()")
            .extend(mapping);
    }

    pub fn insert(&mut self, kind: ComponentKind, name: &str, descriptor: ConstructorDescriptor) {
        self.registries
            .get_mut(&kind)
            .expect("all kinds are seeded in new()")
            .insert(name.to_string(), descriptor);
    }

    /// Sorted registry keys for one kind, used in help and error text.
    pub fn names(&self, kind: ComponentKind) -> Vec<String> {
        self.registries[&kind].keys().cloned().collect()
    }

    /// Resolve `spec.name` and build the component with the spec's arguments
    /// layered over the descriptor's bound defaults. Spec keywords win over
    /// bound keywords; bound positionals come first.
    pub fn instantiate(
        &self,
        kind: ComponentKind,
        spec: &SelectionSpec,
    ) -> Result<ComponentInstance, ConfigError> {
        let descriptor = self.lookup(kind, spec.name.as_str())?;

        let mut positional = descriptor.bound_positional.clone();
        positional.extend(spec.positional.iter().cloned());

        let mut keyword = descriptor.bound_keyword.clone();
        keyword.extend(spec.keyword.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(ComponentInstance {
            kind,
            name: spec.name.clone(),
            implementation: descriptor.implementation.clone(),
            positional,
            keyword,
        })
    }

    pub fn set_validation_hook(&mut self, hook: ValidationHook) {
        self.validation_hook = Some(hook);
    }

    pub fn validation_hook(&self) -> Option<&ValidationHook> {
        self.validation_hook.as_ref()
    }

    /// Install a process-wide global substitution from an override source.
    pub fn set_global(&mut self, key: &str, value: &str) {
        self.globals.insert(key.to_string(), value.to_string());
    }

    pub fn global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(String::as_str)
    }

    pub fn globals(&self) -> &BTreeMap<String, String> {
        &self.globals
    }
}

fn descriptors(
    entries: &[(&str, &str, &str)],
) -> BTreeMap<String, ConstructorDescriptor> {
    entries
        .iter()
        .map(|(name, implementation, signature)| {
            (
                name.to_string(),
                ConstructorDescriptor::new(implementation, signature),
            )
        })
        .collect()
}
