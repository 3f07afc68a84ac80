//! Error taxonomy for configuration and resolution failures.
//!
//! Everything here is a user-configuration or environment problem: nothing
//! is retried, and collaborator errors (runtime construction, start, per-test
//! operations) are propagated verbatim rather than wrapped in these variants.

use crate::registry::ComponentKind;

/// Errors raised while resolving user configuration into components.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A registry-backed option named an entry absent from its registry.
    #[error("unknown {kind} '{name}' (valid: {valid})")]
    UnknownComponent {
        kind: ComponentKind,
        name: String,
        valid: String,
    },

    /// A `--test` token did not match a local test or a runtime operation.
    #[error("unknown test '{name}' (valid: {valid})")]
    UnknownTest { name: String, valid: String },

    /// No controller is available and the selected switch cannot run without one.
    #[error("no default controller available for {kind} '{name}'; \
             use a bridge implementation or select a controller explicitly")]
    NoDefaultController { kind: ComponentKind, name: String },

    /// A `--custom` path did not resolve to a regular file.
    #[error("custom file not found: {path}")]
    OverrideFileNotFound { path: String },

    /// An override source had an unusable shape for a reserved binding.
    #[error("invalid override in {path}: {reason}")]
    InvalidOverride { path: String, reason: String },
}
