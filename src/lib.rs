//! # Emunet - command-line orchestrator for emulated networks
//!
//! This library resolves user-selected, pluggable implementations (switch,
//! access point, host, station, controller, link, topology) from named
//! registries, applies override files to those registries, reconciles
//! mutually-dependent defaults, and drives the emulated network through a
//! fixed lifecycle: build -> start -> (tests | interactive session) -> stop.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `options`: CLI surface and the flat typed options snapshot
//! - `selection`: `name[,k=v,...]` micro-syntax parser
//! - `registry`: per-kind component registries and the invocation-scoped store
//! - `overrides`: `--custom` override-source loading and extension handle
//! - `defaults`: ordered defaulting-reconciler rule chain
//! - `orchestrator`: lifecycle driver owning the network handle
//! - `dispatch`: `--test` token dispatcher
//! - `runtime`: network-runtime boundary and the built-in in-memory runtime
//! - `session`: interactive-session boundary (script and interactive modes)
//! - `cleanup`: general and wireless resource cleanup collaborators
//! - `error`: typed error taxonomy
//!
//! ## Control flow
//!
//! CLI text flows through the option resolver (consulting the registries,
//! mutated by the override loader), then the defaulting reconciler, and
//! finally the orchestrator, which instantiates the collaborators and
//! drives the lifecycle. The test dispatcher runs during the run phase when
//! `--test` values were supplied.
//!
//! ## Error handling
//!
//! The binary boundary uses `color_eyre`; domain errors are typed in
//! [`error::ConfigError`]. Configuration and resolution errors abort
//! startup before any emulated resource is created; errors after the
//! network is built still trigger cleanup before the process exits.

pub mod cleanup;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod overrides;
pub mod registry;
pub mod runtime;
pub mod selection;
pub mod session;
