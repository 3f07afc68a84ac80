use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::{debug, info};
use std::time::Instant;

use emunet::cleanup::{self, Cleanup, GeneralCleanup, WirelessCleanup};
use emunet::defaults::{reconcile, PathProbe};
use emunet::options::{Args, Options};
use emunet::orchestrator::Orchestrator;
use emunet::overrides;
use emunet::registry::RegistryStore;
use emunet::runtime::memory::InMemoryFactory;
use emunet::session::StdioSession;

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging at the requested verbosity
    env_logger::Builder::from_env(
        Env::default().default_filter_or(args.verbosity.log_filter()),
    )
    .init();

    let started_at = Instant::now();

    // Resource safety net: an interrupt in any lifecycle phase must attempt
    // both cleanup routines, even if the orchestrator's stop never ran.
    ctrlc::set_handler(|| {
        eprintln!("\n*** Interrupted; cleaning up");
        cleanup::cleanup_all();
        std::process::exit(130);
    })?;

    if args.clean {
        info!("Cleaning up emulation state");
        GeneralCleanup::new().run()?;
        WirelessCleanup::new().run()?;
        return Ok(());
    }

    match run(args) {
        Ok(()) => {
            println!("completed in {:.3} seconds", started_at.elapsed().as_secs_f64());
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            cleanup::cleanup_all();
            std::process::exit(1);
        }
    }
}

/// Resolve configuration and drive one lifecycle.
fn run(args: Args) -> Result<()> {
    let mut opts: Options = args.into();
    let mut store = RegistryStore::with_defaults();

    if let Some(custom) = opts.custom.clone() {
        info!("Loading overrides from {custom}");
        overrides::load_custom(&mut store, &custom)?;
    }
    opts.apply_globals(store.globals());

    let components = reconcile(&mut opts, &mut store, &PathProbe)?;
    debug!("resolved components: {components:?}");

    let globals = store.globals().clone();
    Orchestrator::new(
        opts,
        components,
        globals,
        Box::new(InMemoryFactory::new()),
        Box::new(StdioSession::new()),
    )
    .run()
}

/// Bordered error banner on stderr; the full chain goes to the debug log.
fn report_failure(err: &color_eyre::Report) {
    let border = "-".repeat(72);
    eprintln!("{border}");
    eprintln!("Caught exception: {err}");
    eprintln!("{border}");
    debug!("full error detail: {err:?}");
}
