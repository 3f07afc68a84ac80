//! Interactive-session boundary.
//!
//! The command shell is an external collaborator; the orchestrator only
//! needs two entry points from it: run a script file non-interactively
//! (`--pre`/`--post`) and run one blocking interactive session. The
//! built-in [`StdioSession`] keeps the command language minimal: one
//! runtime operation per line, arguments in the usual micro-syntax.

use std::io::{self, BufRead, Write};
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use log::{debug, info, warn};

use crate::runtime::NetworkRuntime;
use crate::selection::SelectionSpec;

pub trait Session {
    /// Run a script file in non-interactive mode. Any failing line aborts
    /// the script and propagates.
    fn run_script(&mut self, net: &mut dyn NetworkRuntime, path: &Path) -> Result<()>;

    /// Run one interactive session; blocks until the user exits.
    fn interact(&mut self, net: &mut dyn NetworkRuntime) -> Result<()>;
}

/// Session over stdin/stdout.
#[derive(Default)]
pub struct StdioSession;

impl StdioSession {
    pub fn new() -> Self {
        StdioSession
    }
}

/// Parse one command line into a runtime operation selection.
///
/// The first whitespace token is the operation name; remaining tokens join
/// the micro-syntax argument list.
fn parse_command(line: &str) -> Option<SelectionSpec> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    let args: Vec<&str> = tokens.collect();
    let value = if args.is_empty() {
        name.to_string()
    } else {
        format!("{},{}", name, args.join(","))
    };
    Some(SelectionSpec::parse(&value))
}

impl Session for StdioSession {
    fn run_script(&mut self, net: &mut dyn NetworkRuntime, path: &Path) -> Result<()> {
        info!("Running script {}", path.display());
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read script '{}'", path.display()))?;

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(spec) = parse_command(line) else {
                continue;
            };
            debug!("script line {}: {line}", number + 1);
            let output = net
                .run_operation(&spec.name.clone(), &spec)
                .wrap_err_with(|| {
                    format!("script '{}' failed at line {}", path.display(), number + 1)
                })?;
            println!("{output}");
        }
        Ok(())
    }

    fn interact(&mut self, net: &mut dyn NetworkRuntime) -> Result<()> {
        info!("Starting interactive session (exit or EOF to leave)");
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("emunet> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break; // EOF
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }
            if line == "help" {
                println!("available operations: {}", net.operations().join(", "));
                continue;
            }

            let Some(spec) = parse_command(line) else {
                continue;
            };
            match net.run_operation(&spec.name, &spec) {
                Ok(output) => println!("{output}"),
                Err(err) => {
                    warn!("command '{line}' failed: {err}");
                    println!("*** {err}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{reconcile, ControllerProbe};
    use crate::options::{Args, Options};
    use crate::registry::RegistryStore;
    use crate::runtime::memory::InMemoryFactory;
    use crate::runtime::{NetworkPlan, RuntimeFactory};
    use clap::Parser;
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    struct AlwaysAvailable;

    impl ControllerProbe for AlwaysAvailable {
        fn default_available(&self) -> bool {
            true
        }
    }

    fn started_net(factory: &InMemoryFactory) -> crate::runtime::NetworkHandle {
        let mut opts: Options = Args::parse_from(["emunet"]).into();
        let mut store = RegistryStore::with_defaults();
        let components = reconcile(&mut opts, &mut store, &AlwaysAvailable).unwrap();
        let mut net = factory
            .build(NetworkPlan::new(&opts, components, BTreeMap::new()))
            .unwrap();
        net.start().unwrap();
        net
    }

    #[test]
    fn test_parse_command_with_args() {
        let spec = parse_command("iperf_udp bw=5M").unwrap();
        assert_eq!(spec.name, "iperf_udp");
        assert_eq!(spec.keyword.get("bw"), Some(&"5M".to_string()));
    }

    #[test]
    fn test_parse_command_blank_line() {
        assert!(parse_command("   ").is_none());
    }

    #[test]
    fn test_run_script_dispatches_operations() {
        let mut script = NamedTempFile::new().unwrap();
        writeln!(script, "# warm-up").unwrap();
        writeln!(script, "ping_all").unwrap();
        writeln!(script, "iperf_udp bw=5M").unwrap();

        let factory = InMemoryFactory::new();
        let mut net = started_net(&factory);
        StdioSession::new()
            .run_script(net.as_mut(), script.path())
            .unwrap();

        let events = factory.events();
        let log = events.lock().unwrap();
        assert!(log.contains(&"op ping_all".to_string()));
        assert!(log.contains(&"op iperf_udp".to_string()));
    }

    #[test]
    fn test_run_script_propagates_failures() {
        let mut script = NamedTempFile::new().unwrap();
        writeln!(script, "nosuchop").unwrap();

        let factory = InMemoryFactory::new();
        let mut net = started_net(&factory);
        let err = StdioSession::new()
            .run_script(net.as_mut(), script.path())
            .unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_missing_script_fails() {
        let factory = InMemoryFactory::new();
        let mut net = started_net(&factory);
        assert!(StdioSession::new()
            .run_script(net.as_mut(), Path::new("/no/such/script"))
            .is_err());
    }
}
