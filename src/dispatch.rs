//! Test dispatcher.
//!
//! Maps `--test` tokens to either a locally defined test routine or a
//! like-named operation on the network runtime. Tokens may join several
//! sub-tests with `+`; each sub-test uses the registry micro-syntax for its
//! arguments.

use color_eyre::Result;
use log::{debug, info};

use crate::error::ConfigError;
use crate::runtime::NetworkRuntime;
use crate::selection::SelectionSpec;
use crate::session::Session;

/// Historical alternate spellings, matched case-insensitively.
const ALT_SPELLING: [(&str, &str); 3] = [
    ("pingall", "ping_all"),
    ("pingpair", "ping_pair"),
    ("iperfudp", "iperf_udp"),
];

/// Locally defined test routines, tried before runtime operations.
const LOCAL_TESTS: [&str; 3] = ["cli", "build", "none"];

/// Run every `--test` value in order, splitting `+`-joined sub-tests.
pub fn run_tests(
    net: &mut dyn NetworkRuntime,
    session: &mut dyn Session,
    tokens: &[String],
) -> Result<()> {
    for token in tokens {
        for sub in token.split('+') {
            let sub = sub.trim();
            if sub.is_empty() {
                continue;
            }
            run_one(net, session, sub)?;
        }
    }
    Ok(())
}

fn run_one(net: &mut dyn NetworkRuntime, session: &mut dyn Session, token: &str) -> Result<()> {
    let mut spec = SelectionSpec::parse(token);
    spec.name = remap(&spec.name);

    if LOCAL_TESTS.contains(&spec.name.as_str()) {
        return run_local(net, session, &spec);
    }

    if net.has_operation(&spec.name) {
        // Runtime operations assume a fully connected network.
        net.wait_connected()?;
        info!("Running test '{}'", spec.name);
        let output = net.run_operation(&spec.name, &spec)?;
        println!("*** Results: {output}");
        return Ok(());
    }

    let mut valid: Vec<String> = LOCAL_TESTS.iter().map(ToString::to_string).collect();
    valid.extend(net.operations());
    valid.sort();
    Err(ConfigError::UnknownTest {
        name: spec.name,
        valid: valid.join(", "),
    }
    .into())
}

/// Case-insensitive remap of the three historical aliases.
fn remap(name: &str) -> String {
    for (alias, canonical) in ALT_SPELLING {
        if name.eq_ignore_ascii_case(alias) {
            return canonical.to_string();
        }
    }
    name.to_string()
}

fn run_local(
    net: &mut dyn NetworkRuntime,
    session: &mut dyn Session,
    spec: &SelectionSpec,
) -> Result<()> {
    match spec.name.as_str() {
        "cli" => session.interact(net),
        "build" => {
            // Reaching this point means the build already succeeded.
            debug!("test 'build': network constructed successfully");
            Ok(())
        }
        "none" => Ok(()),
        other => unreachable!("'{other}' is not a local test"),
    }
}
