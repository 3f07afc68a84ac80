//! CLI surface and the typed options snapshot.
//!
//! [`Args`] is the clap-facing structure, one field per flag. [`Options`] is
//! the flat snapshot the rest of the pipeline reads; it is read-only after
//! parsing except for the selection fields (`switch`, `ap`, `link`,
//! `controllers`, `topo`) which only the defaulting reconciler rewrites.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use log::debug;

/// Reserved default names for registry-backed options. The reconciler keys
/// several rewrites off these values.
pub const TOPO_DEFAULT: &str = "minimal";
pub const SWITCH_DEFAULT: &str = "default";
pub const AP_DEFAULT: &str = "default";
pub const HOST_DEFAULT: &str = "proc";
pub const STATION_DEFAULT: &str = "sta";
pub const LINK_DEFAULT: &str = "default";
pub const CONTROLLER_DEFAULT: &str = "default";

pub const IPBASE_DEFAULT: &str = "10.0.0.0/8";
pub const SSID_DEFAULT: &str = "my-ssid";
pub const MODE_DEFAULT: &str = "g";
pub const CHANNEL_DEFAULT: u32 = 1;
pub const BAND_DEFAULT: u32 = 20;
pub const SSH_USER_DEFAULT: &str = "alpha";
pub const CONTAINER_DEFAULT: &str = "mininet-wifi";
pub const LISTEN_PORT_DEFAULT: u16 = 6634;

/// Log-level set accepted by `--verbosity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Verbosity {
    Debug,
    #[default]
    Info,
    Output,
    Warning,
    Error,
    Critical,
}

impl Verbosity {
    /// Filter string handed to `env_logger`.
    pub fn log_filter(self) -> &'static str {
        match self {
            Verbosity::Debug => "debug",
            Verbosity::Info | Verbosity::Output => "info",
            Verbosity::Warning => "warn",
            Verbosity::Error | Verbosity::Critical => "error",
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Verbosity::Debug => "debug",
            Verbosity::Info => "info",
            Verbosity::Output => "output",
            Verbosity::Warning => "warning",
            Verbosity::Error => "error",
            Verbosity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Command-line orchestrator for emulated wired and wireless networks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Topology: name[,arg,kw=val,...]
    #[arg(long, default_value = TOPO_DEFAULT, overrides_with = "topo")]
    pub topo: String,

    /// Switch implementation: name[,kw=val,...]
    #[arg(long, default_value = SWITCH_DEFAULT, overrides_with = "switch")]
    pub switch: String,

    /// Access-point implementation: name[,kw=val,...]
    #[arg(long, default_value = AP_DEFAULT, overrides_with = "ap")]
    pub ap: String,

    /// Host implementation: name[,kw=val,...]
    #[arg(long, default_value = HOST_DEFAULT, overrides_with = "host")]
    pub host: String,

    /// Station implementation: name[,kw=val,...]
    #[arg(long, default_value = STATION_DEFAULT, overrides_with = "station")]
    pub station: String,

    /// Link implementation: name[,kw=val,...]
    #[arg(long, default_value = LINK_DEFAULT, overrides_with = "link")]
    pub link: String,

    /// Controller selection, may be given multiple times
    #[arg(long, action = ArgAction::Append)]
    pub controller: Vec<String>,

    /// Enable wireless emulation mode
    #[arg(short = 'w', long)]
    pub wifi: bool,

    /// Enable Bluetooth/virtual-radio mode
    #[arg(short = 't', long)]
    pub btvirt: bool,

    /// Run stations as containers
    #[arg(short = 'd', long)]
    pub docker: bool,

    /// Plot the network graph
    #[arg(long)]
    pub plot: bool,

    /// Plot the network graph in 3D
    #[arg(long)]
    pub plot3d: bool,

    /// Automatically set MAC addresses from node numbers
    #[arg(long)]
    pub mac: bool,

    /// Enable station position tracking
    #[arg(long)]
    pub position: bool,

    /// Install static ARP entries on all nodes
    #[arg(long)]
    pub arp: bool,

    /// Run the network inside its own namespace
    #[arg(long)]
    pub innamespace: bool,

    /// Spawn one xterm per node
    #[arg(short = 'x', long)]
    pub xterms: bool,

    /// Pin hosts to (real) CPU cores
    #[arg(long)]
    pub pin: bool,

    /// Isolate wireless clients from each other
    #[arg(long)]
    pub client_isolation: bool,

    /// Do not pass a listening port to switches
    #[arg(long)]
    pub nolistenport: bool,

    /// Management-frame protection setting
    #[arg(long)]
    pub ieee80211w: Option<String>,

    /// Container image for docker-backed stations
    #[arg(long, default_value = CONTAINER_DEFAULT)]
    pub container: String,

    /// Write station/AP positions to this JSON file after start
    #[arg(long)]
    pub json_file: Option<PathBuf>,

    /// SSH user for container-backed stations
    #[arg(long, default_value = SSH_USER_DEFAULT)]
    pub ssh_user: String,

    /// Wireless channel
    #[arg(long, default_value_t = CHANNEL_DEFAULT)]
    pub channel: u32,

    /// Channel band (MHz)
    #[arg(long, default_value_t = BAND_DEFAULT)]
    pub band: u32,

    /// Wireless mode (a/b/g/n/ac/ax)
    #[arg(long, default_value = MODE_DEFAULT)]
    pub mode: String,

    /// Default SSID for access points
    #[arg(long, default_value = SSID_DEFAULT)]
    pub ssid: String,

    /// Encryption scheme (wpa/wpa2/wpa3/wep)
    #[arg(long)]
    pub encrypt: Option<String>,

    /// Passphrase for encrypted networks
    #[arg(long)]
    pub passwd: Option<String>,

    /// Base IP address for hosts
    #[arg(short = 'i', long, default_value = IPBASE_DEFAULT)]
    pub ipbase: String,

    /// Log verbosity
    #[arg(short = 'v', long, value_enum, default_value_t = Verbosity::Info)]
    pub verbosity: Verbosity,

    /// Base port for passive switch listening
    #[arg(long, default_value_t = LISTEN_PORT_DEFAULT)]
    pub listenport: u16,

    /// Script to run through the session before the network starts
    #[arg(long)]
    pub pre: Option<PathBuf>,

    /// Script to run through the session after tests/interaction
    #[arg(long)]
    pub post: Option<PathBuf>,

    /// Comma-separated override-source file paths
    #[arg(long)]
    pub custom: Option<String>,

    /// Attach a NAT; optionally takes name[,kw=val,...]
    #[arg(long, num_args = 0..=1, default_missing_value = "nat")]
    pub nat: Option<String>,

    /// Clean up leftover emulation state and exit
    #[arg(short = 'c', long)]
    pub clean: bool,

    /// Test to run instead of the interactive session, may be given
    /// multiple times; sub-tests join with '+'
    #[arg(long, action = ArgAction::Append)]
    pub test: Vec<String>,
}

/// Flat configuration snapshot consumed by the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct Options {
    pub topo: String,
    pub switch: String,
    pub ap: String,
    pub host: String,
    pub station: String,
    pub link: String,
    pub controllers: Vec<String>,

    pub wifi: bool,
    pub btvirt: bool,
    pub docker: bool,
    pub plot: bool,
    pub plot3d: bool,
    pub auto_set_macs: bool,
    pub position: bool,
    pub auto_static_arp: bool,
    pub in_namespace: bool,
    pub xterms: bool,
    pub auto_pin_cpus: bool,
    pub client_isolation: bool,
    pub no_listen_port: bool,

    pub ieee80211w: Option<String>,
    pub container: String,
    pub json_file: Option<PathBuf>,
    pub ssh_user: String,
    pub channel: u32,
    pub band: u32,
    pub mode: String,
    pub ssid: String,
    pub encrypt: Option<String>,
    pub passwd: Option<String>,
    pub ipbase: String,
    pub verbosity: Verbosity,
    pub listen_port: u16,
    pub pre: Option<PathBuf>,
    pub post: Option<PathBuf>,

    pub custom: Option<String>,
    pub nat: Option<String>,
    pub tests: Vec<String>,
}

impl From<Args> for Options {
    fn from(args: Args) -> Self {
        Options {
            topo: args.topo,
            switch: args.switch,
            ap: args.ap,
            host: args.host,
            station: args.station,
            link: args.link,
            controllers: args.controller,
            wifi: args.wifi,
            btvirt: args.btvirt,
            docker: args.docker,
            plot: args.plot,
            plot3d: args.plot3d,
            auto_set_macs: args.mac,
            position: args.position,
            auto_static_arp: args.arp,
            in_namespace: args.innamespace,
            xterms: args.xterms,
            auto_pin_cpus: args.pin,
            client_isolation: args.client_isolation,
            no_listen_port: args.nolistenport,
            ieee80211w: args.ieee80211w,
            container: args.container,
            json_file: args.json_file,
            ssh_user: args.ssh_user,
            channel: args.channel,
            band: args.band,
            mode: args.mode,
            ssid: args.ssid,
            encrypt: args.encrypt,
            passwd: args.passwd,
            ipbase: args.ipbase,
            verbosity: args.verbosity,
            listen_port: args.listenport,
            pre: args.pre,
            post: args.post,
            custom: args.custom,
            nat: args.nat,
            tests: args.test,
        }
    }
}

impl Options {
    /// Apply global substitutions from override sources.
    ///
    /// A substitution only takes effect on a scalar still at its documented
    /// default, so explicit CLI flags always win over override files. Keys
    /// that name no scalar stay in the store for collaborators to read.
    pub fn apply_globals(&mut self, globals: &BTreeMap<String, String>) {
        for (key, value) in globals {
            match key.as_str() {
                "ipbase" if self.ipbase == IPBASE_DEFAULT => {
                    self.ipbase = value.clone();
                }
                "ssid" if self.ssid == SSID_DEFAULT => {
                    self.ssid = value.clone();
                }
                "mode" if self.mode == MODE_DEFAULT => {
                    self.mode = value.clone();
                }
                "channel" if self.channel == CHANNEL_DEFAULT => {
                    if let Ok(channel) = value.parse() {
                        self.channel = channel;
                    }
                }
                "band" if self.band == BAND_DEFAULT => {
                    if let Ok(band) = value.parse() {
                        self.band = band;
                    }
                }
                "listenport" if self.listen_port == LISTEN_PORT_DEFAULT => {
                    if let Ok(port) = value.parse() {
                        self.listen_port = port;
                    }
                }
                "ssh_user" if self.ssh_user == SSH_USER_DEFAULT => {
                    self.ssh_user = value.clone();
                }
                "container" if self.container == CONTAINER_DEFAULT => {
                    self.container = value.clone();
                }
                "encrypt" if self.encrypt.is_none() => {
                    self.encrypt = Some(value.clone());
                }
                "passwd" if self.passwd.is_none() => {
                    self.passwd = Some(value.clone());
                }
                "ieee80211w" if self.ieee80211w.is_none() => {
                    self.ieee80211w = Some(value.clone());
                }
                other => {
                    debug!("global substitution '{other}' has no matching scalar option");
                }
            }
        }
    }

    /// Read a field by name for declarative validation hooks.
    pub fn field(&self, name: &str) -> Option<String> {
        let value = match name {
            "topo" => self.topo.clone(),
            "switch" => self.switch.clone(),
            "ap" => self.ap.clone(),
            "host" => self.host.clone(),
            "station" => self.station.clone(),
            "link" => self.link.clone(),
            "wifi" => self.wifi.to_string(),
            "btvirt" => self.btvirt.to_string(),
            "docker" => self.docker.to_string(),
            "mode" => self.mode.clone(),
            "ssid" => self.ssid.clone(),
            "channel" => self.channel.to_string(),
            "band" => self.band.to_string(),
            "ipbase" => self.ipbase.clone(),
            "listenport" => self.listen_port.to_string(),
            "container" => self.container.clone(),
            "ssh_user" => self.ssh_user.clone(),
            "encrypt" => self.encrypt.clone().unwrap_or_default(),
            "passwd" => self.passwd.clone().unwrap_or_default(),
            "ieee80211w" => self.ieee80211w.clone().unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["emunet"]);
        assert_eq!(args.topo, "minimal");
        assert_eq!(args.switch, "default");
        assert_eq!(args.ipbase, "10.0.0.0/8");
        assert_eq!(args.listenport, 6634);
        assert_eq!(args.ssid, "my-ssid");
        assert_eq!(args.channel, 1);
        assert_eq!(args.band, 20);
        assert_eq!(args.mode, "g");
        assert_eq!(args.ssh_user, "alpha");
        assert_eq!(args.container, "mininet-wifi");
        assert!(args.controller.is_empty());
        assert!(!args.wifi);
        assert_eq!(args.verbosity, Verbosity::Info);
    }

    #[test]
    fn test_single_valued_selection_last_wins() {
        let args = Args::parse_from(["emunet", "--switch", "ovs", "--switch", "user"]);
        assert_eq!(args.switch, "user");
    }

    #[test]
    fn test_controller_flag_accumulates() {
        let args = Args::parse_from([
            "emunet",
            "--controller",
            "remote,ip=10.0.0.10",
            "--controller",
            "ryu",
        ]);
        assert_eq!(args.controller.len(), 2);
        assert_eq!(args.controller[0], "remote,ip=10.0.0.10");
        assert_eq!(args.controller[1], "ryu");
    }

    #[test]
    fn test_test_flag_accumulates() {
        let args = Args::parse_from(["emunet", "--test", "pingall", "--test", "iperf"]);
        assert_eq!(args.test, vec!["pingall", "iperf"]);
    }

    #[test]
    fn test_nat_flag_with_and_without_value() {
        let args = Args::parse_from(["emunet", "--nat"]);
        assert_eq!(args.nat.as_deref(), Some("nat"));

        let args = Args::parse_from(["emunet", "--nat", "nat,ip=10.0.0.254"]);
        assert_eq!(args.nat.as_deref(), Some("nat,ip=10.0.0.254"));

        let args = Args::parse_from(["emunet"]);
        assert!(args.nat.is_none());
    }

    #[test]
    fn test_positional_arguments_are_rejected() {
        assert!(Args::try_parse_from(["emunet", "stray"]).is_err());
    }

    #[test]
    fn test_short_flags() {
        let args = Args::parse_from(["emunet", "-w", "-x", "-i", "192.168.0.0/16"]);
        assert!(args.wifi);
        assert!(args.xterms);
        assert_eq!(args.ipbase, "192.168.0.0/16");
    }

    #[test]
    fn test_apply_globals_respects_explicit_flags() {
        let mut opts: Options = Args::parse_from(["emunet", "--ssid", "lab"]).into();
        let globals = [
            ("ssid".to_string(), "override".to_string()),
            ("listenport".to_string(), "6653".to_string()),
        ]
        .into_iter()
        .collect();

        opts.apply_globals(&globals);
        assert_eq!(opts.ssid, "lab");
        assert_eq!(opts.listen_port, 6653);
    }

    #[test]
    fn test_field_accessor() {
        let opts: Options = Args::parse_from(["emunet", "--switch", "user"]).into();
        assert_eq!(opts.field("switch"), Some("user".to_string()));
        assert_eq!(opts.field("wifi"), Some("false".to_string()));
        assert_eq!(opts.field("nosuch"), None);
    }
}
