//! CLI entry point for the netinv-discover scanner.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use netinv_core::NeighborProtocol;
use netinv_discover::config::DiscoverConfig;
use netinv_discover::liveness::PingProbe;
use netinv_discover::orchestrator::{select_switches, BatchKind, BatchOutcome, Orchestrator};
use netinv_discover::sink::{self, JsonLinesSink};
use netinv_discover::transport::NetSnmpCli;

#[derive(Parser)]
#[command(name = "netinv-discover")]
#[command(about = "SNMP inventory and CDP/LLDP topology scanner")]
struct Cli {
    /// Config file prefix (default: netinv).
    #[arg(short, long, default_value = "netinv", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover SNMP-speaking hosts across network specs.
    Hosts(HostsArgs),
    /// Walk CDP/LLDP neighbor tables of previously discovered switches.
    Neighbors(NeighborArgs),
}

#[derive(Args)]
struct HostsArgs {
    /// Network specs (10.0.1.7, 10.0.1.10-40, 10.0.1.0/24). Overrides config.
    targets: Vec<String>,

    /// Skip the ping pass and query every address.
    #[arg(long)]
    no_ping: bool,

    /// Community to try, in order. Repeatable. Overrides config.
    #[arg(short = 'C', long = "community")]
    communities: Vec<String>,

    /// Maximum concurrent probes.
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Args)]
struct NeighborArgs {
    /// Protocols to try, in order (cdp, lldp). Overrides config.
    #[arg(short, long, value_delimiter = ',')]
    protocols: Vec<String>,

    /// Community to try, in order. Repeatable. Overrides config.
    #[arg(short = 'C', long = "community")]
    communities: Vec<String>,

    /// Maximum concurrent walks.
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let mut config = load_discover_config(&cli.config)?;

    let transport = NetSnmpCli::new(&config.snmpget_path, &config.snmpwalk_path);
    let version = transport.verify_installation().await?;
    tracing::info!(net_snmp_version = %version, "net-snmp verified");

    match cli.command {
        Command::Hosts(args) => {
            if !args.targets.is_empty() {
                config.networks = args.targets;
            }
            if !args.communities.is_empty() {
                config.communities = args.communities;
            }
            if let Some(workers) = args.workers {
                config.max_workers = workers;
            }
            if args.no_ping {
                config.liveness_check = false;
            }
            if config.networks.is_empty() {
                anyhow::bail!("No targets: pass network specs or set discover.networks in config");
            }

            let sink = Arc::new(JsonLinesSink::open(
                config.host_cache_path(),
                config.neighbor_cache_path(),
            )?);
            let networks = config.networks.clone();
            let ping = PingProbe::new(&config.ping_path);
            let orchestrator =
                Orchestrator::new(config, Arc::new(transport))?.with_liveness(Arc::new(ping));

            let outcome = orchestrator.discover_hosts(&networks, sink).await?;
            report(&outcome);
        }
        Command::Neighbors(args) => {
            if !args.protocols.is_empty() {
                config.protocols = args
                    .protocols
                    .iter()
                    .map(|p| p.parse::<NeighborProtocol>())
                    .collect::<Result<_, _>>()?;
            }
            if !args.communities.is_empty() {
                config.communities = args.communities;
            }
            if let Some(workers) = args.workers {
                config.max_workers = workers;
            }

            let hosts = sink::load_hosts(config.host_cache_path())?;
            let switches = select_switches(&hosts);
            if switches.is_empty() {
                anyhow::bail!(
                    "No switch candidates in {}: run `netinv-discover hosts` first",
                    config.host_cache_path().display()
                );
            }
            tracing::info!(
                cached_hosts = hosts.len(),
                switches = switches.len(),
                "Loaded switch candidates"
            );

            let sink = Arc::new(JsonLinesSink::open(
                config.host_cache_path(),
                config.neighbor_cache_path(),
            )?);
            let orchestrator = Orchestrator::new(config, Arc::new(transport))?;
            let outcome = orchestrator.discover_neighbors(&switches, sink).await?;
            report(&outcome);
        }
    }

    Ok(())
}

fn report(outcome: &BatchOutcome) {
    let s = outcome.summary();
    let noun = match s.kind {
        BatchKind::Hosts => "hosts",
        BatchKind::Neighbors => "switches with neighbors",
    };
    println!(
        "Probed {} of {} targets: {} {noun} found, {} records stored ({:.1}s)",
        s.candidates,
        s.addresses,
        s.succeeded,
        s.records,
        s.duration.as_secs_f64()
    );
    if s.skipped_specs > 0 {
        println!("{} network spec(s) were invalid and skipped", s.skipped_specs);
    }
    if s.sink_errors > 0 {
        println!("{} record(s) could not be written to the cache", s.sink_errors);
    }

    if outcome.is_exhausted() {
        println!("Nothing found. Things to check:");
        println!("  - connectivity: can this machine reach the targets at all?");
        println!("  - credentials: are the SNMP communities correct for these devices?");
        println!("  - firewall: is UDP/161 allowed, and is ICMP allowed (else use --no-ping)?");
        if s.kind == BatchKind::Neighbors {
            println!("  - CDP/LLDP: is the protocol enabled on the switches?");
        }
    }
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            // NETINV_DISCOVER__MAX_WORKERS=8 -> discover.max_workers
            config::Environment::with_prefix("NETINV")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("discover.networks")
                .with_list_parse_key("discover.communities")
                .with_list_parse_key("discover.protocols"),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(DiscoverConfig::default()),
        Err(e) => Err(e.into()),
    }
}
