//! geoshard: CLI tool for building and querying IP geolocation shard trees.

use clap::{Parser, Subcommand};
use geoshard::{Address, ConvertOptions, Converter, DirSource, GeoLookup, LookupConfig};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "geoshard")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Convert IP-range CSV dumps into sharded lookup trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an IPv4 range CSV into <output>/<octet>.json shards
    V4 {
        /// Input CSV file (.gz accepted)
        #[arg(env = "IP2L_V4_CSV")]
        input: PathBuf,

        /// Output directory for shard files
        #[arg(short, long, default_value = "ip2l")]
        output: PathBuf,

        /// Keep shards from earlier runs whose key received no records
        #[arg(long)]
        keep_stale: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Convert an IPv6 range CSV into <output>/<b0>/<b1>.json shards
    V6 {
        /// Input CSV file (.gz accepted)
        #[arg(env = "IP2L_V6_CSV")]
        input: PathBuf,

        /// Output directory for shard files
        #[arg(short, long, default_value = "ip2l6")]
        output: PathBuf,

        /// Keep shards from earlier runs whose key received no records
        #[arg(long)]
        keep_stale: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Look up addresses against converted shard trees
    Lookup {
        /// Addresses to resolve
        #[arg(required = true)]
        ips: Vec<String>,

        /// IPv4 shard directory
        #[arg(long, default_value = "ip2l")]
        v4_dir: PathBuf,

        /// IPv6 shard directory
        #[arg(long, default_value = "ip2l6")]
        v6_dir: PathBuf,

        /// Per-lookup budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::V4 {
            input,
            output,
            keep_stale,
            verbose,
        } => convert::<u32>(&input, output, keep_stale, verbose),
        Commands::V6 {
            input,
            output,
            keep_stale,
            verbose,
        } => convert::<u128>(&input, output, keep_stale, verbose),
        Commands::Lookup {
            ips,
            v4_dir,
            v6_dir,
            budget_ms,
        } => lookup(&ips, &v4_dir, &v6_dir, budget_ms),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn convert<A: Address>(
    input: &Path,
    output: PathBuf,
    keep_stale: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.is_file() {
        return Err(format!("input file not found: {:?}", input).into());
    }

    if verbose {
        println!("Reading {} input file: {:?}", A::FAMILY, input);
    }

    let options = ConvertOptions::new(output).keep_stale(keep_stale);
    let converter = Converter::<A>::with_options(options);
    let report = converter.convert_file(input)?;

    for shard in &report.shards {
        println!("Wrote {} ({} records)", shard.path, shard.records);
    }

    if verbose {
        println!(
            "Lines: {} read, {} skipped, {} dropped{}",
            report.stats.lines,
            report.stats.skipped,
            report.stats.dropped,
            if report.stats.header { ", header skipped" } else { "" }
        );
    }

    println!(
        "Converted {} records into {} shards in {:?}",
        report.stats.records,
        report.shards.len(),
        converter.options().output_dir
    );
    Ok(())
}

fn lookup(
    ips: &[String],
    v4_dir: &Path,
    v6_dir: &Path,
    budget_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let lookup = GeoLookup::with_sources(
        DirSource::new(v4_dir),
        DirSource::new(v6_dir),
        LookupConfig::default(),
    );
    let budget = budget_ms.map(Duration::from_millis);

    for ip in ips {
        let addr: IpAddr = match ip.trim().parse() {
            Ok(addr) => addr,
            Err(_) => {
                eprintln!("  Warning: invalid IP address: {}", ip);
                continue;
            }
        };

        let deadline = budget.map(|b| Instant::now() + b);
        let location = match lookup.try_lookup(addr, deadline) {
            Ok(location) => location.unwrap_or_default(),
            Err(e) => {
                eprintln!("  Warning: {}: {}", ip, e);
                Default::default()
            }
        };

        println!("{} {}", ip, serde_json::to_string(&location)?);
    }

    Ok(())
}
