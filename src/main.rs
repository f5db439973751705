use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use cachesim_moesi::{simulate, utils, Protocol, SimStats, SystemSpec};
use clap::Parser;
use env_logger::Env;
use log::error;

/// Simulate a shared-bus multiprocessor running a snooping coherence protocol
/// over one memory trace per processor.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// MESI or MOESI
    #[arg(default_value = "MOESI", value_parser = parse_protocol)]
    protocol: Protocol,
    /// traces are read from <DIR>/<TESTNAME>*.data
    #[arg(default_value = "tiny_blackscholes")]
    testname: String,
    /// cache size in bytes
    #[arg(default_value_t = 4096)]
    cache_size: u32,
    /// associativity in blocks
    #[arg(default_value_t = 2)]
    cache_assoc: u32,
    /// block size in bytes
    #[arg(default_value_t = 32)]
    block_size: u32,
    #[arg(long, default_value = "../datasets")]
    dir: PathBuf,
    /// stop after this many steps
    #[arg(long)]
    max_steps: Option<u64>,
}

fn parse_protocol(s: &str) -> Result<Protocol, String> {
    match s.to_ascii_uppercase().as_str() {
        "MESI" => Ok(Protocol::Mesi),
        "MOESI" => Ok(Protocol::Moesi),
        _ => Err(format!("invalid protocol {:?}, expected MESI or MOESI", s)),
    }
}

fn print_stats(stats: &SimStats) {
    println!("protocol: {}", stats.protocol);
    println!("steps: {}", stats.steps);
    for (i, (p, c)) in stats.procs.iter().zip(&stats.caches).enumerate() {
        println!(
            "proc {}: cycles {} compute {} idle {} loads {} stores {}",
            i, p.cycles, p.compute_cycles, p.idle_cycles, p.loads, p.stores
        );
        println!(
            "cache {}: hits {} misses {} ({:.2}%) private {} public {}",
            i, c.hits, c.misses, c.miss_rate() * 100.0, c.private_accesses, c.public_accesses
        );
    }
    let b = &stats.bus;
    println!(
        "bus: {} transactions (BusRd {} BusRdX {} BusUpgr {} WB {}), data traffic {} blocks, \
         cache-to-cache {}, invalidations {}",
        b.transactions(), b.bus_rd, b.bus_rdx, b.bus_upgr, b.write_backs,
        b.data_traffic, b.c2c_transfers, b.invalidations
    );
}

fn main() -> ExitCode {
    // logging
    let env = Env::default()
        .filter_or("CACHESIM_LOG", "info")
        .write_style_or("CACHESIM_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let specs = SystemSpec {
        protocol: args.protocol,
        cache_size: args.cache_size,
        cache_assoc: args.cache_assoc,
        block_size: args.block_size,
        ..Default::default()
    };
    if let Err(e) = specs.validate() {
        error!("invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let insts = match utils::read_testfiles(&args.dir, &args.testname, &specs) {
        Ok(insts) => insts,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let t0 = Instant::now();
    let stats = match simulate(specs, insts, args.max_steps) {
        Ok(stats) => stats,
        Err(e) => {
            error!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    print_stats(&stats);
    println!("execution time {:?}", t0.elapsed());
    ExitCode::SUCCESS
}
