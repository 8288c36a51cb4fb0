//! NoC cycle-accurate simulator CLI.
//!
//! This binary provides a standalone stress driver for the simulator core.
//! It performs:
//! 1. **Config load:** JSON configuration file or built-in defaults.
//! 2. **Traffic generation:** Seeded random source/destination admissions at
//!    the configured injection rate and packet-size mixture.
//! 3. **Drain:** Pumps `step` until every admitted packet completes (or a
//!    cycle cap fires), then prints statistics.

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::rc::Rc;
use std::{fs, process};

use noc_core::Config;
use noc_core::NocInterface;
use noc_core::common::HandleTag;

#[derive(Parser, Debug)]
#[command(
    name = "nocsim",
    author,
    version,
    about = "Cycle-accurate NoC simulator",
    long_about = "Drive the NoC core with synthetic traffic.\n\nConfiguration is JSON (the same structure embedders pass in). The CLI uses built-in defaults when no file is given.\n\nExamples:\n  nocsim run\n  nocsim run --config mesh8.json --packets 5000\n  nocsim run --seed 42 --max-cycles 200000"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a random-traffic stress simulation.
    Run {
        /// JSON configuration file; defaults apply when omitted.
        #[arg(short, long)]
        config: Option<String>,

        /// Number of packets to admit.
        #[arg(short, long, default_value_t = 1000)]
        packets: u64,

        /// Abort if the fabric has not drained by this cycle.
        #[arg(long, default_value_t = 1_000_000)]
        max_cycles: u64,

        /// Override the configured seed.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            config,
            packets,
            max_cycles,
            seed,
        }) => cmd_run(config, packets, max_cycles, seed),
        None => {
            eprintln!("NoC Simulator — pass a subcommand");
            eprintln!();
            eprintln!("  nocsim run                     Stress run with defaults");
            eprintln!("  nocsim run -c <config.json>    Stress run with a config file");
            eprintln!();
            eprintln!("  nocsim --help  for full options");
            process::exit(1);
        }
    }
}

/// Draws a packet size from the configured per-class mixture.
fn next_packet_size(rng: &mut StdRng, sizes: &[usize], rates: &[u64]) -> usize {
    match sizes {
        [] => 1,
        [only] => *only,
        _ => {
            let total: u64 = rates.iter().take(sizes.len()).sum();
            let mut pick = rng.gen_range(0..total.max(1));
            for (size, rate) in sizes.iter().zip(rates) {
                if pick < *rate {
                    return *size;
                }
                pick -= rate;
            }
            sizes[sizes.len() - 1]
        }
    }
}

/// Runs the stress simulation: admit, drain, report.
///
/// Admissions are spread over future cycles according to the class-0
/// injection rate, using future-dated issue cycles so the whole schedule can
/// be placed up front. Exits with code 1 on a simulation error and code 2
/// when the fabric fails to drain.
fn cmd_run(config_path: Option<String>, packets: u64, max_cycles: u64, seed: Option<u64>) {
    let mut config: Config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading config {path}: {e}");
                process::exit(1);
            });
            serde_json::from_str(&text).unwrap_or_else(|e| {
                eprintln!("Error parsing config {path}: {e}");
                process::exit(1);
            })
        }
        None => Config::default(),
    };
    if let Some(seed) = seed {
        config.sim.seed = seed;
    }

    let nodes = config.nodes();
    let rate = config.traffic.injection_rate_for(0).max(1e-6);
    let (sizes, rates) = {
        let (s, r) = config.traffic.packet_sizes_for(0);
        (s.to_vec(), r.to_vec())
    };
    let stats_out = config.stats.stats_out.clone();
    let mut rng = StdRng::seed_from_u64(config.sim.seed ^ 0x5eed);

    let mut noc = NocInterface::new(config).unwrap_or_else(|e| {
        eprintln!("Error building simulator: {e}");
        process::exit(1);
    });

    println!(
        "Configuration: {} nodes, hop delay {}, {} packets at rate {:.4}",
        nodes,
        noc.hop_delay(),
        packets,
        rate
    );

    let done = Rc::new(Cell::new(0u64));
    let handle = HandleTag(1);
    let done_cb = Rc::clone(&done);
    noc.register_callback(
        handle,
        Box::new(move |_src, _pid, status| {
            if status == 1 {
                done_cb.set(done_cb.get() + 1);
            }
        }),
        Box::new(|_, _, _| {}),
    );

    // Lay out the whole admission schedule with future-dated issue cycles;
    // injection holds each packet until its cycle arrives.
    let mut cycle = 0u64;
    let mut admitted = 0u64;
    while admitted < packets {
        for node in 0..nodes {
            if admitted >= packets {
                break;
            }
            if rng.r#gen::<f64>() < rate {
                let dest = rng.gen_range(0..nodes);
                let size = next_packet_size(&mut rng, &sizes, &rates);
                if let Err(e) = noc.admit(node, dest, size, Some(cycle), handle) {
                    eprintln!("\n[!] admission failed: {e}");
                    process::exit(1);
                }
                admitted += 1;
            }
        }
        cycle += 1;
    }

    while done.get() < packets {
        if let Err(e) = noc.step() {
            eprintln!("\n[!] simulation error at cycle {}: {e}", noc.current_cycle());
            process::exit(1);
        }
        if noc.current_cycle() >= max_cycles {
            eprintln!(
                "\n[!] fabric failed to drain: {} of {} packets done at cycle {}",
                done.get(),
                packets,
                noc.current_cycle()
            );
            process::exit(2);
        }
    }

    noc.update_stats();
    let mut out = std::io::stdout();
    if let Err(e) = noc.display_overall_stats(&mut out) {
        eprintln!("Error writing statistics: {e}");
        process::exit(1);
    }
    if let Some(path) = stats_out {
        match fs::File::create(&path) {
            Ok(mut file) => {
                if let Err(e) = noc.write_matlab_stats(&mut file) {
                    eprintln!("Error writing {}: {e}", path.display());
                }
            }
            Err(e) => eprintln!("Error creating {}: {e}", path.display()),
        }
    }
    println!("\n[*] {} packets completed in {} cycles", done.get(), noc.current_cycle());
}
