//! Standalone correctness check: repeated rounds of insert-all / verify-all /
//! remove-all over synthetic random keys, asserting size and value
//! consistency after every step.
//!
//! ```text
//! cargo run --example stress --release -- --rounds 3 --samples 10000
//! ```

use std::process::ExitCode;

use clap::Parser;
use flatmap56::FlatMap56;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser)]
#[command(about = "FlatMap56 randomized correctness check")]
struct Args {
    /// Number of insert/verify/remove rounds to run.
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Number of random keys per round.
    #[arg(long, default_value_t = 10_000)]
    samples: usize,

    /// RNG seed; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

fn report(map: &FlatMap56<u64>, phase: &str) {
    println!(
        "{phase:<16} buckets {:>8}  entries {:>8}  load factor {:.4}",
        map.bucket_count(),
        map.len(),
        map.load_factor(),
    );
}

fn run(args: &Args, seed: u64) -> Result<(), String> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut map: FlatMap56<u64> = FlatMap56::new().map_err(|e| e.to_string())?;

    for round in 1..=args.rounds {
        println!("round {round}:");
        report(&map, "  initial");

        let mut keys = Vec::with_capacity(args.samples);
        let mut seen = std::collections::HashSet::with_capacity(args.samples);
        while keys.len() < args.samples {
            let key: u64 = rng.random::<u64>() & ((1 << 56) - 1);
            if seen.insert(key) {
                keys.push(key);
            }
        }

        for (i, &key) in keys.iter().enumerate() {
            map.insert(key, key ^ 0x5A5A).map_err(|e| e.to_string())?;
            if map.len() != i + 1 {
                return Err(format!("size {} after {} inserts", map.len(), i + 1));
            }
        }
        for &key in &keys {
            match map.get(key) {
                Some(&v) if v == key ^ 0x5A5A => {}
                Some(&v) => return Err(format!("key {key}: wrong value {v}")),
                None => return Err(format!("key {key}: lost after insert phase")),
            }
        }
        report(&map, "  after insert");

        for (i, &key) in keys.iter().enumerate() {
            let Some(v) = map.remove(key) else {
                return Err(format!("key {key}: missing at removal"));
            };
            if v != key ^ 0x5A5A {
                return Err(format!("key {key}: removed wrong value {v}"));
            }
            if map.len() != keys.len() - (i + 1) {
                return Err(format!("size {} after {} removals", map.len(), i + 1));
            }
        }
        for &key in &keys {
            if map.get(key).is_some() {
                return Err(format!("key {key}: still present after removal"));
            }
        }
        report(&map, "  after remove");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    println!("seed: {seed:#018x}");

    match run(&args, seed) {
        Ok(()) => {
            println!("all rounds passed");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("FAILED: {message}");
            ExitCode::FAILURE
        }
    }
}
