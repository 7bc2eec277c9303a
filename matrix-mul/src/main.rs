use std::env;
use std::str::FromStr;

use matrix_mul::Error;
use matrix_mul::bench::{self, BenchConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let program = program_name(&args);
    let defaults = BenchConfig::default();

    let config = match parse_config(&args, defaults) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: {} [size] [runs] [workers]", program);
            eprintln!("  size     - A and B are size×size (default {})", defaults.size);
            eprintln!("  runs     - timed runs per path (default {})", defaults.runs);
            eprintln!("  workers  - parallel workers (default {})", defaults.workers);
            std::process::exit(1);
        }
    };

    println!(
        "Multiplying {0}x{0} matrices, {1} run(s), {2} worker(s)",
        config.size, config.runs, config.workers
    );
    let report = bench::run(&config, &mut rand::thread_rng())?;
    println!("{}", report);

    Ok(())
}

fn program_name(args: &[String]) -> &str {
    args.first().map_or("matrix-mul", String::as_str)
}

fn parse_config(args: &[String], defaults: BenchConfig) -> Result<BenchConfig, Error> {
    Ok(BenchConfig {
        size: positional(args, 1, "size", defaults.size)?,
        runs: positional(args, 2, "runs", defaults.runs)?,
        workers: positional(args, 3, "workers", defaults.workers)?,
    })
}

fn positional<T>(args: &[String], idx: usize, name: &str, default: T) -> Result<T, Error>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = args.get(idx) else {
        return Ok(default);
    };
    let value: T = raw
        .parse()
        .map_err(|_| Error::Parse(format!("invalid {}: {:?}", name, raw)))?;
    if value == T::default() {
        return Err(Error::Parse(format!("{} must be at least 1", name)));
    }
    Ok(value)
}
