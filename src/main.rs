use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use humantime::{format_duration, parse_duration};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pathfd::{AutocloseConfig, FileCache, OpenMode, Priority, SystemClock};

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} [--config FILE] [--age DURATION] [--max N] [--priority added|used] [--hold DURATION] PATH...\n\
         Opens every PATH read-only, lists the registry, waits --hold, then runs one autoclose pass\n\
         and prints the report as JSON.",
        program
    );
}

fn value_of(args: &[String], i: usize, flag: &str, program: &str) -> String {
    if i + 1 >= args.len() {
        eprintln!("{} requires a value", flag);
        print_usage(program);
        std::process::exit(2);
    }
    args[i + 1].clone()
}

/// Opens the given paths through a file cache and runs one autoclose pass over them.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut config_path: Option<PathBuf> = None;
    let mut age: Option<Duration> = None;
    let mut max: Option<f64> = None;
    let mut priority: Option<Priority> = None;
    let mut hold = Duration::ZERO;
    let mut paths: Vec<PathBuf> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(PathBuf::from(value_of(&args, i, "--config", &program)));
                i += 2; continue;
            }
            "--age" => {
                let v = value_of(&args, i, "--age", &program);
                age = Some(parse_duration(&v).with_context(|| format!("--age {}", v))?);
                i += 2; continue;
            }
            "--max" => {
                let v = value_of(&args, i, "--max", &program);
                max = Some(v.parse().with_context(|| format!("--max {}", v))?);
                i += 2; continue;
            }
            "--priority" => {
                priority = match value_of(&args, i, "--priority", &program).as_str() {
                    "added" => Some(Priority::Added),
                    "used" => Some(Priority::Used),
                    other => {
                        eprintln!("Unknown priority: {}", other);
                        print_usage(&program);
                        std::process::exit(2);
                    }
                };
                i += 2; continue;
            }
            "--hold" => {
                let v = value_of(&args, i, "--hold", &program);
                hold = parse_duration(&v).with_context(|| format!("--hold {}", v))?;
                i += 2; continue;
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            p => { paths.push(PathBuf::from(p)); i += 1; }
        }
    }
    if paths.is_empty() {
        print_usage(&program);
        std::process::exit(2);
    }

    let mut config = match &config_path {
        Some(p) => AutocloseConfig::load_or_default(p).with_context(|| format!("loading {}", p.display()))?,
        None => AutocloseConfig::default(),
    }
    .apply_env()
    .context("applying PATHFD_* overrides")?;
    if let Some(a) = age { config.age = a; }
    if let Some(m) = max { config.max = m; }
    if let Some(p) = priority { config.priority = p; }
    config.enabled = true;
    // the pass below is run explicitly
    config.on_insert = false;

    info!(
        target: "pathfd",
        "pathfd starting: age={}, period={:?}, priority={:?}, max={}, files={}",
        format_duration(config.age), config.period, config.priority, config.max, paths.len()
    );

    let cache = FileCache::from_config(&config, Arc::new(SystemClock)).context("building autoclose policy")?;
    for p in &paths {
        if let Err(e) = cache.open(p, OpenMode::Read) {
            eprintln!("skipping {}: {}", p.display(), e);
        }
    }
    let registered = cache.snapshot(config.priority);

    if !hold.is_zero() {
        info!(target: "pathfd", "holding descriptors for {}", format_duration(hold));
        std::thread::sleep(hold);
    }

    let report = cache.autoclose().context("autoclose pass")?;
    let remaining = cache.snapshot(config.priority);
    let out = serde_json::json!({
        "registered": registered,
        "report": report,
        "remaining": remaining,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    let leftover = cache.close_all();
    if leftover.failed > 0 {
        eprintln!("{} descriptor(s) could not be closed", leftover.failed);
    }
    Ok(())
}
