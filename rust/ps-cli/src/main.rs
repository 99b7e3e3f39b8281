//! ps: command-line front end for the postflop solver worker.
//!
//! Subcommands:
//! - probe
//! - solve
//! - serve

use std::env;
use std::fs;
use std::io;
use std::net::TcpListener;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixListener;
use std::process;
use std::sync::Arc;

use ps_core::{CapabilityProbe, Config, VariantPreference};
use ps_engine::{AcceleratedVariant, BaselineVariant, HostProbe};
use ps_logging::NdjsonWriter;
use ps_remote::{serve_tcp, serve_uds, spawn_worker, ClientOptions, Endpoint, RemoteError};
use ps_session::{BackendSelector, Orchestrator};

/// Exploitability is checked on this cadence and after the final iteration.
const CHECK_EVERY: u32 = 10;

fn print_help() {
    eprintln!(
        r#"ps - postflop solver worker

USAGE:
    ps <COMMAND> [OPTIONS]

COMMANDS:
    probe       Report host SIMD support and the variant `auto` selects
    solve       Solve the game in a config file on an in-process worker
    serve       Serve the worker over TCP or a Unix socket

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `ps <COMMAND> --help` for command options.
"#
    );
}

fn print_version() {
    println!("ps {}", env!("CARGO_PKG_VERSION"));
}

fn selector() -> BackendSelector {
    BackendSelector::new(Arc::new(BaselineVariant), Arc::new(AcceleratedVariant))
}

fn parse_variant(s: &str) -> VariantPreference {
    match s {
        "auto" => VariantPreference::Auto,
        "baseline" => VariantPreference::Baseline,
        "accelerated" => VariantPreference::Accelerated,
        other => {
            eprintln!("Invalid --variant value: {other} (expected auto|baseline|accelerated)");
            process::exit(1);
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    if i + 1 >= args.len() {
        eprintln!("Missing value for {flag}");
        process::exit(1);
    }
    &args[i + 1]
}

fn parsed<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let v = value(args, i, flag);
    v.parse().unwrap_or_else(|_| {
        eprintln!("Invalid {flag} value: {v}");
        process::exit(1);
    })
}

/// `flush_every=0` leaves flushing to the end of the run.
fn open_event_log(path: &str, flush_every: u64) -> NdjsonWriter {
    NdjsonWriter::open_append_with_flush(path, flush_every).unwrap_or_else(|e| {
        eprintln!("Failed to open event log {path}: {e}");
        process::exit(1);
    })
}

fn cmd_probe(args: &[String]) {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!(
            r#"ps probe

USAGE:
    ps probe
"#
        );
        return;
    }
    match HostProbe.accelerated_supported() {
        Ok(accelerated) => {
            let variant = selector().variant(accelerated);
            println!("accelerated: {}", if accelerated { "yes" } else { "no" });
            println!("auto selects: {}", variant.name());
        }
        Err(e) => {
            eprintln!("probe failed: {e}");
            process::exit(1);
        }
    }
}

struct SolveArgs {
    config: String,
    threads: Option<u32>,
    max_iterations: Option<u32>,
    target: Option<f32>,
    compress: bool,
    event_log: Option<String>,
    variant: Option<VariantPreference>,
}

fn cmd_solve(args: &[String]) {
    let mut config: Option<String> = None;
    let mut out = SolveArgs {
        config: String::new(),
        threads: None,
        max_iterations: None,
        target: None,
        compress: false,
        event_log: None,
        variant: None,
    };

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"ps solve

USAGE:
    ps solve --config PATH [OPTIONS]

OPTIONS:
    --config PATH          Worker + game YAML config (required)
    --threads N            Engine thread pool size (default: worker.threads)
    --max-iterations N     Iteration cap (default: solve.max_iterations)
    --target X             Stop at this exploitability, % of pot (default: solve.target_exploitability)
    --compress             Use compressed solver storage
    --variant V            auto|baseline|accelerated (default: worker.variant)
    --event-log PATH       Append NDJSON events to PATH
"#
                );
                return;
            }
            "--config" => {
                config = Some(value(args, i, "--config").to_string());
                i += 2;
            }
            "--threads" => {
                out.threads = Some(parsed(args, i, "--threads"));
                i += 2;
            }
            "--max-iterations" => {
                out.max_iterations = Some(parsed(args, i, "--max-iterations"));
                i += 2;
            }
            "--target" => {
                out.target = Some(parsed(args, i, "--target"));
                i += 2;
            }
            "--compress" => {
                out.compress = true;
                i += 1;
            }
            "--variant" => {
                out.variant = Some(parse_variant(value(args, i, "--variant")));
                i += 2;
            }
            "--event-log" => {
                out.event_log = Some(value(args, i, "--event-log").to_string());
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `ps solve`: {other}");
                eprintln!("Run `ps solve --help` for usage.");
                process::exit(1);
            }
        }
    }
    out.config = config.unwrap_or_else(|| {
        eprintln!("Missing --config");
        process::exit(1);
    });

    match run_solve(&out) {
        Ok(()) => {}
        Err(SolveFailure::MemoryCap { needed, cap }) => {
            eprintln!("Memory requirement {needed} bytes exceeds solve.max_memory_bytes={cap}");
            process::exit(2);
        }
        Err(SolveFailure::Other(msg)) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}

enum SolveFailure {
    MemoryCap { needed: u64, cap: u64 },
    Other(String),
}

impl From<RemoteError> for SolveFailure {
    fn from(e: RemoteError) -> Self {
        SolveFailure::Other(e.to_string())
    }
}

fn run_solve(args: &SolveArgs) -> Result<(), SolveFailure> {
    let cfg = Config::load(&args.config)
        .map_err(|e| SolveFailure::Other(format!("Failed to load config {}: {e}", args.config)))?;
    let game = cfg
        .game
        .to_solver_config()
        .map_err(|e| SolveFailure::Other(format!("Invalid game config: {e}")))?;

    let threads = args.threads.unwrap_or(cfg.worker.threads);
    let max_iterations = args.max_iterations.unwrap_or(cfg.solve.max_iterations);
    let target = args.target.unwrap_or(cfg.solve.target_exploitability);
    let compress = args.compress || cfg.solve.compression;
    let preference = args.variant.unwrap_or(cfg.worker.variant);

    let orchestrator = Orchestrator::new(selector(), Arc::new(HostProbe));
    let mut endpoint = Endpoint::new(orchestrator.with_preference(preference));
    if let Some(path) = args.event_log.as_ref().or(cfg.worker.event_log.as_ref()) {
        endpoint = endpoint.with_event_log(open_event_log(path, 0));
    }
    let client = spawn_worker(endpoint, ClientOptions::from(&cfg.client))?;

    client.bootstrap(threads)?.recv()?;
    let handle = client.get_handle()?;
    let info = handle.info();
    println!(
        "session {}: {} ({} threads)",
        info.session_id, info.variant_name, info.thread_count
    );

    handle.init(game)?.recv()?;
    let needed = handle.memory_usage(compress)?.recv()?;
    println!(
        "memory: {:.2} MiB{}",
        needed as f64 / (1024.0 * 1024.0),
        if compress { " (compressed)" } else { "" }
    );
    if let Some(cap) = cfg.solve.max_memory_bytes {
        if needed > cap {
            return Err(SolveFailure::MemoryCap { needed, cap });
        }
    }
    handle.allocate_memory(compress)?.recv()?;

    let mut exploitability = handle.exploitability()?.recv()?;
    println!("iteration 0: exploitability {exploitability:.4}%");
    let mut done = 0u32;
    while done < max_iterations && exploitability > target {
        handle.iterate(done)?.recv()?;
        done += 1;
        if done % CHECK_EVERY == 0 || done == max_iterations {
            exploitability = handle.exploitability()?.recv()?;
            println!("iteration {done}: exploitability {exploitability:.4}%");
        }
    }
    handle.finalize()?.recv()?;

    let ev = handle.ev()?.recv()?;
    println!("iterations: {done}");
    println!("exploitability: {exploitability:.4}%");
    match ev.as_slice() {
        [oop, ip, ..] => println!("EV: oop={oop:.3} ip={ip:.3}"),
        other => println!("EV: {other:?}"),
    }
    Ok(())
}

/// A leftover socket from an earlier run blocks bind. Anything else at `path` is left alone.
fn clear_stale_socket(path: &str) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => fs::remove_file(path),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{path} exists and is not a socket"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn cmd_serve(args: &[String]) {
    let mut tcp: Option<String> = None;
    let mut uds: Option<String> = None;
    let mut config: Option<String> = None;
    let mut event_log: Option<String> = None;
    let mut variant: Option<VariantPreference> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"ps serve

USAGE:
    ps serve (--tcp ADDR | --uds PATH) [OPTIONS]

OPTIONS:
    --tcp ADDR         Listen on a TCP address, e.g. 127.0.0.1:7878
    --uds PATH         Listen on a Unix domain socket
    --config PATH      Take worker.variant and worker.event_log from this config
    --variant V        auto|baseline|accelerated
    --event-log PATH   Append NDJSON events to PATH
"#
                );
                return;
            }
            "--tcp" => {
                tcp = Some(value(args, i, "--tcp").to_string());
                i += 2;
            }
            "--uds" => {
                uds = Some(value(args, i, "--uds").to_string());
                i += 2;
            }
            "--config" => {
                config = Some(value(args, i, "--config").to_string());
                i += 2;
            }
            "--variant" => {
                variant = Some(parse_variant(value(args, i, "--variant")));
                i += 2;
            }
            "--event-log" => {
                event_log = Some(value(args, i, "--event-log").to_string());
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `ps serve`: {other}");
                eprintln!("Run `ps serve --help` for usage.");
                process::exit(1);
            }
        }
    }

    let cfg = config.map(|path| {
        Config::load(&path).unwrap_or_else(|e| {
            eprintln!("Failed to load config {path}: {e}");
            process::exit(1);
        })
    });
    let preference = variant
        .or(cfg.as_ref().map(|c| c.worker.variant))
        .unwrap_or_default();
    let event_log = event_log.or(cfg.and_then(|c| c.worker.event_log));

    let orchestrator = Orchestrator::new(selector(), Arc::new(HostProbe));
    let mut endpoint = Endpoint::new(orchestrator.with_preference(preference));
    // Long-lived: every event goes to disk as it happens.
    if let Some(path) = &event_log {
        endpoint = endpoint.with_event_log(open_event_log(path, 1));
    }

    let result = match (tcp, uds) {
        (Some(addr), None) => TcpListener::bind(&addr).and_then(|listener| {
            println!("listening on tcp {}", listener.local_addr()?);
            serve_tcp(&mut endpoint, &listener, None)
        }),
        (None, Some(path)) => {
            let bound = clear_stale_socket(&path).and_then(|()| UnixListener::bind(&path));
            bound.and_then(|listener| {
                println!("listening on uds {path}");
                serve_uds(&mut endpoint, &listener, None)
            })
        }
        _ => {
            eprintln!("Exactly one of --tcp or --uds is required");
            process::exit(1);
        }
    };
    if let Err(e) = result {
        eprintln!("serve failed: {e}");
        process::exit(1);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        process::exit(0);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => print_help(),
        "-V" | "--version" => print_version(),
        "probe" => cmd_probe(&args[2..]),
        "solve" => cmd_solve(&args[2..]),
        "serve" => cmd_serve(&args[2..]),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            process::exit(1);
        }
    }
}
