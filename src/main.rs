//! agent-watch - monitors long-running AI agent processes on this host.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use agent_watch::baseline;
use agent_watch::eventloop::EventLoop;
use agent_watch::procsource::{LinuxProcSource, ProcSource, RealFs};
use agent_watch::store::Store;
use agent_watch::tui::{NullRenderer, Renderer, TerminalRenderer};
use agent_watch::util::{current_unix_time, parse_time_flexible};

const DEFAULT_MATCH_PATTERN: &str = "codex|claude|gemini|copilot";
const DEFAULT_DB_PATH: &str = "agent-watch.db";

/// Monitors long-running AI agent processes on this host.
#[derive(Parser)]
#[command(name = "agent-watch", about = "AI agent process monitor")]
struct Args {
    /// Run the collector only and print a one-line tick summary per tick.
    #[arg(long)]
    headless: bool,

    /// Start in the GUI renderer (falls back to the terminal renderer if
    /// unavailable in this build).
    #[arg(long)]
    gui: bool,

    /// Tick cadence in seconds.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Pipe-separated case-insensitive substrings matched against each
    /// process's comm and cmdline.
    #[arg(long = "match", default_value = DEFAULT_MATCH_PATTERN)]
    pattern: String,

    /// Path to the SQL store.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest legacy NDJSON + lsof/status snapshots from a directory.
    Import {
        dir: String,
    },
    /// Print a read-only offline report from the store.
    Analyze,
    /// Snapshot current fingerprints under a label.
    BaselineSave {
        #[arg(long, default_value = baseline::DEFAULT_LABEL)]
        label: String,
    },
    /// Print regressions against saved baselines.
    BaselineCompare {
        #[arg(long, default_value_t = baseline::DEFAULT_CHANGE_PCT_THRESHOLD)]
        threshold_pct: f64,

        /// Only consider baselines/fingerprints at or after this time:
        /// an ISO-8601 timestamp, a bare Unix timestamp, or a relative
        /// offset such as `-1h`/`-30m`/`-2d`.
        #[arg(long = "since", short = 'b')]
        since: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("info"),
        ))
        .init();

    let args = Args::parse();

    let exit_code = match args.command {
        Some(Command::Import { dir }) => run_import(&dir, &args.db),
        Some(Command::Analyze) => run_analyze(&args.db),
        Some(Command::BaselineSave { label }) => run_baseline_save(&args.db, &label),
        Some(Command::BaselineCompare { threshold_pct, since }) => {
            run_baseline_compare(&args.db, threshold_pct, since.as_deref())
        }
        None => run_monitor(&args),
    };

    process::exit(exit_code);
}

fn open_store(path: &str) -> Store {
    match Store::open(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot open store at '{path}': {e}");
            process::exit(1);
        }
    }
}

fn run_monitor(args: &Args) -> i32 {
    let store = open_store(&args.db);
    let fs = RealFs::new();
    let source = LinuxProcSource::new(fs);
    let self_pid = process::id() as i32;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        let _ = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    let mut event_loop = EventLoop::new(
        &source as &dyn ProcSource,
        store,
        args.pattern.clone(),
        self_pid,
        Duration::from_secs(args.interval),
        args.headless,
    );

    let renderer: Box<dyn Renderer> = if args.headless {
        Box::new(NullRenderer)
    } else {
        // `--gui` falls back to the terminal renderer: this build carries
        // no separate GUI backend.
        let _ = args.gui;
        Box::new(TerminalRenderer::default())
    };

    event_loop.run(renderer, move || shutdown.load(Ordering::SeqCst));
    0
}

fn run_import(dir: &str, db: &str) -> i32 {
    let _store = open_store(db);
    eprintln!("import: no legacy snapshot readers registered for '{dir}'");
    1
}

fn run_analyze(db: &str) -> i32 {
    let store = open_store(db);
    let reader = store.reader();
    match reader.get_alive_agents() {
        Ok(agents) => {
            println!("alive agents: {}", agents.len());
            for agent in agents {
                println!("  pid={} comm={} last_seen={}", agent.pid, agent.comm, agent.last_seen);
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    }
    0
}

fn run_baseline_save(db: &str, label: &str) -> i32 {
    let store = open_store(db);
    let now = current_unix_time();
    match baseline::save(&store.reader(), &store.writer(), label, now) {
        Ok(n) => {
            println!("saved {n} fingerprints under label '{label}'");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn run_baseline_compare(db: &str, threshold_pct: f64, since: Option<&str>) -> i32 {
    let store = open_store(db);
    let reader = store.reader();

    let since_ts = match since.map(|s| parse_time_flexible(s, current_unix_time())) {
        Some(Ok(ts)) => Some(ts),
        Some(Err(e)) => {
            eprintln!("error: {e}");
            return 1;
        }
        None => None,
    };

    let fingerprints = match reader.get_all_fingerprints() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    let fingerprints: Vec<_> = fingerprints
        .into_iter()
        .filter(|fp| since_ts.map_or(true, |ts| fp.updated_at >= ts))
        .collect();

    let mut any = false;
    for fp in &fingerprints {
        let baselines = match reader.get_baselines_by_comm(&fp.comm) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        };
        let baselines: Vec<_> = baselines
            .into_iter()
            .filter(|b| since_ts.map_or(true, |ts| b.created_at >= ts))
            .collect();
        let findings = baseline::compare_all(&baselines, std::slice::from_ref(fp), threshold_pct);
        for finding in findings {
            any = true;
            println!(
                "{}: {} changed {:.1}% (baseline={:.2}, current={:.2})",
                finding.comm, finding.metric, finding.change_pct, finding.baseline_value, finding.current_value
            );
        }
    }
    if !any {
        println!("no regressions found");
    }
    0
}
