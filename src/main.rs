mod collectors;
mod config;
mod error;
mod filler;
mod models;
mod shell;
mod sys;
mod util;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use collectors::partitions::SystemInventory;
use config::Config;
use filler::layout::FillerLayout;
use filler::strategy::AllocatorChain;
use filler::Filler;
use shell::{Action, Shell};
use std::ffi::OsString;
use std::io;

#[derive(Parser, Debug, Default)]
#[command(name = "diskfill", about = "Fill a partition to test low-disk behaviour, then release it", version)]
struct Cli {
    /// `fill` or `remove` to skip the menu; anything else opens it
    action: Option<String>,

    /// Free space to leave on the partition, in MB (default from config: 510)
    #[arg(long, value_name = "MB")]
    reserve_mb: Option<u64>,

    /// Print a one-shot JSON snapshot of partitions and filler files and exit
    #[arg(long)]
    json: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<clap_complete::Shell>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = parse_cli(std::env::args_os());

    if let Some(sh) = cli.completions {
        clap_complete::generate(sh, &mut Cli::command(), "diskfill", &mut io::stdout());
        return Ok(());
    }

    let cfg = Config::load();
    if cli.config {
        return run_print_config(&cfg);
    }

    let filler = build_filler(&cfg);
    if cli.json {
        return run_json_snapshot(&filler);
    }

    let reserve_mb = cli.reserve_mb.unwrap_or(cfg.fill.reserve_mb);
    let stdin  = io::stdin();
    let stdout = io::stdout();
    let mut shell = Shell::new(stdin.lock(), stdout.lock(), &filler, reserve_mb);
    shell.print_header()?;

    if let Some(code) = empty_inventory_exit(&filler) {
        eprintln!("[error] no usable partition found.");
        std::process::exit(code);
    }

    match cli.action.as_deref().and_then(Action::from_arg) {
        Some(action) => shell.run(action)?,
        None         => shell.run_menu()?,
    }
    Ok(())
}

/// Unknown or malformed arguments fall through to the interactive menu,
/// except that a leading `fill`/`remove` is still honoured.
fn parse_cli<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    match Cli::try_parse_from(args.iter().cloned()) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            log::debug!("ignoring command line: {}", e.kind());
            let action = args
                .get(1)
                .and_then(|a| a.to_str())
                .filter(|a| Action::from_arg(a).is_some())
                .map(str::to_string);
            Cli { action, ..Cli::default() }
        }
    }
}

/// Exit code for an inventory that turned up nothing to work on.
fn empty_inventory_exit(filler: &Filler) -> Option<i32> {
    filler.inventory().partitions().is_empty().then_some(1)
}

fn build_filler(cfg: &Config) -> Filler {
    let timeout = cfg.timeouts.mount_query();
    let allocator = AllocatorChain::for_platform(&cfg.timeouts);
    log::debug!("allocation methods: {}", allocator.names().join(" → "));
    Filler::new(
        Box::new(SystemInventory { mount_query_timeout: timeout }),
        Box::new(allocator),
        FillerLayout::native(),
        timeout,
    )
}

fn run_json_snapshot(filler: &Filler) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&snapshot_json(filler))?);
    Ok(())
}

/// Paths go in as display strings so non-UTF-8 names cannot fail serialization.
fn snapshot_json(filler: &Filler) -> serde_json::Value {
    use serde_json::{json, Value};
    use util::human::fmt_bytes;

    let partitions: Vec<Value> = filler.inventory().partitions().iter().map(|p| {
        json!({
            "mount_point": p.mount_point,
            "device":      p.device,
            "fstype":      p.fs_type,
            "label":       p.label,
            "total":       p.total_bytes,
            "used":        p.used_bytes(),
            "free":        p.free_bytes,
            "total_hr":    fmt_bytes(p.total_bytes),
            "used_hr":     fmt_bytes(p.used_bytes()),
            "free_hr":     fmt_bytes(p.free_bytes),
            "use_pct":     p.use_pct(),
            "filler_path": filler.target_path(p).display().to_string(),
        })
    }).collect();

    let fillers: Vec<Value> = filler.list_filler_files().iter().map(|(path, size)| {
        json!({
            "path":    path.display().to_string(),
            "size":    size,
            "size_hr": fmt_bytes(*size),
        })
    }).collect();

    json!({
        "diskfill_version": env!("CARGO_PKG_VERSION"),
        "timestamp":        chrono::Local::now().to_rfc3339(),
        "partitions":       partitions,
        "filler_files":     fillers,
    })
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    let present = Config::config_path().is_some_and(|p| p.exists());
    println!("Config: {}{}", path, if present { "" } else { " (not present, using defaults)" });
    println!();
    println!("[fill]");
    println!("  reserve_mb      = {}", cfg.fill.reserve_mb);
    println!();
    println!("[timeouts]");
    println!("  mount_query_sec = {}", cfg.timeouts.mount_query_sec);
    println!("  fsutil_sec      = {}", cfg.timeouts.fsutil_sec);
    println!("  dd_sec          = {}", cfg.timeouts.dd_sec);
    Ok(())
}
