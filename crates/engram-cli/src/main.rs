//! `engram` – interactive shell for the Engram memory subsystem.
//!
//! 1. Installs the tracing pipeline (console, optionally OTLP).
//! 2. Loads `~/.engram/config.toml`, writing defaults and a fresh
//!    consolidation secret on first run.
//! 3. Builds the storage backends, the redundancy router and the SQLite
//!    store, then spawns the background consolidation scheduler.
//! 4. Drops the user into the REPL. **Ctrl-C** or `/quit` stops the
//!    scheduler and flushes pending mirror writes before exiting.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use engram_memory::{ConsolidationScheduler, MemoryFacade, SqliteStore};
use engram_storage::{MirrorEvent, RedundancyRouter, build_backends};

fn main() {
    let telemetry = telemetry::init_tracing("engram");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing pending writes …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let code = match run(shutdown) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            1
        }
    };
    drop(telemetry);
    std::process::exit(code);
}

fn run(shutdown: Arc<AtomicBool>) -> Result<(), String> {
    // ── Configuration ─────────────────────────────────────────────────────
    let (cfg, written) = config::load_or_create()?;
    let path = config::config_path();
    if written {
        println!(
            "  {} Config written to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        );
    } else {
        println!("  Config loaded from {}", path.display().to_string().bold());
    }
    let secret = cfg.secret_key()?;
    let router_config = cfg.router.to_router_config();

    let runtime = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start async runtime: {}", e))?,
    );

    // ── Storage ───────────────────────────────────────────────────────────
    let backends = build_backends(&cfg.backends, router_config.backend_timeout)
        .map_err(|e| format!("Invalid backend configuration: {}", e))?;
    let router = Arc::new(RedundancyRouter::new(backends, router_config));
    for backend in router.health() {
        let status = if backend.configured { "ready".green() } else { "not configured".yellow() };
        println!("  Backend {} (priority {}) {}", backend.name.bold(), backend.priority, status);
    }

    if let Some(parent) = cfg.database_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create database directory: {}", e))?;
    }
    let store = Arc::new(
        SqliteStore::open(&cfg.database_path)
            .map_err(|e| format!("Failed to open {}: {}", cfg.database_path.display(), e))?,
    );

    let facade = Arc::new(MemoryFacade::new(
        store,
        Arc::clone(&router),
        cfg.policy.to_policy(),
        secret,
    ));

    // ── Background work ───────────────────────────────────────────────────
    let scheduler = {
        let _guard = runtime.enter();
        ConsolidationScheduler::spawn(facade.engine(), cfg.consolidation_interval())
    };
    let mut mirrors = router.subscribe_mirrors();
    runtime.spawn(async move {
        while let Some(event) = mirrors.recv().await {
            if let MirrorEvent::Failed { backend, name, reason } = event {
                eprintln!(
                    "  {} mirror of {} to {} failed: {}",
                    "⚠".yellow(),
                    name.dimmed(),
                    backend.bold(),
                    reason
                );
            }
        }
    });
    info!(
        database = %cfg.database_path.display(),
        every_secs = cfg.consolidation_interval().as_secs(),
        "engram ready"
    );

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::Session::new(Arc::clone(&facade), Arc::clone(&runtime)).run(shutdown);

    runtime.block_on(async {
        scheduler.shutdown().await;
        let flushed = router.flush_mirrors().await;
        if flushed > 0 {
            println!("  {} {} mirror write(s) flushed", "✓".green(), flushed);
        }
    });
    println!("{}", "  ✓ Exiting Engram.".green());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                            "#.bold().cyan());
    println!("{}", r#"  / __/__  ___ ________ ___ _    "#.bold().cyan());
    println!("{}", r#" / _// _ \/ _ `/ __/ _ `/  ' \   "#.bold().cyan());
    println!("{}", r#"/___/_//_/\_, /_/  \_,_/_/_/_/   "#.bold().cyan());
    println!("{}", r#"         /___/                     "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Engram".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Tiered associative memory");
    println!();
}
