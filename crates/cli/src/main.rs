//! # CLI - RecoStore command-line front end
//!
//! Builds the on-disk store from an unsorted input file, then answers
//! lookups either interactively (stdin) or over HTTP.
//!
//! ## Usage
//!
//! ```text
//! recostore build    Run the external-sort build and write sorted file + index
//! recostore serve    Serve GET /lookup and GET /health over HTTP
//! recostore [repl]   Interactive shell (the default)
//! ```
//!
//! `serve` and `repl` build the store first when either artifact is missing.
//!
//! ## REPL commands
//!
//! ```text
//! GET key [min_score]   Targets of `key` scoring above min_score (default 0)
//! KEYS [prefix]         List indexed keys
//! VERIFY                Full scan checking the sorted file against the index
//! STATS                 Print store debug info
//! EXIT / QUIT           Leave the shell
//! ```
//!
//! ## Configuration
//!
//! Environment variables, see the `config` crate (`RECO_INPUT_PATH`,
//! `RECO_SORTED_PATH`, `RECO_INDEX_PATH`, `RECO_CHUNK_RECORDS`,
//! `RECO_MERGE_FAN_IN`, `RECO_LISTEN_ADDR`). Log verbosity follows `RUST_LOG`
//! and defaults to `info`; logs go to stderr.
//!
//! ## Example
//!
//! ```text
//! $ RECO_INPUT_PATH=recommends.csv recostore
//! RecoStore ready (build=0017f3c2a9b04e11, keys=2, records=3)
//! Commands: GET key [min_score] | KEYS [prefix] | VERIFY | STATS | EXIT
//! > GET A 0.6
//! T3 0.8
//! > EXIT
//! bye
//! ```

mod repl;
mod server;

use anyhow::{bail, Context, Result};
use config::Config;
use engine::{build_store, BuildOptions, Store};
use std::io;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env();
    cfg.validate()?;

    match std::env::args().nth(1).as_deref() {
        Some("build") => cmd_build(&cfg),
        Some("serve") => cmd_serve(&cfg),
        None | Some("repl") => cmd_repl(&cfg),
        Some(other) => bail!("unknown command {:?} (expected build, serve or repl)", other),
    }
}

fn cmd_build(cfg: &Config) -> Result<()> {
    let report = build_store(&BuildOptions::from(cfg))?;
    println!(
        "built {} + {} (build={}): {} records, {} keys, {} runs in {:?}",
        cfg.sorted_path.display(),
        cfg.index_path.display(),
        report.build_id,
        report.records,
        report.keys,
        report.runs,
        report.elapsed
    );
    Ok(())
}

/// Opens the store, building it first if either file is missing.
fn open_or_build(cfg: &Config) -> Result<Store> {
    if !cfg.sorted_path.exists() || !cfg.index_path.exists() {
        log::info!("store files missing, building from {}", cfg.input_path.display());
        build_store(&BuildOptions::from(cfg))?;
    }
    Store::open(&cfg.sorted_path, &cfg.index_path).with_context(|| {
        format!(
            "failed to open store {} + {}",
            cfg.sorted_path.display(),
            cfg.index_path.display()
        )
    })
}

fn cmd_repl(cfg: &Config) -> Result<()> {
    let store = open_or_build(cfg)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    repl::run(&store, stdin.lock(), &mut stdout)
}

fn cmd_serve(cfg: &Config) -> Result<()> {
    let store = Arc::new(open_or_build(cfg)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::serve(store, &cfg.listen_addr))
}
