//! `xcross` CLI: run a build command inside a cross-compilation image.

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use xcross::{EnvSnapshot, Options, EXIT_REJECTED};

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let options = Options::parse();

    match run(options) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}.", err);
            let code = err
                .downcast_ref::<xcross::Error>()
                .map(xcross::Error::exit_code)
                .unwrap_or(EXIT_REJECTED);
            process::exit(code);
        }
    }
}

fn run(options: Options) -> Result<i32> {
    // Ctrl-C reaches the engine through the process group. This process keeps
    // running until the engine exits so the transport script is removed.
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install the Ctrl-C handler")?;

    let current_dir = env::current_dir().context("Failed to read the current directory")?;
    let invocation = xcross::resolve(options, &EnvSnapshot::capture(), &current_dir)?;
    let code = xcross::run(&invocation)?;
    if interrupted.load(Ordering::SeqCst) {
        debug!(code, "interrupted, container engine exited");
    }
    Ok(code)
}
