/**
 * Take adaptive self-assessment quizzes from the command line.
 */
use std::io;
use std::process;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use selfcheck::cli;
use selfcheck::common::Options;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let options = Options::parse();

    let mut editor = rustyline::Editor::<()>::new();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    if let Err(e) = cli::run(&mut writer, &mut editor, options) {
        if !e.is_quiet() {
            eprintln!("{}: {}", "Error".red(), e);
            process::exit(2);
        }
    }
}
