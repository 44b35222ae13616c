mod cli;
mod commands;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub root: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        root: cli.root,
    };

    match dispatch(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Init(args) => commands::init::run(ctx, args),
        Command::Apply(args) => commands::apply::run(ctx, args),
        Command::Rebuild { module } => commands::rebuild::run(ctx, module.as_deref()),
        Command::Status { json } => commands::status::run(ctx, json),
        Command::Version { json } => commands::version::run(ctx, json),
        Command::Repos => commands::repos::run(ctx),
        Command::Check => commands::check::run(ctx),
        Command::Upstream(cmd) => commands::upstream::run(ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "patchstack", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print an error chain, with advice when it comes from patchkit
fn report(err: &anyhow::Error) {
    ui::error(&err.to_string());
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    if let Some(category) = category_of(err) {
        eprintln!("  {}: {}", category.description(), category.advice());
    }
}

/// Category of the first patchkit error in the chain, below any context
fn category_of(err: &anyhow::Error) -> Option<patchkit::ErrorCategory> {
    err.chain()
        .find_map(|c| c.downcast_ref::<patchkit::Error>())
        .map(patchkit::Error::category)
}
