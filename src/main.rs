use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use dotmodules::cli::{Cli, Command};
use dotmodules::commands;
use dotmodules::logging::{self, Logger, Verbosity};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(Verbosity::from_flags(args.verbose, args.quiet), name);
    let log = Arc::new(Logger::new(name));

    match &args.command {
        Command::Download(opts) => commands::download::run(&args.global, opts, log.as_ref()),
        Command::Install(opts) => commands::install::run(&args.global, opts, &log),
        Command::Uninstall(opts) => commands::uninstall::run(&args.global, opts, &log),
        Command::Update(opts) => commands::update::run(&args.global, opts, log.as_ref()),
        Command::Clean(opts) => commands::clean::run(&args.global, opts.target, log.as_ref()),
        Command::Configure(opts) => commands::configure::run(opts, log.as_ref()),
        Command::Validate(opts) => commands::validate::run(opts, log.as_ref()),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
