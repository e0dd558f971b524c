mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Command, ConfigArgs, RunArgs};
use detach_core::config::Config;
use detach_core::lifecycle::logging;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => cmd_run(args),
        Command::Config(args) => cmd_config(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    // Synchronous stderr logging until the global subscriber exists.
    let bootstrap = logging::stderr_dispatch(args.log_level.as_deref().unwrap_or("info"));
    let application =
        tracing::dispatcher::with_default(&bootstrap, || app::Application::build(&args))?;

    // Daemonize before any thread exists: no logging worker, no tokio runtime.
    if args.daemon {
        application
            .daemonizer(args.no_close)
            .log_to(logging::stderr_dispatch(application.log_level()))
            .start()?;
    }

    // Init logging — force file logging when running as daemon
    let to_file = args.daemon || application.logging_to_file();
    let _guard = logging::init_logging(
        application.log_level(),
        to_file,
        Some(application.log_dir()),
    );

    application.write_report()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(application.serve())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    print!("{}", serde_yaml_ng::to_string(&config)?);
    Ok(())
}
