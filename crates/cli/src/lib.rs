pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::price::ItemArgs;
use commands::quote::QuoteCommand;

#[derive(Debug, Parser)]
#[command(
    name = "vitral",
    about = "Vitral quoting CLI",
    long_about = "Operate the Vitral quote engine: migrations, demo catalog, config inspection, price previews and quote lifecycle.",
    after_help = "Examples:\n  vitral doctor --json\n  vitral seed\n  vitral price --model mdl-corrediza-2h --glass gls-claro-6 --width 1000 --height 1500 --accessory\n  vitral quote add --user user-1 --model mdl-corrediza-2h --glass gls-claro-6 --width 1000 --height 1500"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo window catalog (models, glass types, services)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, notification channel, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Preview the price of a window configuration without saving anything")]
    Price(ItemArgs),
    /// Create, fill, send, cancel and inspect quotes
    #[command(subcommand)]
    Quote(QuoteCommand),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Price(args) => commands::price::run(&args),
        Command::Quote(command) => commands::quote::run(command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
