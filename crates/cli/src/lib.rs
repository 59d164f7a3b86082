pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pwyc",
    about = "Pay What You Can operator CLI",
    long_about = "Inspect effective configuration, check plugin readiness, \
                  and try customer prices against a minimum.",
    after_help = "Examples:\n  pwyc config\n  pwyc doctor --json\n  \
                  pwyc check-price 7.50 --min 5.00"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and render the price widget for a probe item")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate a customer-entered price the way the storefront does")]
    CheckPrice {
        #[arg(help = "Price as the customer would type it, e.g. 7.50")]
        price: String,
        #[arg(long = "min", help = "Minimum amount configured for the item")]
        min_amount: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::CommandResult::report(commands::config::run()),
        Command::Doctor { json } => commands::CommandResult::report(commands::doctor::run(json)),
        Command::CheckPrice { price, min_amount } => {
            commands::check_price::run(&price, min_amount.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
