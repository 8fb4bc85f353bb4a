//! Entrypoint of the modshard binary
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use dotenvy::dotenv;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod common;
    pub(crate) mod resolve;
    pub(crate) mod show_rules;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "modshard",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_flag = true,
    arg(
        clap::Arg::new("help")
            .short('h')
            .long("help")
            .help("Print help information")
            .action(clap::ArgAction::Help)
            .global(true)
    ),
    about = "Sharding rules and key routing for a modulo-sharded logical database",
    long_about = r#"Sharding rules and key routing for a modulo-sharded logical database

Examples:
    # Show the rules built over the shards listed in shards.json
    modshard show-rules --shards-file shards.json

    # Find the shard holding member 17
    modshard resolve --shards-file shards.json --table member --key 17

    # Shards can also be given inline, in ordinal order
    modshard resolve --shard app:pw@db1:3306/app --shard app:pw@db2:3306/app -t member -k 17

    # Run with full debug logging specified with LOG_FILTER
    LOG_FILTER=debug modshard show-rules --shards-file shards.json
"#
)]
struct Config {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Show the sharding and broadcast rules built from the configured shards
    ShowRules(commands::show_rules::Config),

    /// Route a sharding key, or a key range, of a table to its shards
    Resolve(commands::resolve::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
        match r {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Initializing logs failed: {e}");
                std::process::exit(ReturnCode::Failure as _);
            }
        }
    }

    match config.command {
        None => println!("command required, -h/--help for help"),
        Some(Command::ShowRules(config)) => {
            let _tracing_guard =
                handle_init_logs(init_logs_and_tracing(&config.registry.logging_config));
            if let Err(e) = commands::show_rules::command(config) {
                eprintln!("Show rules command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::Resolve(config)) => {
            let _tracing_guard =
                handle_init_logs(init_logs_and_tracing(&config.registry.logging_config));
            if let Err(e) = commands::resolve::command(config) {
                eprintln!("Resolve command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
    }

    Ok(())
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // Ignore this - a missing env file is not an error, defaults will
            // be applied when initialising the Config struct.
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(1);
        }
    };
}

fn init_logs_and_tracing(
    config: &trogging::cli::LoggingConfig,
) -> Result<TroggingGuard, trogging::Error> {
    let log_layer = trogging::Builder::new()
        .with_default_log_filter("info")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(log_layer);
    trogging::install_global(subscriber)
}
