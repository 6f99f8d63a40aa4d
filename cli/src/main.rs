//! pacgate command line
//!
//! Loads a PAC file and parses it, smoke-tests it, or finds proxies for URLs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pacgate_core::{Dispatcher, DispatcherConfig, ScriptEngine, Session, DEFAULT_QUEUE_CAPACITY};

#[derive(Parser, Debug)]
#[command(name = "pacgate", version, about = "Evaluate proxy auto-config documents")]
struct Cli {
    /// Pending requests the dispatcher queues before callers block
    #[arg(long, env = "PACGATE_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Address reported by myIpAddress() instead of the local default
    #[arg(long)]
    client_address: Option<String>,

    /// PAC file to load
    pac_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse the document and report any error
    Parse,
    /// Parse the document and evaluate a well-known test URL
    Check,
    /// Find the proxy directive for each URL
    Find {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    pacgate_core::init_logging();

    let cli = Cli::parse();
    let document = std::fs::read_to_string(&cli.pac_file)
        .with_context(|| format!("Failed to read {}", cli.pac_file.display()))?;

    let config = DispatcherConfig::with_queue_capacity(cli.queue_capacity);
    let dispatcher =
        Dispatcher::spawn(config, ScriptEngine::new).context("Failed to start PAC dispatcher")?;

    let mut session = Session::with_dispatcher(document, dispatcher);
    if let Some(address) = cli.client_address.as_deref() {
        session.set_client_address(address)?;
    }

    tracing::debug!(
        pac_file = %cli.pac_file.display(),
        client_address = %session.client_address(),
        "Loaded PAC file"
    );

    let ok = match &cli.command {
        Command::Parse => {
            let parsed = session.parse();
            report(&session, parsed, "parsed")
        }
        Command::Check => {
            let valid = session.is_valid();
            report(&session, valid, "valid")
        }
        Command::Find { urls } => {
            let mut all_matched = true;
            for url in urls {
                let (matched, directive) = session.evaluate(url);
                if matched {
                    println!("{url} -> {directive}");
                } else {
                    all_matched = false;
                    print_error(&session, url);
                }
            }
            all_matched
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn report(session: &Session, ok: bool, label: &str) -> bool {
    if ok {
        println!("{label}");
    } else {
        print_error(session, "document");
    }
    ok
}

fn print_error(session: &Session, subject: &str) {
    match session.last_error() {
        Some(e) => eprintln!("{subject}: {e}"),
        None => eprintln!("{subject}: failed"),
    }
}
