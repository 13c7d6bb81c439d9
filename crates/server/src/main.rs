use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use sharpd::{Server, ServerConfig};
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

/// Missing or invalid arguments.
const EXIT_USAGE: u8 = 10;
/// The listening socket could not be bound.
const EXIT_BIND: u8 = 11;

fn main() -> ExitCode {
    let config = match ServerConfig::try_parse() {
        Ok(config) => config,
        Err(e) => {
            // help and version are reported as errors too
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
            if let Err(print_error) = e.print() {
                eprintln!("{print_error}");
            }
            return code;
        }
    };

    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return ExitCode::from(EXIT_BIND);
        }
    };

    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cause = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
