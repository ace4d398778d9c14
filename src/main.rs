mod config;
mod console;
mod display;
mod error;
mod logger;
mod persist;
mod scheduler;
mod secret;
mod session;
mod store;
mod totp;

use log::{error, warn, LevelFilter};
use std::env;
use std::process;
use std::sync::Arc;

use config::{Config, ConfigError};
use display::{InlineSink, TerminalSink};
use error::AppError;
use scheduler::Watcher;
use secret::DecodeError;
use session::Session;
use store::Entry;

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Mode<'a> {
    Interactive,
    Watch(&'a str),
}

impl<'a> Mode<'a> {
    fn from_arg(arg: Option<&'a str>) -> Self {
        match arg {
            None | Some("-w") | Some("--window") => Mode::Interactive,
            Some(text) => Mode::Watch(text),
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    logger::init_logger(
        config
            .as_ref()
            .map(|c| c.log_level)
            .unwrap_or(LevelFilter::Info),
    );

    let arg = env::args().nth(1);
    match run(Mode::from_arg(arg.as_deref()), config).await {
        Ok(()) => {}
        Err(AppError::Secret(_)) => {
            println!("Error: Not a compatible Google secret key");
            process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

/// Only the interactive session reads the configuration; watching a key
/// works with a broken environment.
async fn run(mode: Mode<'_>, config: Result<Config, ConfigError>) -> Result<(), AppError> {
    match mode {
        Mode::Interactive => interactive(&config?).await,
        Mode::Watch(text) => {
            if let Err(e) = &config {
                warn!("ignoring configuration: {}", e);
            }
            watch(text).await
        }
    }
}

/// Print one key's code in place, forever.
async fn watch(text: &str) -> Result<(), AppError> {
    let entry = Entry::new("", secret::accept(text)?).map_err(DecodeError::from)?;
    Watcher::new(entry, Arc::new(InlineSink::stdout())).run().await;
    Ok(())
}

/// Manage the saved keys from the terminal until the user quits.
async fn interactive(config: &Config) -> Result<(), AppError> {
    let board = Arc::new(TerminalSink::stdout());
    let (session, scheduler) = Session::open(config, board.clone())?;

    let ticker = tokio::spawn(scheduler.run());
    let res = console::run(&session, board.as_ref()).await;
    ticker.abort();

    Ok(res?)
}
