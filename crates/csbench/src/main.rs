//! CacheScope bench - probe and benchmark a cached lookup service

mod handler;
mod history_file;
mod render;
mod settings;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use cachescope::{Harness, Key};
use cachescope_http::HttpBackend;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::handler::{CommandHandler, Reply, Request, DEFAULT_WARM_COUNT};
use crate::history_file::HistoryFile;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the lookup service
    #[arg(short, long)]
    base_url: Option<String>,

    /// Server time (ms) below which a response counts as a cache hit
    #[arg(short, long)]
    threshold_ms: Option<u64>,

    /// Number of requests kept in the history
    #[arg(long)]
    history_capacity: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// JSON file the request history is loaded from and saved to
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch an item and record it in the history
    Fetch {
        id: String,
        /// Number of sequential fetches
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
    },
    /// Fetch an item again and record it
    Rerun { id: String },
    /// Show recent requests, newest first
    History,
    /// Clear the request history
    Clear,
    /// Evict the item, then time 1 cold and N warm fetches
    Bench {
        id: String,
        /// Number of warm calls
        #[arg(short, long, default_value_t = DEFAULT_WARM_COUNT)]
        warm: usize,
        /// Print the run as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evict one item from the cache
    Evict { id: String },
    /// Evict every item from the cache
    EvictAll,
    /// Hit/miss breakdown of the history
    Stats,
    /// Interactive session reading commands from stdin
    Shell,
}

impl Command {
    /// One-shot request, `None` for the interactive shell
    fn into_request(self) -> Option<Request> {
        Some(match self {
            Command::Fetch { id, repeat } => Request::Fetch {
                key: Key::from(id),
                repeat,
            },
            Command::Rerun { id } => Request::Rerun { key: Key::from(id) },
            Command::History => Request::History,
            Command::Clear => Request::Clear,
            Command::Bench { id, warm, json } => Request::Bench {
                key: Key::from(id),
                warm,
                json,
            },
            Command::Evict { id } => Request::Evict { key: Key::from(id) },
            Command::EvictAll => Request::EvictAll,
            Command::Stats => Request::Stats,
            Command::Shell => return None,
        })
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(base_url) = &args.base_url {
        settings.http.base_url = base_url.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.http.timeout_ms = timeout_ms;
    }
    if let Some(threshold_ms) = args.threshold_ms {
        settings.harness.threshold_ms = threshold_ms;
    }
    if let Some(capacity) = args.history_capacity {
        settings.harness.history_capacity = capacity;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Settings::load(args.config.as_deref())?;
    apply_overrides(&mut settings, &args);
    settings.harness.validate()?;

    info!("Target: {}{}", settings.http.base_url, settings.http.api_prefix);
    info!("Hit threshold: {}ms", settings.harness.threshold_ms);

    let backend = HttpBackend::new(&settings.http).context("Failed to set up HTTP backend")?;

    let history_file = args.history_file.as_ref().map(HistoryFile::new);
    let harness = match &history_file {
        Some(file) => {
            let history = file.load(settings.harness.history_capacity)?;
            Harness::with_history(backend.clone(), backend, &settings.harness, history)
        }
        None => Harness::new(backend.clone(), backend, &settings.harness)?,
    };
    let handler = CommandHandler::new(harness, history_file);

    match args.command.into_request() {
        Some(request) => run_once(&handler, request).await,
        None => run_shell(&handler).await,
    }
}

async fn run_once(
    handler: &CommandHandler<HttpBackend, HttpBackend>,
    request: Request,
) -> Result<()> {
    match handler.handle(request).await {
        Reply::Output(text) => {
            print!("{}", with_newline(text));
            Ok(())
        }
        Reply::Failure { output, error } => {
            if !output.is_empty() {
                print!("{}", with_newline(output));
            }
            Err(anyhow!(error))
        }
        Reply::Quit => Ok(()),
    }
}

async fn run_shell(handler: &CommandHandler<HttpBackend, HttpBackend>) -> Result<()> {
    println!("csbench shell - type 'help' for commands, 'quit' to leave");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            // EOF
            println!();
            break;
        };

        let request = match Request::parse(&line) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };

        match handler.handle(request).await {
            Reply::Output(text) => print!("{}", with_newline(text)),
            Reply::Failure { output, error } => {
                if !output.is_empty() {
                    print!("{}", with_newline(output));
                }
                eprintln!("error: {}", error);
            }
            Reply::Quit => break,
        }
    }

    let session = handler.harness().session();
    info!(
        "Session finished: {} lookups, {} runs, {} failures",
        session.lookups(),
        session.runs(),
        session.failures()
    );
    Ok(())
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_bench() {
        let args = Args::try_parse_from([
            "csbench", "-b", "http://cache:9000", "-t", "30", "bench", "7", "--warm", "3", "--json",
        ])
        .unwrap();

        assert_eq!(args.base_url.as_deref(), Some("http://cache:9000"));
        assert_eq!(args.threshold_ms, Some(30));
        assert_eq!(
            args.command.into_request(),
            Some(Request::Bench {
                key: Key::from("7"),
                warm: 3,
                json: true
            })
        );
    }

    #[test]
    fn test_shell_has_no_request() {
        let args = Args::try_parse_from(["csbench", "shell"]).unwrap();
        assert_eq!(args.command.into_request(), None);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let args = Args::try_parse_from([
            "csbench",
            "--timeout-ms",
            "500",
            "--history-capacity",
            "5",
            "fetch",
            "1",
        ])
        .unwrap();
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &args);

        assert_eq!(settings.http.timeout_ms, 500);
        assert_eq!(settings.harness.history_capacity, 5);
        assert_eq!(settings.harness.threshold_ms, 50);
    }

    #[test]
    fn test_with_newline() {
        assert_eq!(with_newline("a".to_string()), "a\n");
        assert_eq!(with_newline("a\n".to_string()), "a\n");
    }
}
