//! Command parsing and dispatch shared by one-shot and shell mode

use cachescope::{Error, EvictionGateway, Harness, Key, LookupTransport};
use tracing::warn;

use crate::history_file::HistoryFile;
use crate::render;

/// Warm calls used when `bench` is given no count
pub const DEFAULT_WARM_COUNT: usize = 5;

const HELP: &str = "\
Commands:
  fetch <id> [repeat]       fetch an item and record it in the history
  rerun <id>                fetch an item again and record it
  history                   show recent requests, newest first
  clear                     clear the request history
  bench <id> [warm] [--json] evict, then 1 cold + N warm calls (default 5)
  evict <id>                evict one item from the cache
  evict-all                 evict every item from the cache
  stats                     hit/miss breakdown and session counters
  help                      show this help
  quit                      leave the shell";

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Fetch { key: Key, repeat: usize },
    Rerun { key: Key },
    History,
    Clear,
    Bench { key: Key, warm: usize, json: bool },
    Evict { key: Key },
    EvictAll,
    Stats,
    Help,
    Quit,
}

impl Request {
    /// Parse a shell line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Request>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let command = command.to_lowercase();
        let args: Vec<&str> = words.collect();

        let request = match command.as_str() {
            "fetch" | "get" => match args.as_slice() {
                [id] => Request::Fetch {
                    key: Key::from(*id),
                    repeat: 1,
                },
                [id, repeat] => Request::Fetch {
                    key: Key::from(*id),
                    repeat: parse_count(repeat, "repeat")?,
                },
                _ => return Err(arity("fetch")),
            },
            "rerun" => match args.as_slice() {
                [id] => Request::Rerun { key: Key::from(*id) },
                _ => return Err(arity("rerun")),
            },
            "bench" => {
                let json = args.contains(&"--json");
                let positional: Vec<&str> =
                    args.iter().copied().filter(|a| *a != "--json").collect();
                match positional.as_slice() {
                    [id] => Request::Bench {
                        key: Key::from(*id),
                        warm: DEFAULT_WARM_COUNT,
                        json,
                    },
                    [id, warm] => Request::Bench {
                        key: Key::from(*id),
                        warm: parse_count(warm, "warm")?,
                        json,
                    },
                    _ => return Err(arity("bench")),
                }
            }
            "evict" => match args.as_slice() {
                [id] => Request::Evict { key: Key::from(*id) },
                _ => return Err(arity("evict")),
            },
            "evict-all" | "evictall" => no_args(&args, "evict-all", Request::EvictAll)?,
            "history" => no_args(&args, "history", Request::History)?,
            "clear" => no_args(&args, "clear", Request::Clear)?,
            "stats" => no_args(&args, "stats", Request::Stats)?,
            "help" | "?" => Request::Help,
            "quit" | "exit" => Request::Quit,
            _ => return Err(format!("unknown command '{}', try 'help'", command)),
        };
        Ok(Some(request))
    }
}

fn parse_count(raw: &str, what: &str) -> Result<usize, String> {
    raw.parse()
        .map_err(|_| format!("{} must be a non-negative integer, got '{}'", what, raw))
}

fn arity(command: &str) -> String {
    format!("wrong number of arguments for '{}', try 'help'", command)
}

fn no_args(args: &[&str], command: &str, request: Request) -> Result<Request, String> {
    if args.is_empty() {
        Ok(request)
    } else {
        Err(arity(command))
    }
}

/// Result of handling one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text for stdout
    Output(String),
    /// Output produced before the failure, and the failure itself
    Failure { output: String, error: String },
    /// Leave the shell
    Quit,
}

impl Reply {
    fn failure(error: impl ToString) -> Self {
        Reply::Failure {
            output: String::new(),
            error: error.to_string(),
        }
    }
}

/// Executes requests against a harness, persisting the history if configured
pub struct CommandHandler<T, E> {
    harness: Harness<T, E>,
    history_file: Option<HistoryFile>,
}

impl<T, E> CommandHandler<T, E>
where
    T: LookupTransport,
    E: EvictionGateway,
{
    pub fn new(harness: Harness<T, E>, history_file: Option<HistoryFile>) -> Self {
        Self {
            harness,
            history_file,
        }
    }

    pub fn harness(&self) -> &Harness<T, E> {
        &self.harness
    }

    pub async fn handle(&self, request: Request) -> Reply {
        match request {
            Request::Fetch { key, repeat } => self.handle_fetch(&key, repeat).await,
            Request::Rerun { key } => self.handle_rerun(&key).await,
            Request::History => self.handle_history(),
            Request::Clear => self.handle_clear(),
            Request::Bench { key, warm, json } => self.handle_bench(&key, warm, json).await,
            Request::Evict { key } => match self.harness.evict(&key).await {
                Ok(()) => Reply::Output(format!("Evicted item #{} from the cache", key)),
                Err(e) => Reply::failure(e),
            },
            Request::EvictAll => match self.harness.evict_all().await {
                Ok(()) => Reply::Output("Evicted every item from the cache".to_string()),
                Err(e) => Reply::failure(e),
            },
            Request::Stats => Reply::Output(render::stats(
                &self.harness.history_stats(),
                self.harness.session(),
                self.harness.classifier(),
            )),
            Request::Help => Reply::Output(HELP.to_string()),
            Request::Quit => Reply::Quit,
        }
    }

    async fn handle_fetch(&self, key: &Key, repeat: usize) -> Reply {
        if repeat == 0 {
            return Reply::failure(Error::InvalidInput(
                "repeat must be at least 1".to_string(),
            ));
        }

        let mut output = String::new();
        for _ in 0..repeat {
            match self.harness.fetch(key).await {
                Ok(fetched) => output.push_str(&render::fetch(&fetched)),
                Err(e) => {
                    return self.persisted(Reply::Failure {
                        output,
                        error: e.to_string(),
                    })
                }
            }
        }
        self.persisted(Reply::Output(output))
    }

    async fn handle_rerun(&self, key: &Key) -> Reply {
        match self.harness.rerun(key).await {
            Ok(entry) => self.persisted(Reply::Output(render::entry(0, &entry))),
            Err(e) => Reply::failure(e),
        }
    }

    fn handle_history(&self) -> Reply {
        let history = self.harness.history();
        Reply::Output(render::history(&history.snapshot(), history.capacity()))
    }

    fn handle_clear(&self) -> Reply {
        self.harness.history().clear();
        self.persisted(Reply::Output("History cleared".to_string()))
    }

    async fn handle_bench(&self, key: &Key, warm: usize, json: bool) -> Reply {
        let run = match self.harness.run(key, warm).await {
            Ok(run) => run,
            Err(e) => return Reply::failure(e),
        };

        let classifier = self.harness.classifier();
        if json {
            match render::run_json(&run, classifier) {
                Ok(text) => Reply::Output(text),
                Err(e) => Reply::failure(format!("failed to encode run: {}", e)),
            }
        } else {
            Reply::Output(render::run(&run, classifier))
        }
    }

    /// Save the history after a mutation; a save failure turns into a failure reply
    fn persisted(&self, reply: Reply) -> Reply {
        let Some(file) = &self.history_file else {
            return reply;
        };

        match file.save(self.harness.history()) {
            Ok(()) => reply,
            Err(e) => {
                warn!("Failed to save history: {:#}", e);
                let (output, previous) = match reply {
                    Reply::Output(output) => (output, None),
                    Reply::Failure { output, error } => (output, Some(error)),
                    Reply::Quit => (String::new(), None),
                };
                let saving = format!("failed to save history: {:#}", e);
                Reply::Failure {
                    output,
                    error: match previous {
                        Some(previous) => format!("{}; {}", previous, saving),
                        None => saving,
                    },
                }
            }
        }
    }
}
