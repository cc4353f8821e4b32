use crate::{
    graylog::client::GraylogClient,
    helpers::{
        load_config::{Config, default_config_paths},
        shutdown::Shutdown,
        time_args::{parse_absolute_date, parse_interval},
        token::generate_token,
    },
    instrumentation::tracing::{init_panic_handler, init_tracing},
    poller::{
        fetcher::{FetchOptions, Fetcher},
        window::{DEFAULT_INITIAL_RANGE_SECS, SearchRange},
    },
    render::render::{MessageRenderer, OutputFormat, render_stream_list},
    runtime::runtime::{TailOutcome, TailSettings, run_tail},
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, error::ErrorKind};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Base delay between polls when `--delay` is not given (seconds).
pub const DEFAULT_DELAY_SECS: u64 = 10;

#[derive(Debug, Parser)]
#[command(
    name = "gtail",
    about = "Tail logs from Graylog.",
    long_about = "gtail polls the Graylog REST search API and prints newly arrived log messages, like `tail -f` over HTTP.",
    version,
    term_width = 100,
    after_help = "\
Example configuration file (TOML):

    [server]
    # Graylog REST API
    uri = \"http://graylog.example.com:12900\"
    # either an access token (see --generate-token) ...
    token = \"TOKEN\"
    # ... or a username and password
    username = \"USERNAME\"
    password = \"PASSWORD\"

Default configuration paths: ./.gtail, ~/.gtail

EXAMPLES:
    gtail -f --stream web --query 'level:3'
    gtail --range 1h --fields source,message --format text
    gtail --from '2024-05-01 08:00:00' --to '2024-05-01 09:00:00'"
)]
pub struct Cli {
    /// The name of the streams to tail. Default: all streams
    #[arg(long = "stream", value_name = "NAME", num_args = 1..)]
    pub stream_names: Vec<String>,

    /// List streams and exit
    #[arg(long)]
    pub list_streams: bool,

    /// Query terms to search on
    #[arg(long, value_name = "TERM", num_args = 1..)]
    pub query: Vec<String>,

    /// Fields to display (space or comma separated)
    #[arg(long, value_name = "FIELD", num_args = 1.., value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Display format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Delay between REST API calls (seconds)
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_DELAY_SECS)]
    pub delay: u64,

    /// Time range for the initial fetch, e.g. 30s, 5m, 2h, 1w2d. Default: 5m
    #[arg(long, value_name = "INTERVAL", value_parser = parse_interval, conflicts_with_all = ["from_date", "to_date"])]
    pub range: Option<u64>,

    /// Limit for the initial fetch. Default: everything in the initial range
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    /// From date/time, format yyyy-MM-dd HH:mm:ss (UTC)
    #[arg(long = "from", value_name = "DATE", value_parser = parse_absolute_date)]
    pub from_date: Option<DateTime<Utc>>,

    /// To date/time, format yyyy-MM-dd HH:mm:ss (UTC). Default: now
    #[arg(long = "to", value_name = "DATE", value_parser = parse_absolute_date, requires = "from_date")]
    pub to_date: Option<DateTime<Utc>>,

    /// Follow the log
    #[arg(short = 'f', long = "follow")]
    pub follow: bool,

    /// Generate a new Graylog access token and save it in the config file
    #[arg(long)]
    pub generate_token: bool,

    /// Config files. Default: ./.gtail, ~/.gtail
    #[arg(long = "config", value_name = "PATH", num_args = 1..)]
    pub config_paths: Vec<PathBuf>,

    /// Also write JSON diagnostics to a daily rotated file in DIR
    #[arg(long, value_name = "DIR")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// How the search is bounded.
    #[must_use]
    pub fn search_range(&self) -> SearchRange {
        match self.from_date {
            Some(from) => SearchRange::Absolute {
                from,
                to: self.to_date.unwrap_or_else(Utc::now),
            },
            None => SearchRange::Relative {
                initial_seconds: self.range.unwrap_or(DEFAULT_INITIAL_RANGE_SECS),
            },
        }
    }

    /// Query terms joined into one search query.
    #[must_use]
    pub fn query_string(&self) -> Option<String> {
        let query = self.query.join(" ");
        (!query.trim().is_empty()).then_some(query)
    }

    /// Requested fields, empty entries dropped.
    #[must_use]
    pub fn field_list(&self) -> Option<Vec<String>> {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_owned)
            .collect();
        (!fields.is_empty()).then_some(fields)
    }

    #[must_use]
    pub fn config_paths(&self) -> Vec<PathBuf> {
        if self.config_paths.is_empty() {
            default_config_paths()
        } else {
            self.config_paths.clone()
        }
    }
}

/// Entry function for CLI
pub async fn run() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            e.print()?;
            return Ok(code);
        }
    };

    let _log_guard = init_tracing(cli.log_file.as_deref())?;
    init_panic_handler();

    execute(cli).await
}

//
// ------------------------ Command Implementations ------------------------------
//

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config_paths = cli.config_paths();
    let config = match Config::load(&config_paths) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let client = GraylogClient::new(&config.server)?;

    if cli.generate_token {
        return generate(&client, &config_paths).await;
    }

    let bold = io::stdout().is_terminal();

    let streams = match client.fetch_streams().await {
        Ok(streams) => streams,
        Err(e) => {
            eprintln!("Could not fetch streams from {}: {e}", client.base_uri());
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.list_streams {
        render_stream_list(streams.list(), bold, &mut io::stdout().lock())?;
        return Ok(ExitCode::SUCCESS);
    }

    let stream_ids = match streams.resolve_all(&cli.stream_names) {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("{e}\n");
            render_stream_list(&e.available, bold, &mut io::stdout().lock())?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let poll_delay = Duration::from_secs(cli.delay);
    let fetcher = Fetcher::new(
        client,
        FetchOptions {
            window: cli.search_range(),
            query: cli.query_string(),
            stream_ids,
            fields: cli.field_list(),
            initial_limit: cli.limit,
            poll_delay,
        },
    );
    let renderer = MessageRenderer::new(&streams, cli.field_list(), cli.format, bold);
    let settings = TailSettings {
        follow: cli.follow,
        poll_delay,
    };

    let shutdown = Shutdown::new();
    let listener = shutdown.listen_for_ctrl_c();

    let mut stdout = io::stdout().lock();
    let outcome = run_tail(&fetcher, &renderer, settings, &shutdown, &mut stdout).await;
    listener.abort();

    match outcome? {
        TailOutcome::Interrupted => tracing::debug!("Tail loop interrupted"),
        TailOutcome::OutputClosed => tracing::debug!("Output closed, stopping"),
        TailOutcome::Completed => {}
    }
    Ok(ExitCode::SUCCESS)
}

async fn generate(client: &GraylogClient, config_paths: &[PathBuf]) -> Result<ExitCode> {
    match generate_token(client, config_paths).await {
        Ok(generated) => {
            let mut stdout = io::stdout().lock();
            if generated.reused {
                writeln!(stdout, "Token already exists")?;
            } else {
                writeln!(stdout, "Generated new token")?;
            }
            match &generated.saved_to {
                Some(path) => writeln!(stdout, "Token saved in {}", path.display())?,
                None => writeln!(stdout, "{}", generated.token)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}
