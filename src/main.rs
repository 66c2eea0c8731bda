use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use pickaxe_lang::cli::{self, CheckResult, CliError, OutputFormat, RunOptions};
use pickaxe_lang::{FailurePolicy, HttpRequestFactory, RuntimeConfig, ScraperDomFactory};
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "pickaxe")]
#[command(about = "Pickaxe - A SQL-like language for scraping web pages into tables")]
#[command(version)]
struct Cli {
    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a script, printing every select result
    Run {
        /// Script file ('-' or omitted reads stdin)
        script: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Workers per download when the script gives no thread hint
        #[arg(short, long)]
        threads: Option<usize>,

        /// What a failed download does to its statement
        #[arg(long, value_enum)]
        on_download_error: Option<OnError>,

        /// Request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Only parse and resolve a script
    Check {
        /// Script file ('-' or omitted reads stdin)
        script: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    Abort,
    Null,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            script,
            format,
            pretty,
            threads,
            on_download_error,
            timeout_ms,
        } => {
            let mut config = RuntimeConfig::from_env();
            if let Some(n) = threads {
                config.default_threads = n.max(1);
            }
            if let Some(policy) = on_download_error {
                config.download_failure = match policy {
                    OnError::Abort => FailurePolicy::Abort,
                    OnError::Null => FailurePolicy::NullRow,
                };
            }
            if let Some(ms) = timeout_ms {
                config.timeout = Duration::from_millis(ms);
            }
            let format = match format {
                Format::Text => OutputFormat::Text,
                Format::Json => OutputFormat::Json,
            };
            run(script, format, pretty, config)
        }
        Commands::Check { script } => check(script),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "pickaxe_lang=warn",
        1 => "pickaxe_lang=debug",
        _ => "pickaxe_lang=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_script(script: Option<String>) -> Result<String, CliError> {
    match script.as_deref() {
        Some(path) if path != "-" => Ok(std::fs::read_to_string(path)?),
        _ if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        _ => Err(CliError::NoInput),
    }
}

fn run(
    script: Option<String>,
    format: OutputFormat,
    pretty: bool,
    config: RuntimeConfig,
) -> Result<(), CliError> {
    let requests = HttpRequestFactory::new(&config)?;
    let options = RunOptions {
        script: read_script(script)?,
        format,
        pretty,
        config,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::execute_run(&options, Arc::new(requests), Arc::new(ScraperDomFactory::new()), &mut out)?;
    Ok(())
}

fn check(script: Option<String>) -> Result<(), CliError> {
    let script = read_script(script)?;
    match cli::execute_check(&script)? {
        CheckResult::Valid(summary) => {
            println!("Script is valid");
            println!(
                "  {} buffer(s), {} insert(s), {} select(s), {} download(s), {} pick(s)",
                summary.buffers, summary.inserts, summary.selects, summary.downloads, summary.picks
            );
        }
    }
    Ok(())
}
