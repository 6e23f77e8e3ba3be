use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use atomizer::config::{default_config_path, Config, Overrides, Settings};
use atomizer::extract::{self, DailyWire, Fox6, Npr, SelectorExtractor};
use atomizer::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "atomizer",
    version,
    about = "Build Atom feeds from news sites, with media and article bodies scraped from each story"
)]
struct Args {
    /// User agent for every request (overrides RSS_USER_AGENT and USER_AGENT)
    #[arg(long, global = true, value_name = "UA")]
    user_agent: Option<String>,

    /// Proxy for HTTP and HTTPS, e.g. socks5://127.0.0.1:9050
    #[arg(long, global = true, value_name = "URL")]
    proxy: Option<String>,

    /// Article pages fetched at once [default: 3]
    #[arg(long, global = true, value_name = "N")]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long = "timeout", global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Config file [default: ~/.config/atomizer/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Indent the output document
    #[arg(long, global = true)]
    pretty: bool,

    /// Drop entries older than this many days before enrichment (0 keeps all)
    #[arg(long, global = true, value_name = "DAYS")]
    max_age_days: Option<u32>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// NPR stories with their audio attached
    Npr {
        /// Feeds to merge [default: NPR news]
        #[arg(value_name = "URL")]
        urls: Vec<String>,
    },
    /// FOX6 Milwaukee stories with article text or video
    Fox6 {
        /// Feeds to merge [default: FOX6 news]
        #[arg(value_name = "URL")]
        urls: Vec<String>,
    },
    /// A Daily Wire show with its episode videos
    Dailywire {
        /// Show name or slug, e.g. "Ben After Dark"
        show: String,
    },
    /// Any feed, with each entry's article text embedded
    Article {
        /// CSS selector for the article body
        #[arg(long, default_value = extract::article::DEFAULT_SELECTOR)]
        selector: String,

        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,
    },
    /// Convert and merge local RSS/Atom files into one Atom feed
    Convert {
        /// Input files; "-" reads standard input [default: -]
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Remove entries in the given categories, keeping the input format
    Filter {
        /// Input file; "-" reads standard input
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Case-insensitive substrings of category names to remove
        #[arg(value_name = "CATEGORY", required = true)]
        categories: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let output = match run(args).await {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(error = ?e, "Run failed");
            eprintln!("atomizer: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_output(&output) {
        eprintln!("atomizer: failed to write output: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn write_output(output: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}

/// Logs go to stderr; stdout carries only the feed.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "atomizer=debug" } else { "atomizer=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(args: &Args) -> Result<Settings> {
    let config = match args.config.clone().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => Config::default(),
    };

    let overrides = Overrides {
        user_agent: args.user_agent.clone(),
        proxy: args.proxy.clone(),
        concurrency: args.concurrency,
        timeout_secs: args.timeout_secs,
        pretty: args.pretty,
        max_age_days: args.max_age_days,
    };
    let settings = Settings::resolve(&overrides, &config);
    tracing::debug!(
        user_agent = %settings.http.user_agent,
        concurrency = settings.concurrency,
        timeout_secs = settings.http.timeout.as_secs(),
        "Resolved settings"
    );
    Ok(settings)
}

async fn run(args: Args) -> Result<String> {
    let settings = load_settings(&args)?;

    match args.command {
        Command::Npr { urls } => {
            let urls = or_default(urls, extract::npr::FEED_URL);
            let client = pipeline::client_for(&settings, Some(extract::npr::REFERER))?;
            pipeline::run_provider(&client, &urls, &Npr, &settings)
                .await
                .context("Failed to build NPR feed")
        }
        Command::Fox6 { urls } => {
            let urls = or_default(urls, extract::fox6::FEED_URL);
            let client = pipeline::client_for(&settings, Some(extract::fox6::REFERER))?;
            pipeline::run_provider(&client, &urls, &Fox6, &settings)
                .await
                .context("Failed to build FOX6 feed")
        }
        Command::Dailywire { show } => {
            let client = pipeline::client_for(&settings, Some(extract::dailywire::REFERER))?;
            pipeline::run_dailywire(&client, DailyWire::new(show.as_str()), &settings)
                .await
                .with_context(|| format!("Failed to build feed for show '{show}'"))
        }
        Command::Article { selector, urls } => {
            let extractor = SelectorExtractor::new(&selector)?;
            let client = pipeline::client_for(&settings, None)?;
            pipeline::run_provider(&client, &urls, &extractor, &settings)
                .await
                .context("Failed to build article feed")
        }
        Command::Convert { files } => {
            let files = if files.is_empty() {
                vec![PathBuf::from("-")]
            } else {
                files
            };
            let sources = files
                .iter()
                .map(|path| -> Result<(String, String)> { Ok((origin(path), read_input(path)?)) })
                .collect::<Result<Vec<_>>>()?;
            pipeline::convert_documents(sources, settings.pretty).context("Failed to convert feeds")
        }
        Command::Filter { file, categories } => {
            let text = read_input(&file)?;
            pipeline::filter_document(&text, &origin(&file), &categories, settings.pretty)
                .context("Failed to filter feed")
        }
    }
}

fn or_default(urls: Vec<String>, default: &str) -> Vec<String> {
    if urls.is_empty() {
        vec![default.to_string()]
    } else {
        urls
    }
}

fn origin(path: &Path) -> String {
    if path == Path::new("-") {
        "standard input".to_string()
    } else {
        path.display().to_string()
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read standard input")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))
    }
}
