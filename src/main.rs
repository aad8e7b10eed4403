// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, set up logging, hand off to the resolver.
// - The token is the only thing written to stdout, so the tool composes with
//   `$(ghauth myapp)` in scripts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ghauth::cache::TokenCache;
use ghauth::resolve::{TokenResolver, TokenSource};
use ghauth::ui::{print_error, print_notice, TerminalPrompter};
use ghauth::Settings;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "ghauth", version)]
#[command(about = "Obtain and cache a personal API access token")]
struct Cli {
    /// Application name; labels the remote token and names the cache file
    app: String,

    /// Permission scope to request (repeatable, or comma separated)
    #[arg(short, long = "scope", value_delimiter = ',')]
    scopes: Vec<String>,

    /// REST API base URL [env: GHAUTH_API_URL]
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding the token file [env: GHAUTH_CACHE_DIR]
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Ignore any cached token and ask the service again
    #[arg(long)]
    no_cache_read: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;

    let mut settings = Settings::from_env();
    if let Some(url) = &cli.api_url {
        settings = settings.with_api_url(url);
    }
    if let Some(dir) = cli.cache_dir {
        settings = settings.with_cache_dir(dir);
    }
    let cache_path = TokenCache::for_app(&settings.cache_dir, cli.app.trim())
        .path()
        .to_path_buf();

    let mut resolver =
        TokenResolver::new(settings, TerminalPrompter::new()).skip_cache_read(cli.no_cache_read);
    let token = resolver
        .resolve(&cli.app, &cli.scopes)
        .with_context(|| format!("Failed to obtain a token for {}", cli.app))?;

    print_notice(&source_notice(token.source, &cache_path));
    println!("{}", token.value);
    Ok(())
}

/// One stderr line saying where the token came from.
fn source_notice(source: TokenSource, cache_path: &Path) -> String {
    match source {
        TokenSource::Cache => format!("Using cached token from {}", cache_path.display()),
        TokenSource::Found => {
            format!("Reusing existing token, cached in {}", cache_path.display())
        }
        TokenSource::Created => {
            format!("Created a new token, cached in {}", cache_path.display())
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;
    Ok(())
}
