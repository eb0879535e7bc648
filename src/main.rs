mod avatar;
mod candidate;
mod config;
mod debounce;
mod flag;
mod lookup;
mod provider;
mod resolver;
mod selection;
mod session;
mod ui;
mod zones;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use avatar::{AvatarCache, AvatarField, AvatarUpdate, HttpAvatarFetch, PhotoSource};
use config::Config;
use lookup::OpenMeteo;
use provider::CandidateProvider;
use resolver::{CandidateResolver, ResolvedTimeZone};
use session::SearchSession;
use ui::picker::PickerCallbacks;
use zones::ZoneTables;

const LOG_ENV: &str = "TZPICK_LOG";

#[derive(Parser, Debug)]
#[command(name = "tzpick", version, about = "Find the time zone of a place, offset or abbreviation")]
struct Cli {
    /// Configuration file (defaults to <config dir>/tzpick/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init(InitArgs),
    /// List the candidates for a query
    Search(SearchArgs),
    /// Resolve one candidate of a query to a time zone
    Resolve(ResolveArgs),
    /// Pick a time zone interactively
    Pick(PickArgs),
    /// Import a social-media avatar into the local cache
    Avatar(AvatarArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Overwrite an existing file
    #[arg(long, default_value_t = false)]
    force: bool,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// City name, UTC offset (e.g. "UTC+5:30") or abbreviation (e.g. "PST")
    query: String,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    query: String,

    /// Which candidate to resolve, as listed by `search`
    #[arg(long, short = 'n', default_value_t = 0)]
    index: usize,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct PickArgs {
    /// Text to start with
    query: Option<String>,
}

#[derive(Args, Debug)]
struct AvatarArgs {
    #[arg(value_enum)]
    source: PhotoSource,

    username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Init(args) => handle_init(config_path, args),
        Command::Search(args) => handle_search(args, &config::load(config_path)?).await,
        Command::Resolve(args) => handle_resolve(args, &config::load(config_path)?).await,
        Command::Pick(args) => handle_pick(args, &config::load(config_path)?).await,
        Command::Avatar(args) => handle_avatar(args, &config::load(config_path)?).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second subscriber can only come from a test harness; keep the first.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The search core wired to the Open-Meteo backend.
struct Core {
    provider: Arc<CandidateProvider<OpenMeteo>>,
    resolver: Arc<CandidateResolver<OpenMeteo>>,
}

fn build_core(config: &Config) -> Result<Core> {
    if let Some(path) = &config.config_path {
        debug!(path = %path.display(), "loaded configuration");
    }

    let limit = config.search.result_limit;
    let zones = Arc::new(ZoneTables::with_overrides(&config.abbreviations));
    debug!(abbreviations = zones.abbreviation_count(), "zone tables ready");
    let places = OpenMeteo::new(&config.geocoding, limit).context("failed to set up place search")?;
    let geocoder = OpenMeteo::new(&config.geocoding, limit).context("failed to set up geocoding")?;

    Ok(Core {
        provider: Arc::new(CandidateProvider::new(places, zones, limit)),
        resolver: Arc::new(CandidateResolver::new(geocoder)),
    })
}

fn handle_init(explicit: Option<&Path>, args: InitArgs) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };
    config::write_default(&path, args.force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn handle_search(args: SearchArgs, config: &Config) -> Result<()> {
    let core = build_core(config)?;
    let candidates = core.provider.lookup(&args.query).await;

    // Header line, then one tab-separated row per candidate
    if candidates.is_empty() {
        println!("No candidates for \"{}\"", args.query);
        return Ok(());
    }
    println!(
        "Found {} candidate(s) for \"{}\"",
        candidates.len(),
        args.query.trim()
    );
    for (index, candidate) in candidates.iter().enumerate() {
        println!(
            "{}\t{}\t{}\t{}",
            index,
            candidate.kind(),
            candidate.title(),
            candidate.subtitle()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    #[serde(flatten)]
    zone: &'a ResolvedTimeZone,
    flag: Option<String>,
}

async fn handle_resolve(args: ResolveArgs, config: &Config) -> Result<()> {
    if args.query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let core = build_core(config)?;
    let candidates = core.provider.lookup(&args.query).await;
    let candidate = candidates.get(args.index).ok_or_else(|| {
        anyhow!(
            "no candidate #{} for \"{}\" ({} found)",
            args.index,
            args.query.trim(),
            candidates.len()
        )
    })?;

    let resolved = core.resolver.resolve(candidate).await?;
    let flag = resolved.country_code().and_then(flag::emoji);

    if args.json {
        let output = ResolveOutput {
            zone: &resolved,
            flag,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("identifier\t{}", resolved.identifier());
    println!("label\t{}", resolved.label());
    if let Some(code) = resolved.country_code() {
        match flag {
            Some(flag) => println!("country\t{} {}", code, flag),
            None => println!("country\t{}", code),
        }
    }
    Ok(())
}

async fn handle_pick(args: PickArgs, config: &Config) -> Result<()> {
    let core = build_core(config)?;
    let session = SearchSession::new(
        core.provider,
        core.resolver,
        config.search.debounce(),
        PickerCallbacks::default(),
    );

    let Some(resolved) = ui::picker::run(session, &config.keys.picker, args.query).await? else {
        bail!("no time zone selected");
    };

    let flag = resolved.country_code().and_then(flag::emoji);
    match flag {
        Some(flag) => println!("{}\t{}\t{}", resolved.identifier(), resolved.label(), flag),
        None => println!("{}\t{}", resolved.identifier(), resolved.label()),
    }
    Ok(())
}

async fn handle_avatar(args: AvatarArgs, config: &Config) -> Result<()> {
    if args.username.trim().is_empty() {
        bail!("username must not be empty");
    }

    let dir = match &config.avatar.cache_dir {
        Some(dir) => dir.clone(),
        None => AvatarCache::default_dir()?,
    };
    let cache = AvatarCache::new(dir);
    debug!(dir = %cache.dir().display(), "avatar cache");
    let fetcher = HttpAvatarFetch::new(config.geocoding.timeout())?;
    let mut field = AvatarField::new(
        Arc::new(fetcher),
        cache,
        args.source,
        config.avatar.debounce(),
    );
    field.set_username(args.username);

    match field.next().await {
        Some(AvatarUpdate::Loaded) => {
            let avatar = field
                .avatar()
                .ok_or_else(|| anyhow!("avatar import finished without a result"))?;
            println!("{}", avatar.path.display());
            Ok(())
        }
        Some(AvatarUpdate::Failed(err)) => Err(err)
            .with_context(|| format!("failed to import {} avatar", field.source())),
        None => bail!("avatar import was cancelled"),
    }
}
