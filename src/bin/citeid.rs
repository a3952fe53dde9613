use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use directories::BaseDirs;
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use citeid::cache::{CacheConfig, CacheKind};
use citeid::config::{ConfigLoader, ResolvedConfig};
use citeid::domain::Scheme;
use citeid::error::CiteIdError;
use citeid::output::JsonOutput;
use citeid::resolver::IdentifierResolver;
use citeid::schemes::Metadata;

#[derive(Parser)]
#[command(name = "citeid")]
#[command(about = "Validate and disambiguate bibliographic identifiers of citation records")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    /// Never contact registries; every well-formed identifier exists.
    #[arg(long, global = true)]
    offline: bool,

    #[arg(long, global = true)]
    cache_kind: Option<CacheKind>,

    #[arg(long, global = true)]
    cache_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve entities read as JSON lines from a file or stdin")]
    Resolve(ResolveArgs),
    #[command(about = "Validate a single identifier")]
    Validate(ValidateArgs),
    #[command(about = "Inspect or clear the validation cache")]
    Cache(CacheArgs),
}

#[derive(Args)]
struct ResolveArgs {
    input: Option<String>,
}

#[derive(Args)]
struct ValidateArgs {
    scheme: Scheme,
    id: String,

    /// Also report registry metadata.
    #[arg(long)]
    info: bool,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "List cached identifiers")]
    Keys,
    #[command(about = "Delete every cached decision")]
    Clear,
}

#[derive(Serialize)]
struct ValidateResult {
    scheme: Scheme,
    input: String,
    normalized: Option<String>,
    valid: bool,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    metadata: Metadata,
}

#[derive(Serialize)]
struct ResolveResult {
    identifiers: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CiteIdError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CiteIdError) -> u8 {
    match error {
        CiteIdError::MissingConfig
        | CiteIdError::ConfigRead(_)
        | CiteIdError::ConfigParse(_)
        | CiteIdError::InvalidConfig(_) => 2,
        CiteIdError::HttpClient(_)
        | CiteIdError::CacheFile(_)
        | CiteIdError::CacheSql(_)
        | CiteIdError::CacheRemote(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let resolver = IdentifierResolver::from_config(&config)?;

    let outcome = match cli.command {
        Commands::Resolve(args) => run_resolve(&resolver, args),
        Commands::Validate(args) => run_validate(&resolver, args),
        Commands::Cache(args) => run_cache(&resolver, args),
    };
    let persisted = resolver.managers().cache().persist();
    outcome?;
    persisted?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ResolvedConfig, CiteIdError> {
    let mut config = match ConfigLoader::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(CiteIdError::MissingConfig) => ResolvedConfig::default(),
        Err(err) => return Err(err),
    };
    if cli.offline {
        config.use_api_service = false;
    }
    if cli.cache_kind.is_some() || cli.cache_path.is_some() {
        let kind = cli.cache_kind.unwrap_or_else(|| config.cache.kind());
        let path = cli.cache_path.clone().map(Utf8PathBuf::from);
        config.cache = match kind {
            CacheKind::Memory => CacheConfig::Memory { snapshot: path },
            CacheKind::Sqlite => CacheConfig::Sqlite {
                path: Some(match path {
                    Some(path) => path,
                    None => default_cache_dir()?.join("validation.sqlite"),
                }),
            },
            CacheKind::Redis => match &config.cache {
                CacheConfig::Redis { .. } => config.cache.clone(),
                _ => {
                    return Err(CiteIdError::InvalidConfig(
                        "redis cache needs cache.redis_url in the config file".to_string(),
                    ));
                }
            },
        };
    }
    Ok(config)
}

fn default_cache_dir() -> Result<Utf8PathBuf, CiteIdError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("citeid")).ok()
        })
        .ok_or_else(|| CiteIdError::Filesystem("unable to resolve cache directory".to_string()))
}

fn run_resolve(resolver: &IdentifierResolver, args: ResolveArgs) -> miette::Result<()> {
    let reader: Box<dyn BufRead> = match args.input {
        Some(path) => Box::new(BufReader::new(File::open(&path).map_err(|err| {
            CiteIdError::Filesystem(format!("open {path}: {err}"))
        })?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let summary = resolver.resolve_lines(reader, |identifiers| {
        JsonOutput::print_line(&ResolveResult { identifiers })
            .map_err(|err| CiteIdError::Filesystem(format!("write result: {err}")))
    })?;
    info!(
        resolved = summary.resolved,
        skipped = summary.skipped,
        "resolution finished"
    );
    Ok(())
}

fn run_validate(resolver: &IdentifierResolver, args: ValidateArgs) -> miette::Result<()> {
    let manager = resolver.managers().get(args.scheme);
    let (valid, metadata) = if args.info {
        manager.is_valid_with_info(&args.id)?
    } else {
        (manager.is_valid(&args.id)?, Metadata::new())
    };
    let result = ValidateResult {
        scheme: args.scheme,
        normalized: manager.normalise(&args.id, true),
        input: args.id,
        valid,
        metadata,
    };
    JsonOutput::print_json(&result).into_diagnostic()
}

fn run_cache(resolver: &IdentifierResolver, args: CacheArgs) -> miette::Result<()> {
    let cache = resolver.managers().cache();
    match args.command {
        CacheCommand::Keys => {
            for key in cache.list_keys()? {
                println!("{key}");
            }
        }
        CacheCommand::Clear => {
            cache.delete_all()?;
        }
    }
    Ok(())
}
