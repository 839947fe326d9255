mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use output::{
    CacheEntryInfo, IndexOutput, InitOutput, OutputWriter, ResolveOutput, ResolvedUri,
    WatchReadyOutput, describe,
};
use sitenow_core::{
    Algorithm, ContentHash, DEFAULT_SITE_NAME, Site, SiteConfig, Store,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// sitenow - serve a directory through a content-addressed CDN
#[derive(Parser)]
#[command(name = "sitenow")]
#[command(about = "Serve a directory through a content-addressed CDN", long_about = None)]
#[command(version)]
struct Cli {
    /// Blob store directory (defaults to SITENOW_STORE env var or ./.sitenow-store)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Clone)]
struct SiteArgs {
    /// Directory to serve
    #[arg(default_value = ".")]
    folder: PathBuf,

    /// Site name, lowercase letters and digits
    #[arg(long, default_value = DEFAULT_SITE_NAME)]
    name: String,

    /// CDN prefix for fingerprinted files
    #[arg(long)]
    cdn_base: Option<String>,

    /// Hide entries excluded by .gitignore, .ignore and dotfile rules
    #[arg(long)]
    respect_ignore: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new blob store
    Init,

    /// Preprocess a directory and print every cached response
    Index {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Resolve request URIs against a directory
    Resolve {
        #[command(flatten)]
        site: SiteArgs,

        /// Request URIs, e.g. / or /docs/readme.md?v=1
        #[arg(long = "uri", required = true)]
        uris: Vec<String>,

        /// Skip preprocessing so every request takes the filesystem path
        #[arg(long)]
        cold: bool,
    },

    /// Preprocess a directory and keep the cache in sync with changes
    Watch {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Output blob content to stdout
    Cat {
        /// Fingerprint of the blob
        hash: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let output = OutputWriter::new(cli.json);

    // Determine store root: CLI arg > SITENOW_STORE env var > ./.sitenow-store default
    let store_root = cli
        .store
        .or_else(|| std::env::var("SITENOW_STORE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./.sitenow-store"));

    let result = match cli.command {
        Commands::Init => cmd_init(&store_root, &output),
        Commands::Index { site } => cmd_index(&store_root, &site, &output).await,
        Commands::Resolve { site, uris, cold } => {
            cmd_resolve(&store_root, &site, &uris, cold, &output).await
        }
        Commands::Watch { site } => cmd_watch(&store_root, &site, &output).await,
        Commands::Cat { hash } => cmd_cat(&store_root, &hash),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output.write_error(&err, 1);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // RUST_LOG overrides the verbosity flag.
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => subscriber.try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    };
}

fn cmd_init(root: &Path, output: &OutputWriter) -> Result<()> {
    let store = Store::init(root, Algorithm::Blake3)
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    output.write(
        &InitOutput {
            success: true,
            result_code: 0,
            root: root.display().to_string(),
            algorithm: store.algorithm().as_str().to_string(),
        },
        || {
            format!(
                "Initialized sitenow store at {}\nAlgorithm: {}\n",
                root.display(),
                store.algorithm().as_str()
            )
        },
    )
}

/// Open the store and build the site described by `args`.
fn open_site(store_root: &Path, args: &SiteArgs) -> Result<Arc<Site>> {
    if !args.folder.is_dir() {
        anyhow::bail!("Not a directory: {}", args.folder.display());
    }

    // The store may live inside the served folder; never serve or watch it.
    let mut config = SiteConfig::for_name(&args.name)
        .with_context(|| format!("Bad site name: {} (use a-z and 0-9)", args.name))?
        .with_respect_ignore(args.respect_ignore)
        .with_excluded(store_root);
    if let Some(cdn_base) = &args.cdn_base {
        config = config.with_cdn_base(cdn_base.as_str());
    }

    let store = Store::open_or_init(store_root)
        .with_context(|| format!("Failed to open store at {}", store_root.display()))?;

    let site = Site::new(&args.folder, config, Arc::new(store))
        .with_context(|| format!("Failed to serve {}", args.folder.display()))?;
    Ok(Arc::new(site))
}

async fn cmd_index(store_root: &Path, args: &SiteArgs, output: &OutputWriter) -> Result<()> {
    let site = open_site(store_root, args)?;
    site.preprocess_all().await;

    let entries: Vec<CacheEntryInfo> = site
        .cache()
        .snapshot()
        .into_iter()
        .map(|(path, response)| CacheEntryInfo {
            path: path.display().to_string(),
            response,
        })
        .collect();

    let text = entries
        .iter()
        .map(|entry| format!("{} -> {}\n", entry.path, describe(&entry.response)))
        .collect::<String>();

    output.write(
        &IndexOutput {
            success: true,
            result_code: 0,
            root: site.root().display().to_string(),
            entries,
        },
        || text,
    )
}

async fn cmd_resolve(
    store_root: &Path,
    args: &SiteArgs,
    uris: &[String],
    cold: bool,
    output: &OutputWriter,
) -> Result<()> {
    let site = open_site(store_root, args)?;
    if !cold {
        site.preprocess_all().await;
    }

    let mut results = Vec::with_capacity(uris.len());
    for uri in uris {
        let response = site.handle(uri).await;
        results.push(ResolvedUri {
            uri: uri.clone(),
            response,
        });
    }

    let text = results
        .iter()
        .map(|r| format!("{} -> {}\n", r.uri, describe(&r.response)))
        .collect::<String>();

    output.write(
        &ResolveOutput {
            success: true,
            result_code: 0,
            cached: !cold,
            results,
        },
        || text,
    )
}

async fn cmd_watch(store_root: &Path, args: &SiteArgs, output: &OutputWriter) -> Result<()> {
    let site = open_site(store_root, args)?;

    let (_watcher, listener) = site
        .boot()
        .await
        .with_context(|| format!("Failed to watch {}", site.root().display()))?;

    output.write(
        &WatchReadyOutput {
            success: true,
            result_code: 0,
            root: site.root().display().to_string(),
            entries: site.cache().len(),
        },
        || "/** Files finished loading. **/\n".to_string(),
    )?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");
    listener.abort();

    Ok(())
}

fn cmd_cat(root: &Path, hash_str: &str) -> Result<()> {
    let store =
        Store::open(root).with_context(|| format!("Failed to open store at {}", root.display()))?;

    let hash =
        ContentHash::from_hex(hash_str).with_context(|| format!("Invalid hash: {}", hash_str))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    store
        .cat_blob(&hash, &mut handle)
        .with_context(|| format!("Failed to output blob {}", hash))?;

    Ok(())
}
