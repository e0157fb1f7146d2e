//! regexfs - Mount a directory read-only with entries renamed by regex rules.
//!
//! Usage: regexfs <SOURCE> <MOUNTPOINT> --regex '(.*)\.txt$:$1.md'

use anyhow::{Context, Result};
use clap::Parser;
use regexfs_core::{Mirror, PathCache, Rule, RuleTable};
use regexfs_fuse::{MountConfig, RegexFS};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "regexfs")]
#[command(about = "Mount a directory read-only, renaming files through regex rules")]
#[command(version)]
struct Cli {
    /// Directory to mirror
    source: PathBuf,

    /// Mountpoint for the filesystem
    mountpoint: PathBuf,

    /// Rules as `pattern:template[;template...]`, separated by `|`
    #[arg(short, long, env = "REGEXFS_RULES")]
    regex: Option<String>,

    /// A single rule; may be repeated
    #[arg(long = "rule", value_name = "RULE")]
    rules: Vec<String>,

    /// File with one rule per line (`#` starts a comment line)
    #[arg(long)]
    rules_file: Option<PathBuf>,

    /// Attribute and listing cache TTL in milliseconds
    #[arg(long, default_value_t = 1000)]
    attr_ttl_ms: u64,

    /// Negative lookup cache TTL in milliseconds (0 disables it)
    #[arg(long, default_value_t = 500)]
    negative_ttl_ms: u64,

    /// Disable the virtual-to-real path cache
    #[arg(long)]
    no_cache: bool,

    /// Unmount automatically when the process exits
    #[arg(long)]
    auto_unmount: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let rules = load_rules(&cli)?;

    // Validate paths
    let source = cli
        .source
        .canonicalize()
        .with_context(|| format!("Source path does not exist: {}", cli.source.display()))?;
    if !source.is_dir() {
        anyhow::bail!("Source is not a directory: {}", source.display());
    }
    if !cli.mountpoint.exists() {
        anyhow::bail!("Mountpoint does not exist: {}", cli.mountpoint.display());
    }

    let config = MountConfig::with_ttl(
        Duration::from_millis(cli.attr_ttl_ms),
        Duration::from_millis(cli.negative_ttl_ms),
    )
    .path_cache(!cli.no_cache)
    .auto_unmount(cli.auto_unmount);

    info!(
        source = %source.display(),
        mount = %cli.mountpoint.display(),
        rules = rules.len(),
        "Mounting mirror"
    );

    let cache = config.path_cache.then(|| Arc::new(PathCache::new()));
    let mirror = Mirror::with_cache(&source, rules, cache);
    let fs = RegexFS::new(mirror, &config);

    mount_and_wait(&cli, &source, &config, fs)
}

/// Collects rules from `--regex`, then `--rule`, then `--rules-file`.
fn load_rules(cli: &Cli) -> Result<RuleTable> {
    let mut table = RuleTable::default();

    if let Some(config) = &cli.regex {
        table.extend(RuleTable::parse(config).context("Invalid --regex rules")?);
    }
    for rule in &cli.rules {
        table.push(Rule::parse(rule).with_context(|| format!("Invalid rule: {rule}"))?);
    }
    if let Some(path) = &cli.rules_file {
        table.extend(RuleTable::load(path).context("Invalid rules file")?);
    }

    if table.is_empty() {
        anyhow::bail!("No rules given; use --regex, --rule or --rules-file");
    }
    Ok(table)
}

/// Mount the filesystem and wait for Ctrl+C.
fn mount_and_wait(cli: &Cli, source: &std::path::Path, config: &MountConfig, fs: RegexFS) -> Result<()> {
    let mut options = vec![
        fuser::MountOption::FSName(format!("regexfs:{}", source.display())),
        fuser::MountOption::Subtype("regexfs".to_string()),
        fuser::MountOption::RO,
        fuser::MountOption::DefaultPermissions,
    ];
    if config.auto_unmount {
        options.push(fuser::MountOption::AutoUnmount);
    }

    // Set up channel for signal handling
    let (tx, rx) = mpsc::channel::<()>();

    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    info!("Mounting filesystem (press Ctrl+C to unmount)");

    let session = fuser::spawn_mount2(fs, &cli.mountpoint, &options).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    info!("Filesystem mounted at {}", cli.mountpoint.display());

    match rx.recv() {
        Ok(()) => {
            info!("Received interrupt signal, unmounting...");
        }
        Err(_) => {
            warn!("Signal channel closed unexpectedly");
        }
    }

    drop(session);
    info!("Filesystem unmounted");
    Ok(())
}
