use std::path::PathBuf;

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flagshift_core::{MigrationConfig, MigrationError, Orchestrator, OutputMode};

fn cli() -> Command {
    Command::new("flagshift")
        .version(flagshift_core::VERSION)
        .about("Migrate Statsig feature flag usage to LaunchDarkly")
        .arg(
            Arg::new("root")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Project root to migrate"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: <root>/flagshift.toml if present)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Write the summary only, leave sources untouched"),
        )
        .arg(
            Arg::new("staging")
                .long("staging")
                .value_parser(value_parser!(PathBuf))
                .help("Write patched files under this directory instead of in place"),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .value_parser(value_parser!(PathBuf))
                .help("Summary artifact path"),
        )
        .arg(
            Arg::new("client-identifier")
                .long("client-identifier")
                .help("Name of the LaunchDarkly client in rewritten code"),
        )
        .arg(
            Arg::new("rewrite-low-confidence")
                .long("rewrite-low-confidence")
                .action(ArgAction::SetTrue)
                .help("Also rewrite matches not tied to a Statsig import"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_parser(value_parser!(u64))
                .help("Per-file scan timeout in milliseconds"),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .value_parser(value_parser!(usize))
                .help("Files scanned concurrently"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// File config (explicit or discovered), then command line overrides
fn load_config(root: &std::path::Path, args: &ArgMatches) -> anyhow::Result<MigrationConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => MigrationConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MigrationConfig::discover(root).context("loading flagshift.toml")?,
    };

    if args.get_flag("dry-run") {
        config.dry_run = true;
    }
    if args.get_flag("rewrite-low-confidence") {
        config.rewrite_low_confidence = true;
    }
    if let Some(dir) = args.get_one::<PathBuf>("staging") {
        config.output = OutputMode::Staging(dir.clone());
    }
    if let Some(path) = args.get_one::<PathBuf>("summary") {
        config.summary_path = path.clone();
    }
    if let Some(identifier) = args.get_one::<String>("client-identifier") {
        config.client_identifier = identifier.clone();
    }
    if let Some(ms) = args.get_one::<u64>("timeout-ms") {
        config.file_timeout_ms = *ms;
    }
    if let Some(jobs) = args.get_one::<usize>("jobs") {
        config.max_parallel_files = *jobs;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(&root, &matches)?;
    let orchestrator = Orchestrator::for_root(config, &root)
        .with_context(|| format!("preparing migration of {}", root.display()))?;

    let cancel = orchestrator.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let result = match orchestrator.run().await {
        Ok(result) => result,
        Err(MigrationError::Cancelled) => {
            eprintln!("Migration cancelled; no files were written.");
            std::process::exit(130);
        }
        Err(err) => return Err(err).context("migration failed"),
    };

    let report = &result.report;
    println!("Migration summary for {}", root.display());
    println!("  Total items:   {}", report.total);
    println!("  Migrated:      {}", report.migrated.len());
    println!("  Blocked:       {}", report.blocked.len());
    println!("  Failed:        {}", report.failed.len());
    println!("  Files written: {}", result.files_written.len());
    println!("  Summary:       {}", result.summary_path.display());
    if !report.next_steps.is_empty() {
        println!();
        println!("Next steps:");
        for step in &report.next_steps {
            println!("  - {step}");
        }
    }
    Ok(())
}
