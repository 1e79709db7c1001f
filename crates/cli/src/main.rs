use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use subgather_core::storage::{self, AppConfig};
use subgather_core::verify::parse_proxy_list;
use subgather_core::{
    run_pipeline_with, AggregateStyle, ProbeSettings, RunOptions, RunSummary, StopReason,
    Target, Workspace,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod prompt;

#[derive(Parser)]
#[command(
    name = "subgather",
    author,
    version,
    about = "Collect, deduplicate and verify proxy subscription links",
    long_about = None
)]
struct Cli {
    /// Client format to write: nekobox or singbox. Prompted for when omitted.
    #[arg(long)]
    target: Option<Target>,

    /// Skip HTTP verification and keep every new subscription.
    #[arg(long)]
    no_verify: bool,

    /// Concurrent verification workers.
    #[arg(long)]
    workers: Option<NonZeroUsize>,

    /// Comma separated proxy URLs, tried after direct requests fail.
    #[arg(long)]
    proxies: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Record style for subscribes.yaml: plain or enriched.
    #[arg(long)]
    style: Option<AggregateStyle>,

    /// Directory to scan and write. Defaults to the current directory.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// App config file (defaults to ~/.config/subgather/app.yaml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run(Cli::parse()).await {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).await?;
    let workspace = match &cli.dir {
        Some(dir) => Workspace::new(dir.clone()),
        None => Workspace::current()?,
    };

    let target = match cli.target {
        Some(target) => target,
        None => prompt::ask_target(&mut io::stdin().lock(), &mut io::stdout())?,
    };
    let verify = !cli.no_verify;

    let mut probe = ProbeSettings::from_config(&config);
    if let Some(secs) = cli.timeout_secs {
        probe.timeout = Duration::from_secs(secs);
    }
    let workers = cli.workers.or(config.workers);
    let proxies = match &cli.proxies {
        Some(raw) => Some(parse_proxy_list(raw)),
        None if !config.proxies.is_empty() => Some(config.proxies.clone()),
        None => None,
    };

    let options = RunOptions {
        target,
        verify,
        style: cli.style.or(config.aggregate_style).unwrap_or_default(),
    };
    // Anything still missing is asked for only once there is something to verify.
    let summary = run_pipeline_with(&workspace, &options, |pending| {
        let mut input = io::stdin().lock();
        let mut output = io::stdout();
        writeln!(output, "{pending} new subscription(s) to verify")?;
        probe.workers = match workers {
            Some(workers) => workers.get(),
            None => prompt::ask_workers(&mut input, &mut output, probe.workers)?,
        };
        probe.proxies = match proxies {
            Some(proxies) => proxies,
            None => prompt::ask_proxies(&mut input, &mut output)?,
        };
        Ok(probe)
    })
    .await?;
    print_summary(&mut io::stdout(), &options, &summary)?;
    Ok(())
}

async fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match storage::default_config_path() {
            Some(path) => path,
            None => return Ok(AppConfig::default()),
        },
    };
    storage::load_app_config(&path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn print_summary<W: Write>(
    out: &mut W,
    options: &RunOptions,
    summary: &RunSummary,
) -> io::Result<()> {
    let extract = &summary.extract;
    writeln!(
        out,
        "extracted {} entries (text: {}, json: {}, yaml: {}; skipped files: {})",
        extract.total_entries(),
        extract.text.entries,
        extract.json.entries,
        extract.yaml.entries,
        extract.skipped_files()
    )?;

    match summary.stopped {
        Some(StopReason::NothingExtracted) => {
            return writeln!(out, "no subscriptions found, nothing written");
        }
        Some(StopReason::NothingNew) => {
            return writeln!(
                out,
                "all {} subscriptions are already known, nothing written",
                summary.dedup.already_known
            );
        }
        None => {}
    }

    writeln!(
        out,
        "dropped {} duplicates and {} already known",
        summary.dedup.duplicates, summary.dedup.already_known
    )?;
    if options.verify {
        writeln!(
            out,
            "verified: {} alive, {} unreachable",
            summary.accepted.len(),
            summary.rejected.len()
        )?;
        for outcome in &summary.rejected {
            writeln!(out, "  {} ({}): {}", outcome.entry.name, outcome.entry.url, outcome.reason)?;
        }
    }
    if summary.report_failures > 0 {
        writeln!(out, "{} report(s) could not be written", summary.report_failures)?;
    }
    writeln!(
        out,
        "{}: {} written, {} failed",
        options.target, summary.write.written, summary.write.failed
    )
}
