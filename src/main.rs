use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use geoprox::{
    proxy::{
        filter_by_country, Catalog, PoolStatus, ProberConfig, ProxyProber, ProxyRecord,
        ProxySelector, SelectorConfig,
    },
    proxychains::{conf_lines, Launcher, ProxychainsConf},
    ui, Error,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Geo-filtered proxy selection with a proxychains launcher
#[derive(Parser)]
#[command(name = "geoprox")]
#[command(about = "Select working proxies by country and launch applications through proxychains")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Knobs shared by every command that probes the catalog
#[derive(Args)]
struct ProbeOpts {
    /// Path to the proxy-list JSON catalog
    #[arg(long, default_value = "proxy-list/proxies.json")]
    catalog: PathBuf,

    /// Only use proxies located in this country
    #[arg(short, long)]
    country: Option<String>,

    /// Use proxies from any location without prompting
    #[arg(long)]
    any_location: bool,

    /// Stop retrying once this many working proxies are found
    #[arg(long, default_value = "5")]
    quorum: usize,

    /// Hard cap on the working pool
    #[arg(long, default_value = "10")]
    max_pool: usize,

    /// Probe rounds before giving up
    #[arg(long, default_value = "3")]
    max_rounds: u32,

    /// Pause between probe rounds in seconds
    #[arg(long, default_value = "1.0")]
    round_delay: f64,

    /// Timeout for each probe request in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Round trips slower than this fail the probe, in seconds
    #[arg(long, default_value = "1.0")]
    threshold: f64,

    /// Concurrent probes per round
    #[arg(long, default_value = "20")]
    concurrency: usize,

    /// URL fetched through each candidate proxy
    #[arg(long, default_value = "http://www.google.com")]
    probe_url: String,

    /// Show a progress bar during probe rounds
    #[arg(long)]
    progress: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    probe: ProbeOpts,

    /// Number of selected proxies written to the configuration
    #[arg(short = 'n', long, default_value = "10")]
    count: usize,

    /// Application launched through proxychains
    #[arg(long, default_value = "firefox")]
    app: String,

    /// proxychains configuration file to rewrite
    #[arg(long, default_value = "/etc/proxychains.conf")]
    conf: PathBuf,

    /// Launcher binary
    #[arg(long, default_value = "proxychains")]
    launcher: String,

    /// Fixed sampling seed for a reproducible selection
    #[arg(long)]
    seed: Option<u64>,

    /// Continue without asking when fewer proxies than the quorum work
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Select working proxies and launch an application through them
    Run(RunArgs),
    /// Probe the catalog and report the working pool, changing nothing
    Probe {
        #[command(flatten)]
        probe: ProbeOpts,
    },
    /// List countries available in the catalog
    Countries {
        /// Path to the proxy-list JSON catalog
        #[arg(long, default_value = "proxy-list/proxies.json")]
        catalog: PathBuf,
    },
    /// Restore the proxychains configuration from its backup
    Restore {
        /// proxychains configuration file to restore
        #[arg(long, default_value = "/etc/proxychains.conf")]
        conf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoprox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run(args).await?;
        }
        Commands::Probe { probe } => {
            run_probe(probe).await?;
        }
        Commands::Countries { catalog } => {
            let loaded = Catalog::load(&catalog);
            if loaded.is_empty() {
                return Err(Error::CatalogUnavailable(catalog.display().to_string()).into());
            }
            let countries = loaded.countries();
            println!(
                "{} countries across {} records:",
                countries.len(),
                loaded.len()
            );
            for country in &countries {
                let count = loaded
                    .records()
                    .iter()
                    .filter(|r| r.country == *country)
                    .count();
                println!("{:5}  {}", count, country);
            }
        }
        Commands::Restore { conf } => {
            let conf = ProxychainsConf::new(conf);
            if conf.backup_path().exists() {
                conf.restore()?;
                ui::print_success(&format!("Restored {}", conf.path().display()));
            } else {
                ui::print_warning(&format!(
                    "No backup found at {}",
                    conf.backup_path().display()
                ));
            }
        }
    }

    Ok(())
}

/// Full selection flow: probe, sample, rewrite the configuration, launch
/// the application, restore the configuration afterwards.
async fn run(args: RunArgs) -> Result<()> {
    let candidates = gather_candidates(&args.probe).await?;
    let selector = build_selector(&args.probe, args.seed);

    let report = selector.collect_pool(&candidates).await;
    if report.pool.is_empty() {
        ui::print_error(&format!(
            "No working proxies among {} candidates after {} round(s)",
            candidates.len(),
            report.rounds
        ));
        return Err(Error::NoProxiesAvailable.into());
    }

    if report.pool.len() < args.probe.quorum && !args.yes {
        if !ui::confirm_degraded(report.pool.len(), args.probe.quorum).await? {
            ui::print_info("Exiting due to insufficient proxies");
            return Ok(());
        }
    }

    let selection = selector.sample(&report.pool, args.count)?;
    if selection.is_empty() {
        return Err(Error::InvalidInput("--count must be at least 1".to_string()).into());
    }
    ui::print_success(&format!("Selected {} proxies:", selection.len()));
    ui::print_selection(&selection);

    let conf = ProxychainsConf::new(&args.conf);
    conf.backup()?;
    if let Err(err) = conf.apply(&conf_lines(&selection)) {
        if let Err(restore_err) = conf.restore() {
            ui::print_error(&format!("Restore failed: {}", restore_err));
        }
        return Err(err.into());
    }

    let launcher = Launcher::new().with_binary(args.launcher);
    let launch_result = launcher.launch(&args.app).await;
    conf.restore()?;

    match launch_result? {
        status if status.success() => {
            ui::print_success(&format!("{} exited cleanly", args.app));
        }
        status => {
            ui::print_warning(&format!("{} exited with {}", args.app, status));
        }
    }

    Ok(())
}

/// Probe-only flow: report the working pool without touching anything.
async fn run_probe(opts: ProbeOpts) -> Result<()> {
    let candidates = gather_candidates(&opts).await?;
    let selector = build_selector(&opts, None);

    let report = selector.collect_pool(&candidates).await;
    match report.status {
        PoolStatus::QuorumMet => ui::print_success(&format!(
            "{} working proxies after {} round(s)",
            report.pool.len(),
            report.rounds
        )),
        PoolStatus::RetryBudgetExhausted => ui::print_warning(&format!(
            "Only {} working proxies after {} round(s)",
            report.pool.len(),
            report.rounds
        )),
    }
    println!(
        "{} network probes sent",
        selector.prober().network_probe_count()
    );
    if !report.pool.is_empty() {
        ui::print_probe_report(&report.passes);
    }

    Ok(())
}

/// Load the catalog, settle the country filter and return the candidates.
async fn gather_candidates(opts: &ProbeOpts) -> Result<Vec<ProxyRecord>> {
    let catalog = Catalog::load(&opts.catalog);
    if catalog.is_empty() {
        return Err(Error::CatalogUnavailable(opts.catalog.display().to_string()).into());
    }
    println!(
        "Loaded {} proxies from {}",
        catalog.len(),
        opts.catalog.display()
    );

    let country = resolve_country(&catalog, opts.country.clone(), opts.any_location).await?;
    match &country {
        Some(country) => println!("Filtering proxies located in {}", country),
        None => println!("Using proxies from any location"),
    }

    let candidates = filter_by_country(catalog.records(), country.as_deref());
    println!("{} candidate proxies", candidates.len());

    Ok(candidates)
}

/// Country filter resolution: explicit flag, any-location flag, or the
/// interactive menu.
async fn resolve_country(
    catalog: &Catalog,
    country: Option<String>,
    any_location: bool,
) -> Result<Option<String>> {
    if any_location {
        return Ok(None);
    }
    if let Some(country) = country {
        return Ok(Some(country));
    }

    let countries = catalog.countries();
    if countries.is_empty() {
        // No named countries to offer; fall through to any location.
        return Ok(None);
    }
    Ok(ui::prompt_country(&countries).await?)
}

fn build_selector(opts: &ProbeOpts, seed: Option<u64>) -> ProxySelector {
    let prober = ProxyProber::with_config(
        ProberConfig::new()
            .with_probe_url(opts.probe_url.clone())
            .with_request_timeout(Duration::from_secs(opts.timeout))
            .with_liveness_threshold(Duration::from_secs_f64(opts.threshold)),
    );

    let mut config = SelectorConfig::new()
        .with_min_quorum(opts.quorum)
        .with_max_pool(opts.max_pool)
        .with_max_rounds(opts.max_rounds)
        .with_round_delay(Duration::from_secs_f64(opts.round_delay))
        .with_concurrency(opts.concurrency)
        .with_progress(opts.progress);
    if let Some(seed) = seed {
        config = config.with_sample_seed(seed);
    }

    ProxySelector::new(prober, config)
}
