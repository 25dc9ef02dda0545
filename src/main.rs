use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use probevolve::config::{AppConfig, ConfigManager};
use probevolve::data::score_as_percentage;
use probevolve::engines::generation::ConsoleProgressCallback;
use probevolve::engines::probe::HttpFetcher;
use probevolve::Search;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "probevolve")]
#[command(about = "Evolves random probe generators towards paths that resolve on a target")]
struct Cli {
    /// TOML config file; values from it are overridden by PROBEVOLVE__* env vars and flags
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the effective configuration to this file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Target url; `^` marks where the generated piece goes
    #[arg(short, long)]
    url: Option<String>,
    /// Raw HTTP request template containing a `^` marker
    #[arg(short, long)]
    request_file: Option<PathBuf>,
    /// Only report outcomes containing one of these keywords (one per line)
    #[arg(short, long)]
    keyword_file: Option<PathBuf>,

    #[arg(short = 'g', long)]
    population_size: Option<usize>,
    /// Probes per individual per generation
    #[arg(short, long)]
    iterations: Option<usize>,
    #[arg(short = 'n', long)]
    generations: Option<usize>,
    #[arg(long)]
    mutation_rate: Option<f64>,
    /// Shortest generated piece
    #[arg(long)]
    min: Option<usize>,
    /// Longest generated piece
    #[arg(long)]
    max: Option<usize>,
    /// Milliseconds to wait before each probe
    #[arg(short, long)]
    delay: Option<u64>,
    /// Evaluate one individual at a time
    #[arg(long)]
    polite: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// Ignore the saved generation file
    #[arg(long)]
    fresh: bool,

    #[arg(short, long)]
    timeout: Option<u64>,
    #[arg(long, value_enum)]
    mode: Option<Mode>,
    #[arg(long)]
    user_agent: Option<String>,
    /// Single proxy, host:port or a full url
    #[arg(long)]
    proxy: Option<String>,
    /// File with one proxy per line
    #[arg(long)]
    proxy_list: Option<PathBuf>,
    /// Abort when the target answers 403
    #[arg(long)]
    stop_on_block: bool,
    /// Send request templates over https
    #[arg(long)]
    force_ssl: bool,
    #[arg(long)]
    insecure: bool,
    /// Exit unless traffic is routed through Tor
    #[arg(long)]
    check_tor: bool,

    #[arg(long)]
    cache_db: Option<PathBuf>,
    #[arg(long)]
    generation_file: Option<PathBuf>,
    #[arg(long)]
    score_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Report redirect locations only
    Redirect,
    /// Report page titles of 200 responses only
    Brute,
    Both,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        let search = &mut config.search;
        if let Some(v) = self.population_size {
            search.population_size = v;
        }
        if let Some(v) = self.iterations {
            search.iterations = v;
        }
        if let Some(v) = self.generations {
            search.generations = v;
        }
        if let Some(v) = self.mutation_rate {
            search.mutation_rate = v;
        }
        if let Some(v) = self.min {
            search.total_min = v;
        }
        if let Some(v) = self.max {
            search.total_max = v;
        }
        if let Some(v) = self.delay {
            search.delay_ms = v;
        }
        if self.seed.is_some() {
            search.seed = self.seed;
        }
        search.polite |= self.polite;
        search.fresh |= self.fresh;

        let target = &mut config.target;
        if self.url.is_some() || self.request_file.is_some() {
            target.url = self.url;
            target.request_file = self.request_file;
        }
        if self.keyword_file.is_some() {
            target.keyword_file = self.keyword_file;
        }

        let fetch = &mut config.fetch;
        if let Some(v) = self.timeout {
            fetch.timeout_ms = v;
        }
        if let Some(mode) = self.mode {
            fetch.redirect_mode = matches!(mode, Mode::Redirect | Mode::Both);
            fetch.brute_mode = matches!(mode, Mode::Brute | Mode::Both);
        }
        if self.user_agent.is_some() {
            fetch.user_agent = self.user_agent;
        }
        if self.proxy.is_some() {
            fetch.proxy = self.proxy;
        }
        if self.proxy_list.is_some() {
            fetch.proxy_list = self.proxy_list;
        }
        fetch.stop_on_block |= self.stop_on_block;
        fetch.force_ssl |= self.force_ssl;
        fetch.accept_invalid_certs |= self.insecure;
        fetch.check_tor |= self.check_tor;

        let storage = &mut config.storage;
        if let Some(v) = self.cache_db {
            storage.cache_db = v;
        }
        if let Some(v) = self.generation_file {
            storage.generation_file = v;
        }
        if let Some(v) = self.score_log {
            storage.score_log = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut cli = Cli::parse();
    let manager = ConfigManager::new();
    if let Some(path) = cli.config.take() {
        manager
            .load_layered(Some(&path))
            .with_context(|| format!("failed to load {}", path.display()))?;
    } else {
        manager.load_layered(None::<PathBuf>)?;
    }

    let write_config = cli.write_config.take();
    manager
        .update(|config| cli.apply(config))
        .context("invalid configuration")?;

    if let Some(path) = write_config {
        manager.save_to_file(&path)?;
        log::info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let config = manager.get()?;
    let request_mode = config.target.request_file.is_some();
    let fetcher = HttpFetcher::new(config.fetch.clone(), request_mode)?;
    if config.fetch.check_tor {
        fetcher.check_tor().await.context("Tor check failed, terminating")?;
    }
    let progress = ConsoleProgressCallback::new(request_mode);
    let iterations = config.search.iterations;

    let summary = Search::new(config, Arc::new(fetcher), Arc::new(progress))?
        .run()
        .await?;

    log::info!(
        "Finished {} generations with {} hits",
        summary.generations,
        summary.total_hits
    );
    if let Some(best) = summary.best {
        log::info!(
            "Best individual {} {} scored {}",
            best.individual.display_name(),
            best.individual,
            score_as_percentage(f64::from(best.score), iterations)
        );
    }
    Ok(())
}
