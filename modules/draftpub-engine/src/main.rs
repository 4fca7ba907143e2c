use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use draftpub_common::{
    load_config, ClientConfig, FileConfig, JsonFileStore, SessionConfig, StateStore,
};
use draftpub_engine::session::{BrowsingContext, ContextSource, CredentialAcquirer, HarObserver};
use draftpub_engine::traits::ReqwestConnector;
use draftpub_engine::{RunController, RunOutcome, StoreObserver};
use seller_client::{ClientPacing, RandomTokens, SellerDomain, TokioSleeper};

#[derive(Parser)]
#[command(name = "draftpub", about = "Publish qualified seller-centre drafts")]
struct Cli {
    /// TOML file with [pipeline] and [client] overrides.
    #[arg(long, env = "DRAFTPUB_CONFIG")]
    config: Option<PathBuf>,

    /// State file; defaults to DRAFTPUB_STATE_PATH.
    #[arg(long)]
    state: Option<PathBuf>,

    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Switch automation on and run once against a seller domain.
    Run {
        /// Seller host, e.g. seller.shopee.ph. Falls back to the page URL,
        /// then to the persisted selection.
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        cookies_file: Option<PathBuf>,
        #[arg(long)]
        scripts_dir: Option<PathBuf>,
        /// HAR capture of seller-centre traffic.
        #[arg(long)]
        har: Option<PathBuf>,
    },
    /// Run only if the persisted state has automation switched on.
    Resume,
    /// Print the persisted state.
    Status,
    ResetStats,
    ClearLogs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let file_config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let mut session = SessionConfig::from_env();
    if let Some(state) = &cli.state {
        session.state_path = state.clone();
    }
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&session.state_path));

    match cli.command {
        Command::Status => {
            let state = store.load()?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Command::ResetStats => {
            store.reset_stats()?;
            info!("Stats reset");
            Ok(())
        }
        Command::ClearLogs => {
            store.clear_logs()?;
            info!("Logs cleared");
            Ok(())
        }
        Command::Resume => {
            let controller = build_controller(&session, &file_config, store)?;
            drive(controller, |c| Box::pin(async move { c.resume().await })).await
        }
        Command::Run {
            domain,
            cookies_file,
            scripts_dir,
            har,
        } => {
            if cookies_file.is_some() {
                session.cookie_file = cookies_file;
            }
            if scripts_dir.is_some() {
                session.scripts_dir = scripts_dir;
            }
            if har.is_some() {
                session.har_file = har;
            }

            let domain = match domain {
                Some(domain) => domain,
                None => match &session.page_url {
                    Some(url) => SellerDomain::from_page_url(url).to_string(),
                    None => store.load()?.effective_domain().to_string(),
                },
            };
            let controller = build_controller(&session, &file_config, store)?;
            let domain = controller.enable(&domain)?.to_string();
            drive(controller, move |c| {
                Box::pin(async move { c.start(&domain).await })
            })
            .await
        }
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("draftpub=info".parse()?)
        .add_directive("seller_client=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn build_controller(
    session: &SessionConfig,
    file_config: &FileConfig,
    store: Arc<dyn StateStore>,
) -> Result<Arc<RunController>> {
    let tokens = Arc::new(RandomTokens);
    let sleeper = Arc::new(TokioSleeper);

    let mut acquirer = CredentialAcquirer::new(tokens.clone());
    if let Some(har) = &session.har_file {
        acquirer = acquirer.with_observer(Arc::new(HarObserver::from_file(har)?));
    }
    let source = ContextSource::new(load_context(session)?, acquirer);

    let connector = ReqwestConnector::new(pacing(&file_config.client), sleeper.clone())
        .with_referer(session.page_url.clone());
    let observer = Arc::new(StoreObserver::new(store.clone()));

    Ok(Arc::new(RunController::new(
        Arc::new(source),
        Arc::new(connector),
        store,
        Some(observer),
        sleeper,
        tokens,
        file_config.pipeline.clone(),
    )))
}

fn load_context(session: &SessionConfig) -> Result<BrowsingContext> {
    let header = match (&session.cookie_file, &session.cookies) {
        (Some(path), _) => read_cookie_file(path)?,
        (None, Some(cookies)) => cookies.clone(),
        (None, None) => {
            warn!("No cookies configured; credentials will rely on scripts and HAR only");
            String::new()
        }
    };
    let mut context = BrowsingContext::from_cookie_header(&header);
    if let Some(dir) = &session.scripts_dir {
        context = context.load_scripts_dir(dir)?;
    }
    Ok(context)
}

fn read_cookie_file(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookie file: {}", path.display()))?;
    Ok(raw.trim().to_string())
}

fn pacing(config: &ClientConfig) -> ClientPacing {
    use std::time::Duration;
    ClientPacing {
        rate_limit_wait_min: Duration::from_millis(config.rate_limit_wait_min_ms),
        rate_limit_wait_max: Duration::from_millis(config.rate_limit_wait_max_ms),
        rate_limit_cooldown: Duration::from_millis(config.rate_limit_cooldown_ms),
        failure_cooldown: Duration::from_millis(config.failure_cooldown_ms),
    }
}

type RunFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = draftpub_engine::Result<RunOutcome>> + Send>>;

/// Runs `op` with Ctrl-C wired to the controller's stop signal.
async fn drive(
    controller: Arc<RunController>,
    op: impl FnOnce(Arc<RunController>) -> RunFuture,
) -> Result<()> {
    let on_signal = controller.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current step");
            if let Err(e) = on_signal.stop().await {
                warn!(error = %e, "Failed to record stop");
            }
        }
    });

    let outcome = op(controller).await;
    watcher.abort();

    match outcome? {
        RunOutcome::Completed(stats) => info!(%stats, "Run completed"),
        RunOutcome::Stopped(stats) => info!(%stats, "Run stopped"),
        RunOutcome::Failed { message, stats } => {
            warn!(%stats, error = message.as_str(), "Run failed");
            anyhow::bail!("run failed: {message}");
        }
        RunOutcome::AlreadyRunning => info!("A run is already active"),
        RunOutcome::NotEnabled => info!("Automation is switched off; nothing to resume"),
    }
    Ok(())
}
