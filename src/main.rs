use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamcast::{
    config::Config,
    database::{ChannelRepository, Database, SettingsRepository, UserRepository},
    services::{AuthService, ChannelService, SettingsService},
    startup,
    system::SystemProbe,
    transcoder::ProcessManager,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "streamcast")]
#[command(version)]
#[command(about = "Transcoding fleet supervisor for live HLS channels")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("streamcast={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting streamcast v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("database connection established");

    let channel_repo = ChannelRepository::new(database.pool().clone());
    let user_repo = UserRepository::new(database.pool().clone());
    let settings_repo = SettingsRepository::new(database.pool().clone());

    let probe = Arc::new(SystemProbe::new(
        config.transcoder.nvidia_smi_command.clone(),
        config.transcoder.numactl_command.clone(),
    ));
    let (cores, threads) = probe.cpu_topology();
    info!(cores, threads, "probed CPU topology");

    let transcoder = Arc::new(
        ProcessManager::new(
            config.transcoder.clone(),
            config.storage.hls_path.clone(),
            config.storage.logo_path.clone(),
            Arc::new(settings_repo.clone()),
            probe.clone(),
        )
        .await,
    );
    transcoder.set_status_writer(Arc::new(channel_repo.clone()));

    let auth = Arc::new(AuthService::new(user_repo.clone(), &config.jwt));

    startup::reconcile(&channel_repo, &settings_repo, &user_repo, &auth, &config).await?;

    let channels = Arc::new(ChannelService::new(channel_repo.clone(), transcoder.clone()));
    let settings = Arc::new(SettingsService::new(settings_repo, channel_repo));

    let state = AppState {
        channels,
        auth,
        settings,
        probe,
        storage: config.storage.clone(),
    };

    let server = WebServer::new(state, &config.server)?;
    server.serve().await
}
