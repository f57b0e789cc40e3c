use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vsphere_exporter::{config::Config, server, walker::WalkStrategy};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// vCenter address, host[:port] (overrides config)
    #[arg(long, env = "VSPHERE_HOST")]
    vsphere_host: Option<String>,

    /// Username to connect to the vCenter (overrides config)
    #[arg(long, env = "VSPHERE_USERNAME")]
    username: Option<String>,

    /// Password to connect to the vCenter (overrides config)
    #[arg(long, env = "VSPHERE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip TLS certificate verification (overrides config)
    #[arg(long)]
    insecure: Option<bool>,

    /// Port to listen on for metrics
    #[arg(short, long, env = "EXPORTER_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "EXPORTER_ADDR")]
    addr: Option<String>,

    /// Path under which to expose metrics
    #[arg(long)]
    metrics_path: Option<String>,

    /// How to partition the inventory (and label the samples)
    #[arg(long, value_enum)]
    strategy: Option<WalkStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vSphere exporter v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(host) = args.vsphere_host {
        config.vsphere.host = host;
    }
    if let Some(username) = args.username {
        config.vsphere.username = username;
    }
    if let Some(password) = args.password {
        config.vsphere.password = secrecy::SecretString::from(password);
    }
    if let Some(insecure) = args.insecure {
        config.vsphere.insecure = insecure;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(metrics_path) = args.metrics_path {
        config.server.metrics_path = metrics_path;
    }
    if let Some(strategy) = args.strategy {
        config.metrics.strategy = strategy;
    }
    config.validate()?;

    info!("Configuration loaded successfully");
    info!("vCenter host: {}", config.vsphere.host);
    if config.vsphere.insecure {
        info!("TLS certificate verification is disabled");
    }

    if let Err(e) = server::start(config).await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
