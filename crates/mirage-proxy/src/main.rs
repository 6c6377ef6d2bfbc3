use clap::Parser;
use mirage_proxy::config::Config;
use mirage_proxy::proxy::ProxyServer;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mirage", about = "HTTP(S) service-virtualization proxy")]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
    /// Listen port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
    /// Simulation document to preload (overrides the config file)
    #[arg(short, long)]
    simulation: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(simulation) = args.simulation {
        config.simulation_file = Some(simulation.into());
    }

    let server = ProxyServer::new(config)?;
    server.run().await
}
