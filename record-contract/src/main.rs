use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use record_contract::{
    cli::{Cli, Mode},
    client,
    config::NodeConfig,
    host::Host,
    store::FileStore,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.mode {
        Mode::Serve(args) => {
            let config = NodeConfig::from(args);
            let store = FileStore::new(&config.data_dir)?;
            info!(
                data_dir = %store.base_dir().display(),
                read_only = config.read_only,
                peers = config.peers.len(),
                "opened record store"
            );

            let host = Host::bind(config).await?;
            let addr = host.local_addr()?;
            println!("listening on {addr}");
            if let Err(err) = host.run_until_ctrl_c(store).await {
                warn!("host exited with error: {err:?}");
                return Err(err);
            }
        }
        Mode::Send(args) => {
            let response = client::send_input(args.server, &args.command).await?;
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}
