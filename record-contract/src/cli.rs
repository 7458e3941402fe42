use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_ROUND_INTERVAL_MS, NodeConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Host the record contract, accepting users over local TCP.
    Serve(ServeArgs),
    /// Send one JSON command to a running host and print the response.
    Send(SendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address to accept users on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Directory holding one `<uri>.log` file per record.
    #[arg(long, default_value = "records")]
    pub data_dir: PathBuf,

    /// Run every round in read-only mode.
    #[arg(long)]
    pub read_only: bool,

    /// Time between rounds, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_ROUND_INTERVAL_MS)]
    pub round_interval_ms: u64,

    /// Trusted peer address. Repeat for several peers.
    #[arg(long = "peer")]
    pub peers: Vec<String>,
}

impl From<ServeArgs> for NodeConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            listen: args.listen,
            data_dir: args.data_dir,
            read_only: args.read_only,
            round_interval_ms: args.round_interval_ms,
            peers: args.peers,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Address of the host to connect to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub server: SocketAddr,

    /// The command, e.g. '{"type":"READ_RECORD","uri":"alice"}'.
    pub command: String,
}
