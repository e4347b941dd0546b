//! uplinkmq – start the agent daemon *or* push a message into a running one.
//
//  $ uplinkmq start --config uplinkmq.toml
//  $ uplinkmq send 127.0.0.1:7337 event/device '{"reading": 42}' --priority high

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use uplinkmq::config::{load_config, Config};
use uplinkmq::core::message::Priority;
use uplinkmq::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "uplinkmq", version, about = "Store-and-forward QoS agent")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the agent daemon.
    Start {
        /// Path to config TOML (env UPLINKMQ_CONFIG overrides)
        #[arg(short, long, default_value = "uplinkmq.toml")]
        config: String,
    },
    /// Submit one message to a running agent.
    Send {
        /// Agent producer address (host:port)
        addr: String,
        /// Destination carried to the upstream service.
        destination: String,
        /// Message payload.
        payload: String,
        /// Priority class: low, medium, high or critical.
        #[arg(short, long, default_value = "low")]
        priority: Priority,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Start { config } => {
            let cfg_path: String = std::env::var("UPLINKMQ_CONFIG").unwrap_or(config);
            let cfg: Config = load_config(&cfg_path)?;
            uplinkmq::run(cfg).await?;
        }
        Command::Send {
            addr,
            destination,
            payload,
            priority,
        } => send(addr, destination, payload, priority).await?,
    }

    Ok(())
}

async fn send(
    addr: String,
    destination: String,
    payload: String,
    priority: Priority,
) -> anyhow::Result<()> {
    let stream = TcpStream::connect(&addr).await?;
    let (read_half, mut write_half) = stream.into_split();

    let request = json!({
        "destination": destination,
        "priority": priority,
        "payload": payload,
    });
    write_half
        .write_all(format!("{request}\n").as_bytes())
        .await?;

    let mut lines = BufReader::new(read_half).lines();
    if let Some(reply) = lines.next_line().await? {
        println!("{reply}");
    }

    Ok(())
}
