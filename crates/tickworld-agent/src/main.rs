//! Agent binary for Tickworld.
//!
//! ```text
//! tickworld-agent address
//! tickworld-agent join X Y
//! tickworld-agent move DX DY
//! ```
//!
//! Each submission signs one action with the configured key and prints the
//! server's receipt as JSON.

use anyhow::{Context as _, bail};
use tickworld_agent::{AgentClient, AgentConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Address,
    Join { x: i64, y: i64 },
    Move { dx: i64, dy: i64 },
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let pair = |rest: &[String]| -> anyhow::Result<(i64, i64)> {
            let [a, b] = rest else {
                bail!("expected two integer arguments");
            };
            Ok((
                a.parse().with_context(|| format!("invalid integer {a:?}"))?,
                b.parse().with_context(|| format!("invalid integer {b:?}"))?,
            ))
        };

        match args.split_first() {
            Some((cmd, rest)) if cmd == "address" && rest.is_empty() => Ok(Self::Address),
            Some((cmd, rest)) if cmd == "join" => {
                let (x, y) = pair(rest)?;
                Ok(Self::Join { x, y })
            }
            Some((cmd, rest)) if cmd == "move" => {
                let (dx, dy) = pair(rest)?;
                Ok(Self::Move { dx, dy })
            }
            _ => bail!("usage: tickworld-agent <address | join X Y | move DX DY>"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let config = AgentConfig::from_env();
    let (signer, generated) = config.signer()?;
    if generated {
        warn!(
            address = %signer.address(),
            "TICKWORLD_AGENT_KEY not set, generated a throwaway identity"
        );
    }

    if command == Command::Address {
        println!("{}", signer.address());
        if generated {
            println!("{}", signer.secret_hex());
        }
        return Ok(());
    }

    let world_id = config.world_id()?;
    info!(%world_id, server = %config.server_url, address = %signer.address(), "agent ready");
    let start_nonce = config.start_nonce()?;
    let client = AgentClient::with_start_nonce(signer, world_id, &config.server_url, start_nonce);

    let receipt = match command {
        Command::Join { x, y } => client.join(x, y).await?,
        Command::Move { dx, dy } => client.move_by(dx, dy).await?,
        Command::Address => return Ok(()),
    };

    info!(
        queue_size = receipt.queue_size,
        next_tick = receipt.next_tick,
        "action queued"
    );
    println!("{}", serde_json::to_string(&receipt)?);
    Ok(())
}
