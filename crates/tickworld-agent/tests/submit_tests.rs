//! End-to-end tests: the agent client against a live world server.
//!
//! Each test binds the server router to an ephemeral local port and drives
//! it through the real HTTP client.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tickworld_agent::{AgentClient, AgentConfig, AgentError};
use tickworld_core::config::{TickConfig, WorldConfig};
use tickworld_core::signature::ActionSigner;
use tickworld_server::{AppState, build_router};
use tickworld_types::WorldId;
use tokio::net::TcpListener;

async fn spawn_server(tick_interval_ms: u64) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(TickConfig {
        tick_interval_ms,
        execution_timeout_ms: None,
    }));
    state
        .create_world(WorldConfig {
            world_id: String::from("arena"),
            grid_size: 10,
            systems: vec![String::from("AgentRegistry"), String::from("Movement")],
        })
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

fn client(addr: SocketAddr, world: &str, seed: u8) -> AgentClient {
    AgentClient::new(
        ActionSigner::from_secret([seed; 32]),
        WorldId::from(world),
        &format!("http://{addr}"),
    )
}

#[tokio::test]
async fn join_then_move_are_queued_in_order() {
    let (addr, state) = spawn_server(60_000).await;
    let agent = client(addr, "arena", 1);

    let first = agent.join(2, 3).await.unwrap();
    assert!(first.queued);
    assert_eq!(first.queue_size, 1);
    assert_eq!(first.next_tick, 1);

    let second = agent.move_by(1, 0).await.unwrap();
    assert_eq!(second.queue_size, 2);

    let world = state.world("arena").await.unwrap();
    assert_eq!(world.scheduler.queue_size(), 2);
    state.shutdown().await;
}

#[tokio::test]
async fn unknown_world_surfaces_server_error() {
    let (addr, state) = spawn_server(60_000).await;
    let agent = client(addr, "elsewhere", 1);

    let err = agent.join(0, 0).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Rejected { status: 404, ref message } if message.contains("elsewhere")
    ));
    state.shutdown().await;
}

#[tokio::test]
async fn same_key_across_runs_keeps_submitting() {
    let (addr, state) = spawn_server(20).await;
    let secret = ActionSigner::from_secret([5; 32]).secret_hex();
    let config = AgentConfig::from_lookup(|name| match name {
        "TICKWORLD_SERVER_URL" => Some(format!("http://{addr}")),
        "TICKWORLD_WORLD_ID" => Some(String::from("arena")),
        "TICKWORLD_AGENT_KEY" => Some(secret.clone()),
        _ => None,
    });
    let run = |config: &AgentConfig| {
        let (signer, _) = config.signer().unwrap();
        AgentClient::with_start_nonce(
            signer,
            config.world_id().unwrap(),
            &config.server_url,
            config.start_nonce().unwrap(),
        )
    };

    run(&config).join(0, 0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A later run with the same key, after the first nonce was committed.
    let receipt = run(&config).move_by(1, 0).await.unwrap();
    assert!(receipt.queued);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let world = state.world("arena").await.unwrap();
    assert_eq!(world.scheduler.committed_nonce_count(), 2);
    state.shutdown().await;
}

#[tokio::test]
async fn reused_start_nonce_is_rejected_after_tick() {
    let (addr, state) = spawn_server(20).await;
    client(addr, "arena", 5).join(0, 0).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let restarted = client(addr, "arena", 5);
    let err = restarted.join(0, 0).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Rejected { status: 400, ref message } if message.contains("duplicate nonce 0")
    ));
    state.shutdown().await;
}

#[tokio::test]
async fn unreachable_server_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, "arena", 1).join(0, 0).await.unwrap_err();
    assert!(matches!(err, AgentError::Request(_)));
}
