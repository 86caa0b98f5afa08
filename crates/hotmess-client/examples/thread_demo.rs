//! Two sessions on one in-memory backend trading messages.
//!
//! Run with `cargo run -p hotmess-client --example thread_demo`.
//! Set `RUST_LOG` to adjust verbosity.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use hotmess_backend::MemoryBackend;
use hotmess_client::{SessionConfig, ThreadEvent, ThreadSession};
use hotmess_shared::{ThreadKind, UserId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("thread_demo=info,hotmess_client=debug,info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    tracing::info!(thread = %thread, "thread created");

    let alice = UserId(Uuid::new_v4());
    let bob = UserId(Uuid::new_v4());

    let (alice_session, _alice_events) = ThreadSession::open(
        backend.clone(),
        ThreadKind::Connect,
        thread,
        alice,
        SessionConfig::default(),
    )
    .await?;
    let (bob_session, mut bob_events) = ThreadSession::open(
        backend.clone(),
        ThreadKind::Connect,
        thread,
        bob,
        SessionConfig::default(),
    )
    .await?;

    alice_session.send("anyone heading to the arches tonight?")?;
    drain_events("bob", &mut bob_events).await;

    bob_session.send("on the dlr, twenty minutes out")?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("-- transcript --");
    for message in alice_session.messages() {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%H:%M:%S"),
            message.sender_id.short(),
            message.body
        );
    }

    backend.close_thread(ThreadKind::Connect, thread)?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    match alice_session.send("one more thing") {
        Err(e) => tracing::info!(error = %e, "composer gated"),
        Ok(_) => tracing::warn!("composer should have been gated"),
    }

    Ok(())
}

async fn drain_events(who: &str, events: &mut tokio::sync::mpsc::Receiver<ThreadEvent>) {
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(200), events.recv()).await
    {
        tracing::info!(session = who, event = ?event, "event");
    }
}
