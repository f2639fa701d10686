//! Helpers shared by the integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use sprite_shared::{
    net::{PubSocket, SubSocket},
    sync::{SyncChannel, TickOutcome},
    wire::{SyncSnapshot, WireFormat},
};

static NEXT_FILE: AtomicU32 = AtomicU32::new(0);

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A fresh path under the system temp dir ending in `file_name`. The file
/// does not exist yet.
pub fn temp_path(file_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sprite_tests_{}_{}",
        std::process::id(),
        NEXT_FILE.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir.join(file_name)
}

/// Binds a publisher on an ephemeral localhost port and connects one
/// subscriber to it.
pub async fn connected_pair(topic: &str) -> anyhow::Result<(SyncChannel, SyncChannel)> {
    let socket = PubSocket::bind("127.0.0.1:0").await?;
    let addr = socket
        .local_addr()
        .ok_or_else(|| anyhow::anyhow!("publisher has no address"))?;
    let sub = SubSocket::connect(&addr.to_string(), topic).await?;
    Ok((
        SyncChannel::publisher(socket, WireFormat::V1, topic),
        SyncChannel::subscriber(sub, WireFormat::V1),
    ))
}

/// Publishes `snapshot` every few milliseconds until the subscriber applies
/// something, then returns what it applied.
///
/// Copies still in flight when the first one lands are drained before
/// returning, so the subscriber starts the caller's next step with an empty
/// queue.
pub async fn publish_until_applied(
    publisher: &mut SyncChannel,
    subscriber: &mut SyncChannel,
    snapshot: SyncSnapshot,
) -> anyhow::Result<SyncSnapshot> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let mut local = snapshot;
    let mut remote = SyncSnapshot::default();
    loop {
        publisher.tick(&mut local);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let TickOutcome::Applied { .. } = subscriber.tick(&mut remote) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            subscriber.tick(&mut remote);
            return Ok(remote);
        }
        anyhow::ensure!(
            tokio::time::Instant::now() < deadline,
            "subscriber never received a snapshot"
        );
    }
}

/// Polls `subscriber` until a tick returns something other than `Idle`.
pub async fn next_outcome(
    subscriber: &mut SyncChannel,
    state: &mut SyncSnapshot,
) -> anyhow::Result<TickOutcome> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let outcome = subscriber.tick(state);
        if outcome != TickOutcome::Idle {
            return Ok(outcome);
        }
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "no traffic");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
