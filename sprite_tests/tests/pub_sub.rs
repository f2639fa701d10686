//! Publisher ↔ subscriber sync over real TCP sockets.

use std::time::Duration;

use sprite_demo::{app::default_entities, AppState, SpriteDemo};
use sprite_shared::{
    config::SyncConfig,
    error::NetError,
    math::IVec2,
    net::{PubSocket, MAX_FRAME_LEN},
    render::NullRenderer,
    sync::{Role, SyncChannel, TickOutcome},
    wire::{SyncSnapshot, WireFormat},
};
use sprite_tests::{connected_pair, init_tracing, next_outcome, publish_until_applied};

fn snap(x1: i32, y1: i32, x2: i32, y2: i32) -> SyncSnapshot {
    SyncSnapshot::new(IVec2::new(x1, y1), IVec2::new(x2, y2))
}

/// Literal agreed between the two roles for texture (100, 200), message (0, 0).
#[test]
fn agreed_literal_both_directions() -> anyhow::Result<()> {
    let encoded = WireFormat::V1.encode(&snap(100, 200, 0, 0))?;
    assert_eq!(encoded, "100.000 200.000 000.000 000.000");
    assert_eq!(
        WireFormat::V1.decode("100.000 200.000 000.000 000.000")?,
        snap(100, 200, 0, 0)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publisher_snapshot_reaches_subscriber() -> anyhow::Result<()> {
    init_tracing();
    let (mut publisher, mut subscriber) = connected_pair("").await?;
    let applied =
        publish_until_applied(&mut publisher, &mut subscriber, snap(100, 200, 0, 0)).await?;
    assert_eq!(applied, snap(100, 200, 0, 0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscriber_applies_latest_of_burst() -> anyhow::Result<()> {
    init_tracing();
    let (mut publisher, mut subscriber) = connected_pair("").await?;
    publish_until_applied(&mut publisher, &mut subscriber, snap(1, 1, 1, 1)).await?;

    for s in [snap(10, 10, 10, 10), snap(20, 20, 20, 20), snap(30, -30, 3, 4)] {
        let mut local = s;
        assert!(matches!(publisher.tick(&mut local), TickOutcome::Sent { .. }));
    }
    // Let all three land before the next subscriber tick.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut remote = snap(0, 0, 0, 0);
    assert_eq!(
        subscriber.tick(&mut remote),
        TickOutcome::Applied { discarded: 2 }
    );
    assert_eq!(remote, snap(30, -30, 3, 4));
    assert_eq!(subscriber.tick(&mut remote), TickOutcome::Idle);
    assert_eq!(remote, snap(30, -30, 3, 4));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_payload_over_tcp_is_absorbed() -> anyhow::Result<()> {
    init_tracing();
    let (mut publisher, mut subscriber) = connected_pair("").await?;
    let baseline =
        publish_until_applied(&mut publisher, &mut subscriber, snap(5, 6, 7, 8)).await?;

    let socket = publisher
        .pub_socket()
        .ok_or_else(|| anyhow::anyhow!("publisher channel without socket"))?;
    socket.send("1.000 2.000 3.000".into());

    let mut remote = baseline;
    assert_eq!(
        next_outcome(&mut subscriber, &mut remote).await?,
        TickOutcome::Malformed
    );
    assert_eq!(remote, baseline);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn topic_filter_over_tcp() -> anyhow::Result<()> {
    init_tracing();
    let (mut publisher, mut subscriber) = connected_pair("pos").await?;
    publish_until_applied(&mut publisher, &mut subscriber, snap(9, 9, 9, 9)).await?;

    let socket = publisher
        .pub_socket()
        .ok_or_else(|| anyhow::anyhow!("publisher channel without socket"))?;
    socket.send("chat 1 2 3 4".into());
    socket.send("position 5 6 7 8".into());
    socket.send("pos 11 12 13 14".into());

    let mut remote = snap(0, 0, 0, 0);
    assert_eq!(
        next_outcome(&mut subscriber, &mut remote).await?,
        TickOutcome::Applied { discarded: 0 }
    );
    assert_eq!(remote, snap(11, 12, 13, 14));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_payload_keeps_subscriber_connected() -> anyhow::Result<()> {
    init_tracing();
    let (mut publisher, mut subscriber) = connected_pair("").await?;
    publish_until_applied(&mut publisher, &mut subscriber, snap(1, 1, 1, 1)).await?;

    let socket = publisher
        .pub_socket()
        .ok_or_else(|| anyhow::anyhow!("publisher channel without socket"))?;
    socket.send(vec![b'7'; MAX_FRAME_LEN + 1].into());

    let mut local = snap(40, 41, 42, 43);
    assert!(matches!(publisher.tick(&mut local), TickOutcome::Sent { .. }));
    let mut remote = snap(0, 0, 0, 0);
    assert_eq!(
        next_outcome(&mut subscriber, &mut remote).await?,
        TickOutcome::Applied { discarded: 0 }
    );
    assert_eq!(remote, snap(40, 41, 42, 43));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publisher_going_away_is_not_fatal() -> anyhow::Result<()> {
    init_tracing();
    let (mut publisher, mut subscriber) = connected_pair("").await?;
    let last = publish_until_applied(&mut publisher, &mut subscriber, snap(1, 2, 3, 4)).await?;
    drop(publisher);

    let mut remote = last;
    assert_eq!(
        next_outcome(&mut subscriber, &mut remote).await?,
        TickOutcome::Disconnected
    );
    assert_eq!(remote, last);
    Ok(())
}

#[tokio::test]
async fn publisher_without_subscribers_never_blocks() -> anyhow::Result<()> {
    let mut publisher = SyncChannel::open(
        Role::Publisher,
        &SyncConfig {
            endpoint: "127.0.0.1:0".to_string(),
            ..Default::default()
        },
    )
    .await?;
    let mut local = snap(1, 2, 3, 4);
    for _ in 0..100 {
        assert_eq!(publisher.tick(&mut local), TickOutcome::NoPeers);
    }
    Ok(())
}

#[tokio::test]
async fn binding_a_taken_port_fails() -> anyhow::Result<()> {
    let first = PubSocket::bind("127.0.0.1:0").await?;
    let addr = first
        .local_addr()
        .ok_or_else(|| anyhow::anyhow!("publisher has no address"))?;
    let err = PubSocket::bind(&addr.to_string()).await.err();
    assert!(matches!(err, Some(NetError::Bind { .. })));
    Ok(())
}

#[tokio::test]
async fn subscriber_open_without_publisher_fails() -> anyhow::Result<()> {
    let probe = PubSocket::bind("127.0.0.1:0").await?;
    let addr = probe
        .local_addr()
        .ok_or_else(|| anyhow::anyhow!("publisher has no address"))?;
    drop(probe);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let cfg = SyncConfig {
        endpoint: addr.to_string(),
        ..Default::default()
    };
    let err = SyncChannel::open(Role::Subscriber, &cfg).await.err();
    assert!(matches!(err, Some(NetError::Connect { .. })));
    Ok(())
}

/// Two demo loops over TCP: the subscriber's texture ends where the
/// publisher's is.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn demo_loops_converge() -> anyhow::Result<()> {
    init_tracing();
    let (publisher, subscriber) = connected_pair("").await?;
    let mut pub_demo = SpriteDemo::new(
        AppState::from_entities(default_entities()),
        publisher,
        Box::new(NullRenderer),
    );
    let mut sub_demo = SpriteDemo::new(
        AppState::from_entities(default_entities()),
        subscriber,
        Box::new(NullRenderer),
    );

    for _ in 0..30 {
        pub_demo.step();
        tokio::time::sleep(Duration::from_millis(5)).await;
        sub_demo.step();
    }
    // Stop moving, then let the last snapshot through.
    let mut pub_demo = pub_demo.with_input(None);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while sub_demo.state.texture.position != pub_demo.state.texture.position {
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "subscriber never caught up");
        pub_demo.step();
        tokio::time::sleep(Duration::from_millis(5)).await;
        sub_demo.step();
    }
    assert_eq!(sub_demo.state.message.position, pub_demo.state.message.position);
    assert!(sub_demo.stats().applied > 0);
    Ok(())
}
