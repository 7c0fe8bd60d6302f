//! Full socket-based integration tests for client ↔ relay communication.

use std::time::Duration;

use relay_client::RelayClient;
use relay_server::server::bind_ephemeral;
use relay_shared::math::{Quat, Vec3};
use relay_shared::net::{
    decode_from_bytes, encode_to_bytes, ClientId, NetMsg, ReliableConn, PROTOCOL_VERSION,
};
use relay_shared::player::{PlayerRecord, COLOR_MAX, SPAWN_POSITION};
use tokio::net::TcpStream;

/// Unit-style test: protocol messages roundtrip correctly.
#[test]
fn protocol_messages_roundtrip() -> anyhow::Result<()> {
    let hello = NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&hello)?)?, hello);

    let welcome = NetMsg::Welcome {
        client_id: ClientId(1),
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&welcome)?)?, welcome);

    let create = NetMsg::CreatePlayer;
    assert_eq!(decode_from_bytes(&encode_to_bytes(&create)?)?, create);

    Ok(())
}

/// Polls a client until the condition holds or a deadline expires.
async fn poll_until<F>(client: &mut RelayClient, what: &str, cond: F) -> anyhow::Result<()>
where
    F: Fn(&RelayClient) -> bool,
{
    for _ in 0..250 {
        if cond(client) {
            return Ok(());
        }
        client.poll(Duration::from_millis(20)).await?;
    }
    anyhow::bail!("timed out waiting for: {what}")
}

/// The two-client lifecycle: connect, create, update, second client sees
/// the update, disconnect removes the entry from broadcasts.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_client_relay_scenario() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let (mut server, cfg) = bind_ephemeral().await?;
    let server_handle = tokio::spawn(async move { server.run().await });

    // Client A connects and requests its record.
    let mut a = RelayClient::connect(&cfg).await?;
    a.create_player().await?;
    poll_until(&mut a, "A's player-created reply", |c| c.own.is_some()).await?;

    let own = a.own.unwrap();
    assert_eq!(own.position, SPAWN_POSITION);
    assert_eq!(own.quaternion, Quat::IDENTITY);
    assert!(own.color <= COLOR_MAX);

    // A moves to (1, 2, 3).
    let moved = PlayerRecord {
        position: Vec3::new(1.0, 2.0, 3.0),
        ..own
    };
    a.own = Some(moved);
    a.send_update().await?;

    // Client B connects and should see A at the updated position.
    let mut b = RelayClient::connect(&cfg).await?;
    b.create_player().await?;
    poll_until(&mut b, "B's player-created reply", |c| c.own.is_some()).await?;

    let a_id = a.client_id;
    poll_until(&mut b, "A visible to B", |c| c.remotes.contains(a_id)).await?;
    assert_eq!(
        b.remotes.get(a_id).unwrap().position,
        Vec3::new(1.0, 2.0, 3.0)
    );

    // A sees B too.
    let b_id = b.client_id;
    poll_until(&mut a, "B visible to A", |c| c.remotes.contains(b_id)).await?;

    // A disconnects; B's mirror drops A's entry.
    drop(a);
    poll_until(&mut b, "A removed from broadcasts", |c| {
        !c.remotes.contains(a_id)
    })
    .await?;

    server_handle.abort();
    Ok(())
}

/// Identical updates are idempotent: the mapping an observer sees does
/// not accumulate or drift.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_update_is_idempotent() -> anyhow::Result<()> {
    let (mut server, cfg) = bind_ephemeral().await?;
    let server_handle = tokio::spawn(async move { server.run().await });

    let mut mover = RelayClient::connect(&cfg).await?;
    mover.create_player().await?;
    poll_until(&mut mover, "mover's record", |c| c.own.is_some()).await?;

    let mut observer = RelayClient::connect(&cfg).await?;
    observer.create_player().await?;
    poll_until(&mut observer, "observer's record", |c| c.own.is_some()).await?;

    let rec = PlayerRecord {
        position: Vec3::new(8.0, 8.0, 8.0),
        ..mover.own.unwrap()
    };
    mover.own = Some(rec);
    mover.send_update().await?;
    mover.send_update().await?;

    let mover_id = mover.client_id;
    poll_until(&mut observer, "mover at (8,8,8)", |c| {
        c.remotes
            .get(mover_id)
            .map(|r| r.position == Vec3::new(8.0, 8.0, 8.0))
            .unwrap_or(false)
    })
    .await?;

    assert_eq!(observer.remotes.len(), 1);
    server_handle.abort();
    Ok(())
}

/// A malformed record is rejected at the boundary: the roster keeps the
/// prior record and other clients never see the garbage.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_update_is_rejected() -> anyhow::Result<()> {
    let (mut server, cfg) = bind_ephemeral().await?;
    let server_handle = tokio::spawn(async move { server.run().await });

    let mut observer = RelayClient::connect(&cfg).await?;
    observer.create_player().await?;
    poll_until(&mut observer, "observer's record", |c| c.own.is_some()).await?;

    // Raw connection, speaking the protocol by hand.
    let stream = TcpStream::connect(&cfg.server_addr).await?;
    let mut raw = ReliableConn::new(stream);
    raw.send(&NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    })
    .await?;
    let raw_id = match raw.recv().await? {
        NetMsg::Welcome { client_id } => client_id,
        other => anyhow::bail!("expected Welcome, got {other:?}"),
    };

    // Out-of-range position must be dropped without touching the roster.
    raw.send(&NetMsg::UpdateBox(PlayerRecord {
        position: Vec3::new(1.0e9, 0.0, 0.0),
        color: 0x123456,
        quaternion: Quat::IDENTITY,
    }))
    .await?;

    // create-player forces a broadcast; the raw client must still be at
    // its default spawn.
    raw.send(&NetMsg::CreatePlayer).await?;
    poll_until(&mut observer, "raw client visible", |c| {
        c.remotes.contains(raw_id)
    })
    .await?;
    assert_eq!(observer.remotes.get(raw_id).unwrap().position, SPAWN_POSITION);

    // A well-formed update still goes through on the same connection.
    raw.send(&NetMsg::UpdateBox(PlayerRecord {
        position: Vec3::new(5.0, 5.0, 5.0),
        color: 0x123456,
        quaternion: Quat::IDENTITY,
    }))
    .await?;
    poll_until(&mut observer, "raw client at (5,5,5)", |c| {
        c.remotes
            .get(raw_id)
            .map(|r| r.position == Vec3::new(5.0, 5.0, 5.0))
            .unwrap_or(false)
    })
    .await?;

    server_handle.abort();
    Ok(())
}

/// A client announcing the wrong protocol version is refused.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn protocol_mismatch_is_refused() -> anyhow::Result<()> {
    let (mut server, cfg) = bind_ephemeral().await?;
    let server_handle = tokio::spawn(async move { server.run().await });

    let stream = TcpStream::connect(&cfg.server_addr).await?;
    let mut raw = ReliableConn::new(stream);
    raw.send(&NetMsg::Hello {
        protocol: PROTOCOL_VERSION + 1,
    })
    .await?;

    match raw.recv().await? {
        NetMsg::Disconnect { reason } => assert!(reason.contains("protocol")),
        other => anyhow::bail!("expected Disconnect, got {other:?}"),
    }

    server_handle.abort();
    Ok(())
}
