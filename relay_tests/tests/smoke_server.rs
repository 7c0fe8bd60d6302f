//! Smoke test: the relay survives a connect/disconnect cycle and keeps
//! serving later clients.

use std::time::Duration;

use relay_client::RelayClient;
use relay_server::server::bind_ephemeral;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_survives_client_churn() -> anyhow::Result<()> {
    let (mut server, cfg) = bind_ephemeral().await?;
    let server_handle = tokio::spawn(async move { server.run().await });

    // First client connects and goes away without ever creating a player.
    let first = RelayClient::connect(&cfg).await?;
    drop(first);

    // Second client still gets full service.
    let mut second = RelayClient::connect(&cfg).await?;
    second.create_player().await?;
    for _ in 0..250 {
        if second.own.is_some() {
            break;
        }
        second.poll(Duration::from_millis(20)).await?;
    }
    assert!(second.own.is_some(), "expected a player-created reply");

    server_handle.abort();
    Ok(())
}
