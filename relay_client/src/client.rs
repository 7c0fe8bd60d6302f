//! Client implementation.
//!
//! The client maintains:
//! - A persistent connection to the relay (handshake + events)
//! - Its own record, seeded by the server's `player-created` reply
//! - A mirror of every other client's record (`RemoteRoster`)
//!
//! Updates go out on a fixed interval and on key presses; the caller
//! drives both from its own loop.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use relay_shared::{
    config::RelayConfig,
    net::{ClientId, NetMsg, ReliableConn, PROTOCOL_VERSION},
    player::PlayerRecord,
};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{
    input::{apply_key, Key},
    interp::RemoteRoster,
};

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any server.
    Disconnected,
    /// Handshake done, own record not yet received.
    Connected,
    /// Own record received, sending updates.
    Ready,
}

/// High-level relay client.
pub struct RelayClient {
    pub client_id: ClientId,
    pub state: ClientState,
    conn: ReliableConn,

    /// Our own record; `None` until `player-created` arrives.
    pub own: Option<PlayerRecord>,
    /// Everyone else's records.
    pub remotes: RemoteRoster,
}

impl RelayClient {
    /// Connects to the relay and performs the handshake.
    pub async fn connect(cfg: &RelayConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        info!(server = %server_addr, "Connecting to relay");

        let stream = TcpStream::connect(server_addr)
            .await
            .context("tcp connect")?;
        let mut conn = ReliableConn::new(stream);

        conn.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })
        .await?;

        let client_id = match conn.recv().await? {
            NetMsg::Welcome { client_id } => client_id,
            NetMsg::Disconnect { reason } => anyhow::bail!("server refused connection: {reason}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(client_id = %client_id, "Connected to relay");

        Ok(Self {
            client_id,
            state: ClientState::Connected,
            conn,
            own: None,
            remotes: RemoteRoster::new(),
        })
    }

    /// Asks the server for our initial record.
    pub async fn create_player(&mut self) -> anyhow::Result<()> {
        self.conn.send(&NetMsg::CreatePlayer).await
    }

    /// Polls the connection for one message within the timeout.
    pub async fn poll(&mut self, timeout: Duration) -> anyhow::Result<()> {
        match self.conn.recv_timeout(timeout).await {
            Ok(Some(msg)) => self.handle_message(msg),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Connection error");
                self.state = ClientState::Disconnected;
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::PlayerCreated(record) => {
                info!(color = record.color, "Player data received");
                self.own = Some(record);
                self.state = ClientState::Ready;
            }
            NetMsg::UpdatePlayers(mapping) => {
                self.remotes.apply(self.client_id, &mapping);
            }
            NetMsg::Disconnect { reason } => {
                info!(%reason, "Disconnected from server");
                self.state = ClientState::Disconnected;
            }
            other => {
                debug!(?other, "Unhandled message");
            }
        }
    }

    /// Sends our current record as an `update-box`. A no-op until the
    /// server has created our player.
    pub async fn send_update(&mut self) -> anyhow::Result<()> {
        let Some(record) = self.own else {
            return Ok(());
        };
        self.conn.send(&NetMsg::UpdateBox(record)).await
    }

    /// Applies a key press to our record and pushes the update out
    /// immediately, independent of the fixed-rate sender.
    pub async fn press_key(&mut self, key: Key) -> anyhow::Result<()> {
        if let Some(record) = self.own.as_mut() {
            apply_key(record, key);
        }
        self.send_update().await
    }

    /// Returns the server peer address.
    pub fn server_peer(&self) -> anyhow::Result<SocketAddr> {
        self.conn.peer_addr()
    }
}
