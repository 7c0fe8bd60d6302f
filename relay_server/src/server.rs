//! Server implementation.
//!
//! The relay keeps one record per connected client and rebroadcasts the
//! full mapping on every mutation. One event-loop task owns the roster;
//! per-connection reader tasks translate inbound frames into roster
//! events over a channel, and per-connection writer tasks drain a
//! bounded outbox. Each event runs to completion before the next, so
//! "replace entry, broadcast" is atomic with respect to other events.
//!
//! The broadcast itself is not transactional: a closed or full outbox
//! just drops the frame (no backpressure, matching the transport's
//! fire-and-forget contract).

use anyhow::Context;
use bytes::Bytes;
use relay_shared::{
    config::RelayConfig,
    net::{encode_frame, ClientId, NetMsg, ReliableConn, ReliableListener, PROTOCOL_VERSION},
    player::PlayerRecord,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::roster::Roster;

/// Outbox capacity per client. A slow client loses frames rather than
/// stalling the relay.
const OUTBOX_CAPACITY: usize = 64;

/// Roster lifecycle events, produced by connection tasks and consumed
/// by the single event loop.
#[derive(Debug)]
enum RelayEvent {
    Connected {
        id: ClientId,
        peer: SocketAddr,
        outbox: mpsc::Sender<Bytes>,
    },
    CreatePlayer {
        id: ClientId,
    },
    UpdateBox {
        id: ClientId,
        record: PlayerRecord,
    },
    Disconnected {
        id: ClientId,
    },
    Console(String),
}

struct ClientHandle {
    peer: SocketAddr,
    outbox: mpsc::Sender<Bytes>,
}

/// Relay server.
pub struct RelayServer {
    pub cfg: RelayConfig,
    listener: ReliableListener,
    roster: Roster,
    clients: HashMap<ClientId, ClientHandle>,
    events_tx: mpsc::Sender<RelayEvent>,
    events_rx: mpsc::Receiver<RelayEvent>,
    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl RelayServer {
    /// Binds the listen socket with the given config.
    pub async fn bind(cfg: RelayConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let listener = ReliableListener::bind(addr).await?;
        let (events_tx, events_rx) = mpsc::channel(256);

        Ok(Self {
            cfg,
            listener,
            roster: Roster::new(),
            clients: HashMap::new(),
            events_tx,
            events_rx,
            console_rx: None,
        })
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept/event loop until a `quit` console command.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        if let Some(mut rx) = self.console_rx.take() {
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    if events.send(RelayEvent::Console(line)).await.is_err() {
                        break;
                    }
                }
            });
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (conn, peer) = accepted?;
                    self.handle_accept(conn, peer);
                }
                Some(ev) = self.events_rx.recv() => {
                    if !self.handle_event(ev)? {
                        info!("Server shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_accept(&self, conn: ReliableConn, peer: SocketAddr) {
        if self.roster.len() >= self.cfg.max_clients {
            warn!(%peer, max = self.cfg.max_clients, "Refusing connection, server full");
            tokio::spawn(async move {
                let mut conn = conn;
                let _ = conn
                    .send(&NetMsg::Disconnect {
                        reason: "server full".to_string(),
                    })
                    .await;
            });
            return;
        }

        let id = ClientId::new_unique();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = run_connection(id, conn, peer, events).await {
                debug!(client_id = %id, error = %e, "Connection task ended");
            }
        });
    }

    /// Dispatches one roster event. Returns `false` to stop the server.
    fn handle_event(&mut self, ev: RelayEvent) -> anyhow::Result<bool> {
        match ev {
            RelayEvent::Connected { id, peer, outbox } => {
                self.roster.on_connect(id);
                self.clients.insert(id, ClientHandle { peer, outbox });
                info!(client_id = %id, %peer, "Client connected");
            }
            RelayEvent::CreatePlayer { id } => {
                match self.roster.on_create_player(id) {
                    Some(record) => {
                        self.send_to(id, &NetMsg::PlayerCreated(record))?;
                        debug!(client_id = %id, "New player information sent");
                    }
                    None => {
                        warn!(client_id = %id, "create-player for unknown connection");
                    }
                }
                self.log_connected_clients();
                self.broadcast_players()?;
            }
            RelayEvent::UpdateBox { id, record } => match self.roster.on_update_box(id, record) {
                Ok(()) => self.broadcast_players()?,
                Err(e) => {
                    warn!(client_id = %id, error = %e, "Rejected update-box");
                }
            },
            RelayEvent::Disconnected { id } => {
                self.clients.remove(&id);
                if self.roster.on_disconnect(id) {
                    info!(client_id = %id, "Client disconnected");
                }
                self.log_connected_clients();
                self.broadcast_players()?;
            }
            RelayEvent::Console(line) => {
                let (output, keep_running) = self.exec_console(&line);
                for l in output {
                    println!("{}", l);
                }
                return Ok(keep_running);
            }
        }
        Ok(true)
    }

    /// Sends a message to one client only.
    fn send_to(&self, id: ClientId, msg: &NetMsg) -> anyhow::Result<()> {
        let frame = encode_frame(msg)?;
        if let Some(client) = self.clients.get(&id) {
            if client.outbox.try_send(frame).is_err() {
                debug!(client_id = %id, "Outbox full or closed, dropping message");
            }
        }
        Ok(())
    }

    /// Broadcasts the full mapping to every connected client. Encodes
    /// once and fans the same frame out.
    fn broadcast_players(&self) -> anyhow::Result<()> {
        let frame = encode_frame(&NetMsg::UpdatePlayers(self.roster.snapshot()))?;
        for (id, client) in &self.clients {
            if client.outbox.try_send(frame.clone()).is_err() {
                debug!(client_id = %id, "Outbox full or closed, dropping broadcast");
            }
        }
        Ok(())
    }

    fn log_connected_clients(&self) {
        debug!(clients = self.roster.len(), "Connected clients");
        for id in self.roster.sorted_ids() {
            if let Some(record) = self.roster.get(id) {
                debug!(
                    client_id = %id,
                    x = record.position.x,
                    y = record.position.y,
                    z = record.position.z,
                    "roster entry"
                );
            }
        }
    }

    /// Executes a console command. Returns output lines and whether the
    /// server should keep running.
    pub fn exec_console(&self, line: &str) -> (Vec<String>, bool) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return (Vec::new(), true);
        }

        match tokens[0] {
            "status" => {
                let mut out = Vec::new();
                out.push(format!("Clients: {}", self.roster.len()));
                for id in self.roster.sorted_ids() {
                    let peer = self
                        .clients
                        .get(&id)
                        .map(|c| c.peer.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    if let Some(r) = self.roster.get(id) {
                        out.push(format!(
                            "  {}: peer={} pos=({}, {}, {}) color={:#08x}",
                            id, peer, r.position.x, r.position.y, r.position.z, r.color
                        ));
                    }
                }
                (out, true)
            }
            "quit" | "exit" => (vec!["Shutting down".to_string()], false),
            other => (vec![format!("Unknown command: {}", other)], true),
        }
    }
}

/// Per-connection task: handshake, then pump inbound frames into roster
/// events. Emits `Disconnected` on the way out, whatever the cause.
async fn run_connection(
    id: ClientId,
    mut conn: ReliableConn,
    peer: SocketAddr,
    events: mpsc::Sender<RelayEvent>,
) -> anyhow::Result<()> {
    match conn.recv().await? {
        NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {}
        NetMsg::Hello { protocol } => {
            let _ = conn
                .send(&NetMsg::Disconnect {
                    reason: format!("protocol mismatch: server={PROTOCOL_VERSION} client={protocol}"),
                })
                .await;
            anyhow::bail!("protocol mismatch from {peer}");
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    }

    conn.send(&NetMsg::Welcome { client_id: id }).await?;

    let (mut reader, mut writer) = conn.into_split();
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<Bytes>(OUTBOX_CAPACITY);

    tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if writer.send_frame(&frame).await.is_err() {
                break;
            }
        }
    });

    events
        .send(RelayEvent::Connected {
            id,
            peer,
            outbox: outbox_tx,
        })
        .await
        .context("relay loop gone")?;

    let result = loop {
        match reader.recv().await {
            Ok(NetMsg::CreatePlayer) => {
                if events.send(RelayEvent::CreatePlayer { id }).await.is_err() {
                    break Ok(());
                }
            }
            Ok(NetMsg::UpdateBox(record)) => {
                if events
                    .send(RelayEvent::UpdateBox { id, record })
                    .await
                    .is_err()
                {
                    break Ok(());
                }
            }
            Ok(NetMsg::Disconnect { reason }) => {
                debug!(client_id = %id, %reason, "Client requested disconnect");
                break Ok(());
            }
            Ok(other) => {
                debug!(client_id = %id, ?other, "Unexpected message");
            }
            // EOF or a malformed frame both end the connection.
            Err(e) => break Err(e),
        }
    };

    let _ = events.send(RelayEvent::Disconnected { id }).await;
    result
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral() -> anyhow::Result<(RelayServer, RelayConfig)> {
    let cfg = RelayConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        ..Default::default()
    };

    let mut server = RelayServer::bind(cfg).await?;
    let addr = server.local_addr()?;
    server.cfg.server_addr = addr.to_string();

    let cfg = server.cfg.clone();
    Ok((server, cfg))
}
