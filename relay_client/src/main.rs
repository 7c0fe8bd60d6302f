//! Standalone headless client binary.
//!
//! Usage:
//!   cargo run -p relay_client -- [--addr 127.0.0.1:3000] [--send-hz 24]
//!
//! The client connects to the relay, requests its player record, sends
//! `update-box` on a fixed interval, and mirrors the broadcast roster.
//!
//! Console commands:
//!   key <wasd>  - Nudge the box and push an update immediately
//!   status      - Show client status
//!   quit        - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use relay_client::client::{ClientState, RelayClient};
use relay_client::input::Key;
use relay_shared::config::RelayConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> RelayConfig {
    let mut cfg = RelayConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--send-hz" if i + 1 < args.len() => {
                cfg.send_hz = args[i + 1].parse().unwrap_or(cfg.send_hz);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(server = %cfg.server_addr, send_hz = cfg.send_hz, "Starting client");

    let mut client = RelayClient::connect(&cfg).await.context("connect")?;
    client.create_player().await?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client connected. Type 'key w|a|s|d' to move, 'status' for info, 'quit' to exit.");
    println!();

    let send_interval = Duration::from_secs_f32(1.0 / cfg.send_hz as f32);
    let mut ticks: u32 = 0;

    loop {
        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["key", k] => match k.chars().next().and_then(Key::from_char) {
                    Some(key) => client.press_key(key).await?,
                    None => println!("Usage: key <w|a|s|d>"),
                },
                ["status"] => {
                    println!("State: {:?}", client.state);
                    println!("Client ID: {}", client.client_id);
                    if let Some(own) = client.own {
                        println!(
                            "Own box: pos=({}, {}, {}) color={:#08x}",
                            own.position.x, own.position.y, own.position.z, own.color
                        );
                    }
                    println!("Remote players: {}", client.remotes.len());
                }
                ["quit"] | ["exit"] => return Ok(()),
                _ => println!("Unknown command: {}", line),
            }
        }

        client.poll(Duration::from_millis(10)).await?;

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }

        if client.state == ClientState::Ready {
            client.send_update().await?;
        }

        ticks += 1;
        if ticks % cfg.send_hz.max(1) == 0 {
            info!(remotes = client.remotes.len(), "Roster");
        }

        tokio::time::sleep(send_interval).await;
    }

    Ok(())
}
