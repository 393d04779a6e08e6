//! Echo / chat demo.
//!
//! ```text
//! echo server [addr]   # default 127.0.0.1:9000
//! echo client [url]    # default ws://127.0.0.1:9000
//! ```
//!
//! Each line typed into a client is sent as a `say` message and broadcast
//! to every connected client. `RUST_LOG=debug` shows the traffic.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "127.0.0.1:9000";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct Say {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Said {
    from: String,
    text: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn build_server() -> Server {
    Server::builder()
        .register_handler("echo", |writer, envelope| async move {
            writer.send(&envelope).await?;
            Ok::<_, HandlerError>(())
        })
        .register_handler("say", |writer, envelope| async move {
            let say: Say = envelope.decode_data()?;
            let said = Said {
                from: writer.connection_id().to_string(),
                text: say.text,
            };
            let report = writer.broadcast(&Envelope::new("said").with_data(&said)?).await?;
            tracing::debug!(from = %said.from, delivered = report.delivered, "relayed");
            Ok::<_, HandlerError>(())
        })
        .on_error(|conn_id, e| tracing::warn!(%conn_id, error = %e, "message rejected"))
        .build()
}

async fn run_server(addr: &str) -> Result<(), TetherError> {
    let transport = WebSocketTransport::bind(addr).await?;
    tracing::info!(%addr, "echo server listening");
    build_server().serve(transport).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

async fn run_client(url: &str) -> Result<(), TetherError> {
    let client = Client::builder(url)
        .config(ConnectConfig {
            heartbeat_interval: Duration::from_secs(10),
            ..ConnectConfig::default()
        })
        .register_handler("said", |_, envelope| async move {
            let said: Said = envelope.decode_data()?;
            println!("[{}] {}", said.from, said.text);
            Ok::<_, HandlerError>(())
        })
        .on_connect(|| tracing::info!("connected"))
        .on_disconnect(|| tracing::info!("disconnected"))
        .on_error(|e| tracing::warn!(error = %e, "client error"))
        .connect()
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = client.wait() => break,
            line = lines.next_line() => {
                let Ok(Some(text)) = line else { break };
                if text.is_empty() {
                    continue;
                }
                let envelope = Envelope::new("say").with_data(&Say { text })?;
                if let Err(e) = client.send_message(&envelope).await {
                    tracing::warn!(error = %e, "send failed");
                }
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("server") => {
            let addr = args.next().unwrap_or_else(|| DEFAULT_ADDR.to_string());
            run_server(&addr).await?;
        }
        Some("client") => {
            let url = args.next().unwrap_or_else(|| format!("ws://{DEFAULT_ADDR}"));
            run_client(&url).await?;
        }
        _ => {
            eprintln!("usage: echo server [addr] | echo client [url]");
            std::process::exit(2);
        }
    }
    Ok(())
}
