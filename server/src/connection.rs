use std::io;
use std::net::SocketAddr;

use badge_bridge_core::Envelope;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::dispatch;
use crate::registry::Registration;
use crate::state::BridgeState;

/// Accept loop. Each accepted connection gets its own task; the loop only
/// returns when the listener itself fails.
pub async fn serve(listener: TcpListener, state: BridgeState) -> io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr, state).await;
        });
    }
}

/// Per-connection loop: read newline-framed JSON, dispatch `request`
/// lines, queue the response to this connection's writer. Lines that are
/// not well-formed requests are dropped and the stream resumes at the
/// next newline.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: BridgeState) {
    let (read_half, mut write_half) = stream.into_split();
    let Registration {
        connection_id,
        sender,
        mut receiver,
    } = state.registry.register();
    info!(%addr, %connection_id, clients = state.registry.len(), "client connected");

    let writer = tokio::spawn(async move {
        while let Some(mut line) = receiver.recv().await {
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                debug!(%connection_id, error = %err, "read failed");
                break;
            }
        };
        let Some(Envelope::Request(req)) = Envelope::parse_line(&line) else {
            debug!(%connection_id, "dropping malformed or non-request line");
            continue;
        };
        let response = dispatch::dispatch(&state, &req);
        let line = match Envelope::Response(response).to_line() {
            Ok(line) => line,
            Err(err) => {
                warn!(%connection_id, error = %err, "failed to encode response");
                continue;
            }
        };
        if sender.send(line).await.is_err() {
            break;
        }
    }

    state.registry.unregister(connection_id);
    writer.abort();
    info!(%connection_id, clients = state.registry.len(), "client disconnected");
}
