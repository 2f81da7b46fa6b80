use badge_bridge_core::Envelope;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::registry::ClientRegistry;

/// Opens the register controller's serial device for line reads.
pub fn open_serial(path: &str, baud: u32) -> tokio_serial::Result<SerialStream> {
    tokio_serial::new(path, baud).open_native_async()
}

/// Reads newline-terminated JSON from the register controller and forwards
/// `card_read` lines verbatim to every connected client. Anything else on
/// the wire (telemetry, malformed lines, other message types) is ignored.
///
/// Generic over the reader so tests can drive it without hardware.
pub async fn run_serial_ingest<R>(reader: R, registry: ClientRegistry)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "serial read failed");
                break;
            }
        };
        let Some(Envelope::CardRead(event)) = Envelope::parse_line(&line) else {
            debug!(line = %line.chars().take(80).collect::<String>(), "ignoring serial line");
            continue;
        };
        if event.uid.is_empty() {
            debug!("ignoring card_read with empty uid");
            continue;
        }
        let delivered = registry.broadcast(line.trim());
        info!(uid = %event.uid, clients = delivered, "card_read broadcast");
    }
    info!("serial ingest stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{timeout, Duration};

    async fn recv_line(rx: &mut tokio::sync::mpsc::Receiver<String>) -> Option<String> {
        timeout(Duration::from_secs(1), rx.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn forwards_card_read_lines_verbatim() {
        let registry = ClientRegistry::new();
        let mut client = registry.register();
        let (mut tx, rx) = tokio::io::duplex(1024);

        let ingest = tokio::spawn(run_serial_ingest(rx, registry));
        tx.write_all(b"{\"type\":\"card_read\",\"uid\":\"CARDX\",\"source\":\"register_controller\"}\n")
            .await
            .unwrap();
        drop(tx);
        ingest.await.unwrap();

        let line = recv_line(&mut client.receiver).await.unwrap();
        assert!(line.contains("\"uid\":\"CARDX\""));
        // Extra fields from the controller survive untouched.
        assert!(line.contains("register_controller"));
    }

    #[tokio::test]
    async fn ignores_everything_that_is_not_a_card_read() {
        let registry = ClientRegistry::new();
        let mut client = registry.register();
        let (mut tx, rx) = tokio::io::duplex(1024);

        let ingest = tokio::spawn(run_serial_ingest(rx, registry));
        for bad in [
            "not json at all",
            "[1,2]",
            "{\"type\":\"telemetry\",\"rssi\":-40}",
            "{\"type\":\"card_read\"}",
            "{\"type\":\"card_read\",\"uid\":\"\"}",
            "{\"type\":\"card_read\",\"uid\":42}",
            "",
        ] {
            tx.write_all(format!("{bad}\n").as_bytes()).await.unwrap();
        }
        tx.write_all(b"{\"type\":\"card_read\",\"uid\":\"OK\"}\n")
            .await
            .unwrap();
        drop(tx);
        ingest.await.unwrap();

        let line = recv_line(&mut client.receiver).await.unwrap();
        assert!(line.contains("\"OK\""));
        assert!(recv_line(&mut client.receiver).await.is_none());
    }
}
