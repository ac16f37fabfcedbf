//! UDP receive loop: read datagrams, decode, publish, repeat.
//!
//! Strictly sequential — one datagram at a time, in arrival order, with
//! events from the same datagram published in extraction order. The only
//! blocking point is the socket read; decode is bounded CPU work.

use std::net::SocketAddr;

use airtrack_core::decode;
use airtrack_core::registry::DeviceRegistry;
use airtrack_core::types::Reject;
use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::publisher::EventPublisher;

/// Receive buffer size. Air-interface reports are far smaller; longer
/// foreign datagrams fail framing and drop.
const MAX_DATAGRAM: usize = 4096;

/// Bind the relay socket on the IPv6 wildcard.
///
/// On dual-stack hosts this also accepts IPv4-mapped senders. Bind
/// failure is fatal.
pub async fn bind(port: u16) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(("::", port))
        .await
        .with_context(|| format!("binding UDP port {port}"))?;
    info!(port, "listening for air-interface datagrams");
    Ok(socket)
}

/// Run the sequential receive-decode-publish loop until cancelled.
///
/// Returns an error only when the socket itself fails; every
/// per-datagram condition is logged and skipped.
pub async fn run(
    socket: UdpSocket,
    registry: &DeviceRegistry,
    publisher: &dyn EventPublisher,
    token: CancellationToken,
) -> Result<()> {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("stopping receive loop");
                return Ok(());
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = received.context("receiving datagram")?;
                handle_datagram(&buf[..len], peer, registry, publisher).await;
            }
        }
    }
}

/// Decode one datagram and publish whatever events it yields.
///
/// All rejections are datagram-scoped: log and move on.
pub async fn handle_datagram(
    buf: &[u8],
    peer: SocketAddr,
    registry: &DeviceRegistry,
    publisher: &dyn EventPublisher,
) {
    debug!(%peer, len = buf.len(), "datagram received");
    match decode::relay_datagram(buf, registry) {
        Ok(relayed) => {
            if relayed.truncated {
                debug!(%peer, "short message: location batch tail dropped");
            }
            for event in &relayed.events {
                info!(kind = event.kind(), drd = event.drd(), sendtime = event.sendtime(), "relaying event");
                if let Err(e) = publisher.publish(event).await {
                    warn!(error = %e, "failed to enqueue event");
                }
            }
        }
        Err(reject) => log_reject(&reject, peer, buf),
    }
}

fn log_reject(reject: &Reject, peer: SocketAddr, buf: &[u8]) {
    match reject {
        // Routine: foreign trackers share the port
        Reject::UnknownDevice { .. } => info!(%peer, "{reject}"),
        _ => debug!(%peer, raw = %String::from_utf8_lossy(buf), "{reject}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use airtrack_core::types::Event;
    use std::sync::Mutex;

    struct RecordingPublisher {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            RecordingPublisher {
                events: Mutex::new(Vec::new()),
            }
        }

        fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &Event) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn registry() -> DeviceRegistry {
        DeviceRegistry::from_devices([("bike7", "135790246811220")])
    }

    fn peer() -> SocketAddr {
        "[::1]:40000".parse().unwrap()
    }

    const FRI_TWO: &[u8] = b"+RESP:GTFRI,020102,135790246811220,gl200,0,0,2,\
1,4.3,92,70.0,121.354335,31.222073,20090214013254,0460,0000,18d8,6141,00,\
2,5.8,180,71.0,121.354500,31.222300,20090214013354,0460,0000,18d8,6141,00,\
82,20090214093254,11F0$";

    #[tokio::test]
    async fn test_publishes_batch_in_extraction_order() {
        let publisher = RecordingPublisher::new();
        handle_datagram(FRI_TWO, peer(), &registry(), &publisher).await;

        let events = publisher.take();
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (Event::Position(first), Event::Position(second)) => {
                assert_eq!(first.fixtime, "20090214013254");
                assert_eq!(second.fixtime, "20090214013354");
            }
            other => panic!("expected positions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_device_publishes_nothing() {
        let publisher = RecordingPublisher::new();
        let empty = DeviceRegistry::new();
        handle_datagram(FRI_TWO, peer(), &empty, &publisher).await;
        assert!(publisher.take().is_empty());
    }

    #[tokio::test]
    async fn test_missing_terminator_publishes_nothing() {
        let publisher = RecordingPublisher::new();
        let truncated = &FRI_TWO[..FRI_TWO.len() - 1];
        handle_datagram(truncated, peer(), &registry(), &publisher).await;
        assert!(publisher.take().is_empty());
    }

    #[tokio::test]
    async fn test_arbitrary_bytes_do_not_panic() {
        let publisher = RecordingPublisher::new();
        handle_datagram(&[0xFF, 0x00, 0xA9, b'$'], peer(), &registry(), &publisher).await;
        handle_datagram(b"", peer(), &registry(), &publisher).await;
        assert!(publisher.take().is_empty());
    }
}
