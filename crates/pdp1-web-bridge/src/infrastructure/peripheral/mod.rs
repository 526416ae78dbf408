//! Links to the emulator's streaming peripherals.
//!
//! Each peripheral is a raw TCP byte stream on its own port:
//!
//! | Peripheral | Direction            | Reconnect                     |
//! |------------|----------------------|-------------------------------|
//! | punch      | emulator → browser   | automatic, fixed backoff      |
//! | typewriter | both ways            | automatic, fixed backoff      |
//! | display    | emulator → browser   | only on explicit `connect_dpy` |
//!
//! Punch and typewriter share [`run_reconnecting`]: connect, run the
//! peripheral's session until the stream fails, and connect again.  Only a
//! refused connect waits the backoff.  The
//! display link is switched on and off by the browser, so it runs its own
//! task (see [`display`]).

pub mod display;
pub mod punch;
pub mod typewriter;

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{info, warn};

pub use display::{spawn_display, DisplayHandle};
pub use punch::PunchLink;
pub use typewriter::{typewriter, TypewriterHandle, TypewriterLink};

/// One connected lifetime of a peripheral link.
#[async_trait]
pub trait LinkSession: Send {
    /// Peripheral name used in log messages.
    fn name(&self) -> &'static str;

    /// Drives a freshly connected stream until it fails or is closed by the
    /// emulator.
    async fn run(&mut self, stream: TcpStream) -> io::Result<()>;
}

/// Keeps `session` connected to `addr` until `running` is cleared.
///
/// Only a failed connect attempt waits `backoff`; when a connected session
/// ends, the link redials at once.
pub async fn run_reconnecting<S: LinkSession>(
    mut session: S,
    addr: SocketAddr,
    backoff: Duration,
    running: Arc<AtomicBool>,
) {
    let name = session.name();

    while running.load(Ordering::Relaxed) {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!("{name}: connected to {addr}");
                match session.run(stream).await {
                    Ok(()) => info!("{name}: emulator closed the connection"),
                    Err(e) => warn!("{name}: connection lost: {e}"),
                }
            }
            Err(e) => {
                warn!("{name}: could not connect to {addr}: {e}; retrying in {backoff:?}");
                if running.load(Ordering::Relaxed) {
                    time::sleep(backoff).await;
                }
            }
        }
    }

    info!("{name}: link stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Reports every byte it reads on a channel.
    struct Echo {
        seen: mpsc::UnboundedSender<u8>,
    }

    #[async_trait]
    impl LinkSession for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn run(&mut self, mut stream: TcpStream) -> io::Result<()> {
            let mut buf = [0u8; 16];
            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Ok(());
                }
                for &b in &buf[..n] {
                    let _ = self.seen.send(b);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_link_reconnects_after_emulator_closes() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        let link = tokio::spawn(run_reconnecting(
            Echo { seen: seen_tx },
            addr,
            Duration::from_millis(10),
            Arc::clone(&running),
        ));

        // Act: two separate connections, each sending one byte then closing
        for value in [7u8, 9] {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.write_all(&[value]).await.unwrap();
            drop(conn);
        }

        // Assert
        assert_eq!(seen_rx.recv().await, Some(7));
        assert_eq!(seen_rx.recv().await, Some(9));

        running.store(false, Ordering::Relaxed);
        link.abort();
    }

    #[tokio::test]
    async fn test_link_redials_without_backoff_after_session_ends() {
        // Arrange: a backoff far longer than the test may take
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        let link = tokio::spawn(run_reconnecting(
            Echo { seen: seen_tx },
            addr,
            Duration::from_secs(30),
            Arc::clone(&running),
        ));
        let (first, _) = listener.accept().await.unwrap();

        // Act: the emulator drops the connection
        drop(first);

        // Assert
        let second = time::timeout(Duration::from_secs(2), listener.accept()).await;
        assert!(second.is_ok(), "link waited for the backoff before redialing");

        running.store(false, Ordering::Relaxed);
        link.abort();
    }

    #[tokio::test]
    async fn test_link_stops_retrying_when_running_cleared() {
        // Arrange: nothing listens on this port once the listener is dropped
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        let link = tokio::spawn(run_reconnecting(
            Echo { seen: seen_tx },
            addr,
            Duration::from_millis(10),
            Arc::clone(&running),
        ));

        // Act
        time::sleep(Duration::from_millis(30)).await;
        running.store(false, Ordering::Relaxed);

        // Assert
        time::timeout(Duration::from_secs(2), link)
            .await
            .expect("link did not stop")
            .unwrap();
    }
}
