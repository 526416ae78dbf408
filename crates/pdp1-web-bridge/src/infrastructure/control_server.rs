//! Out-of-band control port.
//!
//! Lets an operator or a script mount tapes without a browser:
//!
//! ```text
//! $ echo 'r /tmp/spacewar.rim' | nc localhost 1050
//! ```
//!
//! Connections are served one at a time, to completion, in accept order.
//! Each line is parsed with [`ControlCommand::parse`]; see
//! [`pdp1_core::protocol::control`] for the line syntax.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use pdp1_core::ControlCommand;

use crate::application::{BridgeError, ReaderControl};

/// Serves control connections from `listener` until `running` is cleared.
pub async fn run_control_server(
    listener: TcpListener,
    reader: Arc<dyn ReaderControl>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("control: shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("control: connection from {peer_addr}");
                serve_connection(stream, reader.as_ref()).await;
                debug!("control: {peer_addr} done");
            }
            Ok(Err(e)) => error!("control: accept error: {e}"),
            Err(_) => {}
        }
    }
}

async fn serve_connection(stream: TcpStream, reader: &dyn ReaderControl) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = handle_control_line(&line, reader).await {
                    warn!("control: {e}");
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!("control: read failed: {e}");
                return;
            }
        }
    }
}

/// Executes one control line against the reader.
///
/// Unparseable lines are logged and ignored.  A tape file that cannot be
/// read unmounts the reader.
///
/// # Errors
///
/// Returns [`BridgeError::PeripheralStopped`] if the reader task is gone.
pub async fn handle_control_line(line: &str, reader: &dyn ReaderControl) -> Result<(), BridgeError> {
    let command = match ControlCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!("control: {e}");
            return Ok(());
        }
    };

    match command {
        ControlCommand::MountReader { path } => match fs::read(&path).await {
            Ok(data) => {
                info!("control: mounting {path} ({} bytes)", data.len());
                reader.mount(data).await
            }
            Err(e) => {
                warn!("control: couldn't read {path}: {e}; unmounting reader");
                reader.unmount().await
            }
        },
        ControlCommand::UnmountReader => {
            info!("control: unmounting reader");
            reader.unmount().await
        }
        ControlCommand::Punch { path } => {
            debug!("control: punch command ignored (path {path:?})");
            Ok(())
        }
    }
}
