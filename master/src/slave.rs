//! Slave connection handling: listener slots and the per-connection service
//! loop.
//!
//! The master pre-spawns `max_slaves` slot tasks, each accepting one
//! connection at a time from the shared listening socket. A slot keeps no
//! identity between connections beyond one bit: once any connection on it
//! ends, the next slave to land there gets the full history replay, because
//! there is no telling whether it is the same process reconnecting.
//!
//! A worker holds the coordination lock only while inspecting or mutating
//! shared state; all socket I/O happens with the lock released.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gtp_core::reply;

use crate::command_log::LOG_CAPACITY;
use crate::coordination::{CoordError, Coordination};
use crate::status;

/// Expected prefix of a slave's answer to `name`, compared case-insensitively.
pub const SLAVE_NAME_PREFIX: &str = "= pachi";

#[derive(Debug, Error)]
pub enum SlaveError {
    #[error("identity handshake failed")]
    BadHandshake,

    #[error("slave closed the connection")]
    Disconnected,

    #[error("slave i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Coordination(#[from] CoordError),
}

/// Spawn one accept-and-serve task per slave slot on a shared listener.
pub fn spawn_slots(
    coord: Arc<Coordination>,
    listener: TcpListener,
    slots: usize,
) -> Vec<JoinHandle<()>> {
    let listener = Arc::new(listener);
    (0..slots)
        .map(|slot| {
            let coord = Arc::clone(&coord);
            let listener = Arc::clone(&listener);
            tokio::spawn(serve_slot(coord, listener, slot))
        })
        .collect()
}

async fn serve_slot(coord: Arc<Coordination>, listener: Arc<TcpListener>, slot: usize) {
    let mut resend = false;
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                // Transient accept failures (fd exhaustion and friends); keep
                // the slot alive.
                warn!(slot, error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        debug!(slot, peer = %peer, "new slave");

        match serve_slave(&coord, stream, peer, resend).await {
            Ok(()) => return,
            Err(SlaveError::BadHandshake) => {
                warn!(peer = %peer, "bad slave");
            }
            Err(SlaveError::Disconnected) | Err(SlaveError::Io(_)) => {
                info!(peer = %peer, "lost slave");
                resend = true;
            }
            Err(SlaveError::Coordination(e)) => {
                warn!(slot, error = %e, "slot giving up");
                return;
            }
        }
    }
}

/// Serve one accepted connection until it ends. `Ok(())` means the master is
/// shutting down (the command channel closed); every other outcome is an
/// error naming why the connection is over.
async fn serve_slave(
    coord: &Coordination,
    stream: TcpStream,
    peer: SocketAddr,
    resend: bool,
) -> Result<(), SlaveError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    handshake(&mut reader, &mut write_half).await?;

    {
        let mut state = coord.lock()?;
        coord.slave_connected(&mut state);
    }
    status::CONNECTED_SLAVES.inc();

    let result = service_loop(coord, &mut reader, &mut write_half, peer, resend).await;

    status::CONNECTED_SLAVES.dec();
    if let Ok(mut state) = coord.lock() {
        coord.slave_disconnected(&mut state);
    }
    result
}

/// Minimal identity check: the slave must introduce itself as a Pachi engine.
async fn handshake(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
) -> Result<(), SlaveError> {
    writer.write_all(b"name\n").await?;

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(SlaveError::BadHandshake);
    }
    let named_ok = line
        .get(..SLAVE_NAME_PREFIX.len())
        .map_or(false, |p| p.eq_ignore_ascii_case(SLAVE_NAME_PREFIX));
    if !named_ok {
        return Err(SlaveError::BadHandshake);
    }

    line.clear();
    if reader.read_line(&mut line).await? == 0 || line != "\n" {
        return Err(SlaveError::BadHandshake);
    }
    Ok(())
}

async fn service_loop(
    coord: &Coordination,
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    peer: SocketAddr,
    mut resend: bool,
) -> Result<(), SlaveError> {
    let mut cmd_rx = coord.subscribe_commands();
    let mut last_sent: Option<u32> = None;

    loop {
        // Wait for work: a tail command this slave has not been sent yet, or
        // a pending resync.
        let payload = loop {
            {
                let state = coord.lock()?;
                if let Some(tail_id) = state.log.tail_id() {
                    if resend || last_sent != Some(tail_id) {
                        let text = if resend {
                            state.log.full_history()
                        } else {
                            state.log.broadcast_payload()
                        };
                        last_sent = Some(tail_id);
                        break text.to_string();
                    }
                }
            }
            if cmd_rx.changed().await.is_err() {
                return Ok(());
            }
        };

        debug!(peer = %peer, ">> {}", payload.trim_end());
        writer.write_all(payload.as_bytes()).await?;

        let (reply, reply_id) = read_reply(reader, peer).await?;

        let mut state = coord.lock()?;
        let current = state.log.tail_id();
        if reply_id.is_some() && reply_id == current && reply::is_affirmative(&reply) {
            coord.deposit_reply(&mut state, reply);
            status::REPLIES_TOTAL.inc();
            resend = false;
        } else {
            // Out of sync, negative ack, or a reply to a command that is no
            // longer the tail: replay the whole game on the next iteration
            // without waiting for a wake. The slave collapses the replay into
            // one reply carrying the final command's id.
            //
            // A stale reply whose id happens to equal the new tail's would be
            // accepted for it; fresh ids make that vanishingly unlikely and
            // it is not defended against.
            debug!(peer = %peer, "resending all history");
            status::RESYNCS_TOTAL.inc();
            resend = true;
        }
    }
}

/// Read one blank-line-terminated reply. The id is taken from the first line
/// that carries one. Oversize replies are truncated but still consumed up to
/// their terminator.
async fn read_reply(
    reader: &mut BufReader<OwnedReadHalf>,
    peer: SocketAddr,
) -> Result<(String, Option<u32>), SlaveError> {
    let mut reply = String::new();
    let mut reply_id = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(SlaveError::Disconnected);
        }
        if line == "\n" {
            return Ok((reply, reply_id));
        }
        debug!(peer = %peer, "<< {}", line.trim_end());
        if reply_id.is_none() {
            reply_id = reply::reply_id(&line);
        }
        if reply.len() + line.len() <= LOG_CAPACITY {
            reply.push_str(&line);
        }
    }
}
