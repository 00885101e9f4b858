//! Shared coordination state between the upstream driver and slave workers.
//!
//! One mutex guards the command log, the reply buffer and the active-slave
//! counter. Two wake primitives hang off it, mirroring a classic
//! condvar-per-event design: a watch channel broadcasts "a new command is at
//! the tail" to every worker, and a [`Notify`] signals "a reply arrived" to
//! the single coordinator task. The mutex is a plain [`std::sync::Mutex`] and
//! is never held across an `.await`; workers and coordinator alike re-check
//! their predicate under the lock after every wake.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::command_log::CommandLog;

/// Extra time granted to stragglers once half the slaves have answered.
pub const QUORUM_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum CoordError {
    #[error("coordination state lock poisoned")]
    LockPoisoned,
}

/// Everything guarded by the coordination mutex.
pub struct CoordState {
    pub log: CommandLog,
    /// Replies to the tail command, in arrival order.
    pub replies: Vec<String>,
    /// Slaves currently inside their service loop.
    pub active_slaves: usize,
}

pub struct Coordination {
    inner: Mutex<CoordState>,
    /// Broadcasts the tail command id to workers. The value is informational;
    /// workers re-read the log under the lock, the channel's version tracking
    /// is what guarantees a missed wake is observed on the next check.
    cmd_tx: watch::Sender<u32>,
    /// Wakes the coordinator inside [`Coordination::await_quorum`].
    reply_notify: Notify,
    max_slaves: usize,
}

impl Coordination {
    pub fn new(max_slaves: usize) -> Self {
        Self::with_log(CommandLog::new(), max_slaves)
    }

    pub fn with_log(log: CommandLog, max_slaves: usize) -> Self {
        let (cmd_tx, _) = watch::channel(0);
        Self {
            inner: Mutex::new(CoordState {
                log,
                replies: Vec::with_capacity(max_slaves),
                active_slaves: 0,
            }),
            cmd_tx,
            reply_notify: Notify::new(),
            max_slaves,
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, CoordState>, CoordError> {
        self.inner.lock().map_err(|_| CoordError::LockPoisoned)
    }

    /// A worker's subscription to command-available wakes.
    pub fn subscribe_commands(&self) -> watch::Receiver<u32> {
        self.cmd_tx.subscribe()
    }

    /// Install a new tail command and wake every worker. The reply buffer is
    /// reset: it only ever holds replies to the tail.
    pub fn broadcast_command(&self, state: &mut CoordState, cmd: &str, args: &str) -> u32 {
        let id = state.log.append(cmd, args);
        state.replies.clear();
        self.cmd_tx.send_replace(id);
        id
    }

    /// Deposit one slave reply for the tail command and wake the coordinator.
    pub fn deposit_reply(&self, state: &mut CoordState, reply: String) {
        if state.replies.len() < self.max_slaves {
            state.replies.push(reply);
        }
        // notify_waiters has condvar semantics: it wakes only waiters that
        // armed themselves before this point and leaves no permit behind.
        // await_quorum arms under the lock, so no deposit can slip between
        // its predicate check and its suspension.
        self.reply_notify.notify_waiters();
    }

    pub fn slave_connected(&self, state: &mut CoordState) {
        state.active_slaves += 1;
    }

    /// A disconnect can complete a quorum (fewer slaves to wait for), so it
    /// also wakes the coordinator.
    pub fn slave_disconnected(&self, state: &mut CoordState) {
        debug_assert!(state.active_slaves > 0);
        state.active_slaves -= 1;
        self.reply_notify.notify_waiters();
    }

    /// Wait for replies to the tail command.
    ///
    /// Returns once every active slave has answered, or — with at least one
    /// reply in hand — once the deadline passes. When half the active slaves
    /// have answered, the wait is shortened to [`QUORUM_GRACE`] from now so a
    /// few stragglers can still contribute without stalling on dead ones.
    /// Never returns with an empty reply buffer: with no replies at all it
    /// waits for the first one, deadline or not.
    pub async fn await_quorum(&self, deadline: Option<Instant>) -> Result<usize, CoordError> {
        let mut limit = deadline;
        loop {
            // Arm the waiter before the predicate check so a reply deposited
            // between unlock and await still wakes us.
            let notified = self.reply_notify.notified();
            tokio::pin!(notified);
            let had_replies = {
                let state = self.lock()?;
                let replies = state.replies.len();
                if replies > 0 && replies >= state.active_slaves {
                    return Ok(replies);
                }
                notified.as_mut().enable();
                replies > 0
            };

            match limit {
                Some(at) if had_replies => {
                    let _ = time::timeout_at(at, notified).await;
                }
                _ => notified.await,
            }

            let state = self.lock()?;
            let replies = state.replies.len();
            let active = state.active_slaves;
            if replies == 0 {
                continue;
            }
            if replies >= active {
                return Ok(replies);
            }
            let now = Instant::now();
            if let Some(at) = limit {
                if now >= at {
                    debug!(replies, active, "quorum wait hit its deadline");
                    return Ok(replies);
                }
            }
            if replies >= active / 2 {
                let grace = now + QUORUM_GRACE;
                if limit.map_or(true, |at| grace < at) {
                    limit = Some(grace);
                }
            }
        }
    }
}
