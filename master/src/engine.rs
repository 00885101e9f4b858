//! The master engine: the upstream driver's view of the slave fleet.
//!
//! One logical player backed by many searchers. `notify` mirrors every game
//! state change into the command log and fans it out; `genmove` waits for a
//! quorum of statistics replies, merges them, and commits the chosen move
//! back into history so every slave plays it.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use gtp_core::{Coord, Stone};

use crate::aggregate::{self, MoveStats};
use crate::coordination::{CoordError, Coordination};
use crate::status;

const DEFAULT_BOARD_SIZE: u8 = 19;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error(transparent)]
    Coordination(#[from] CoordError),
}

/// The last move this master committed, for reporting.
#[derive(Debug, Clone, Copy)]
struct LastMove {
    color: Stone,
    coord: Coord,
    stats: MoveStats,
}

pub struct Master {
    coord: Arc<Coordination>,
    slaves_quit: bool,
    board_size: u8,
    last_move: Option<LastMove>,
}

impl Master {
    pub fn new(coord: Arc<Coordination>, slaves_quit: bool) -> Self {
        Self {
            coord,
            slaves_quit,
            board_size: DEFAULT_BOARD_SIZE,
            last_move: None,
        }
    }

    /// Shared coordination state (for testing)
    #[allow(dead_code)]
    pub fn coordination(&self) -> &Arc<Coordination> {
        &self.coord
    }

    /// Mirror one upstream command to the slave fleet.
    ///
    /// Commands the fleet must not see are dropped here and answered by the
    /// caller. Everything else is appended to the command log (restarting it
    /// on a game start) and broadcast. For the move-generation family the
    /// call returns as soon as the command is out — `genmove` and
    /// `dead_group_list` do the waiting, with a deadline — while any other
    /// command holds the driver until a quorum of slaves confirmed it, which
    /// keeps the fleet from drifting out of sync between moves.
    pub async fn notify(&mut self, cmd: &str, args: &str) -> Result<(), MasterError> {
        if gtp_core::should_intercept(cmd, self.slaves_quit) {
            debug!(cmd, "not forwarded to slaves");
            return Ok(());
        }

        if cmd.eq_ignore_ascii_case("boardsize") {
            if let Ok(size) = args.trim().parse::<u8>() {
                self.board_size = size;
            }
        }

        let wire_cmd = gtp_core::translate(cmd);
        {
            let mut state = self.coord.lock()?;
            if state.log.is_empty() || gtp_core::is_gamestart(cmd) {
                state.log.reset();
            }
            self.coord.broadcast_command(&mut state, wire_cmd, args);
        }

        if !gtp_core::is_deferred(wire_cmd) {
            self.coord.await_quorum(None).await?;
        }
        Ok(())
    }

    /// Wait for move statistics, pick the best move, and commit it.
    ///
    /// The preceding `notify("genmove", ...)` already broadcast the
    /// `pachi-genmoves` request; this waits for its replies under `deadline`.
    /// The chosen move is appended as a `play` command, overwriting the
    /// request's reply flag, so slaves never answer the request twice and new
    /// slaves replaying history learn the move.
    pub async fn genmove(
        &mut self,
        color: Stone,
        deadline: Option<Instant>,
    ) -> Result<Coord, MasterError> {
        let start = Instant::now();
        self.coord.await_quorum(deadline).await?;

        let (selection, replies) = {
            let mut state = self.coord.lock()?;
            let selection = aggregate::select_best_move(&state.replies, self.board_size);
            let replies = state.replies.len();
            let args = format!("{} {}", color, selection.coord);
            self.coord.broadcast_command(&mut state, "play", &args);
            (selection, replies)
        };

        self.last_move = Some(LastMove {
            color,
            coord: selection.coord,
            stats: selection.stats,
        });

        let elapsed = start.elapsed().as_secs_f64().max(1e-6);
        status::GENMOVE_SECONDS.observe(elapsed);
        status::LAST_MOVE_PLAYOUTS.set(selection.total_playouts as i64);
        info!(
            color = %color,
            coord = %selection.coord,
            value = format!("{:.4}", selection.stats.value_for(color)),
            playouts = selection.stats.playouts,
            total_playouts = selection.total_playouts,
            replies,
            "global winner in {:.2}s ({} games/s, {} games/s/slave, {} games/s/thread)",
            elapsed,
            (selection.total_playouts as f64 / elapsed) as u64,
            (selection.total_playouts as f64 / elapsed / replies.max(1) as f64) as u64,
            (selection.total_playouts as f64 / elapsed / selection.total_threads.max(1) as f64)
                as u64,
        );

        Ok(selection.coord)
    }

    /// Wait for `final_status_list` replies and take the plurality vote.
    /// Returns the first stone of each dead group.
    pub async fn dead_group_list(&mut self) -> Result<Vec<Coord>, MasterError> {
        self.coord.await_quorum(None).await?;
        let state = self.coord.lock()?;
        Ok(aggregate::plurality_dead_groups(&state.replies, self.board_size))
    }

    /// Answer an in-game chat line, if it is one we recognize.
    pub fn chat(&self, msg: &str) -> Option<String> {
        let msg = msg.trim_start();
        if !msg.to_ascii_lowercase().starts_with("winrate") {
            return None;
        }
        let last = self.last_move?;
        let machines = self.coord.lock().ok()?.active_slaves;
        Some(format!(
            "In {} playouts at {} machines, {} {} can win with {:.2}% probability.",
            last.stats.playouts,
            machines,
            last.color,
            last.coord,
            100.0 * last.stats.value_for(last.color),
        ))
    }
}
