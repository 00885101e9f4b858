//! The per-game command log.
//!
//! Every GTP command of the current game is kept in one contiguous text
//! buffer, newline terminated, so the two things a worker ever sends are both
//! single slices of it: the tail command (the one currently fanned out) and
//! the full history from the start of the game (the resync replay).
//!
//! Exactly one command in the log carries the reply-required flag: the tail.
//! Appending a new command rewrites the previous tail's id in place to the
//! bare move ordinal, padded to the same decimal width so every byte offset
//! after it is unchanged.

use gtp_core::id::{self, GAME_LEN};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Rough upper bound on one command's text, times the maximum game length.
pub const LOG_CAPACITY: usize = 40 * GAME_LEN as usize;

pub struct CommandLog {
    buf: String,
    /// Byte offset of the tail command.
    tail: usize,
    /// Id of the tail command; `None` while the log is empty.
    tail_id: Option<u32>,
    /// Last id ever issued, kept across game resets so a fresh id never
    /// repeats the previous one even over a `clear_board`.
    last_issued: Option<u32>,
    /// Number of `play` commands appended since the last game start; used as
    /// the id ordinal in place of a real board move counter.
    move_count: u32,
    rng: SmallRng,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Deterministic log (for testing)
    #[allow(dead_code)]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            buf: String::with_capacity(LOG_CAPACITY),
            tail: 0,
            tail_id: None,
            last_issued: None,
            move_count: 0,
            rng,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Id of the command currently being fanned out.
    pub fn tail_id(&self) -> Option<u32> {
        self.tail_id
    }

    /// Ordinal the next command would carry (for testing)
    #[allow(dead_code)]
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Start a new game: drop all history.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.tail = 0;
        self.tail_id = None;
        self.move_count = 0;
    }

    /// Append a command, sealing the previous tail. Returns the fresh id.
    ///
    /// `args` may be empty; a trailing newline is supplied here.
    pub fn append(&mut self, cmd: &str, args: &str) -> u32 {
        use std::fmt::Write as _;

        if !self.buf.is_empty() {
            self.seal_tail();
            self.tail = self.buf.len();
        }

        let ordinal = if gtp_core::is_gamestart(cmd) { 0 } else { self.move_count };
        let id = self.fresh_id(ordinal);

        let args = args.trim();
        if args.is_empty() {
            let _ = writeln!(self.buf, "{id} {cmd}");
        } else {
            let _ = writeln!(self.buf, "{id} {cmd} {args}");
        }
        self.tail_id = Some(id);
        self.last_issued = Some(id);
        if cmd.eq_ignore_ascii_case("play") {
            self.move_count += 1;
        }
        id
    }

    /// The byte range a synchronized slave receives: the tail command.
    pub fn broadcast_payload(&self) -> &str {
        &self.buf[self.tail..]
    }

    /// The byte range a desynchronized slave receives: everything.
    pub fn full_history(&self) -> &str {
        &self.buf
    }

    /// Pick `force_reply(ordinal + nonce * GAME_LEN)` with a 16-bit nonce,
    /// rerolling until it differs from the previously issued id so slaves can
    /// tell a new command from a repeat.
    fn fresh_id(&mut self, ordinal: u32) -> u32 {
        loop {
            let nonce: u32 = self.rng.gen_range(0..65536);
            let candidate = id::force_reply(ordinal + nonce * GAME_LEN);
            if Some(candidate) != self.last_issued {
                return candidate;
            }
        }
    }

    /// Rewrite the tail command's id to the bare ordinal, preserving the
    /// decimal width so later offsets stay valid.
    fn seal_tail(&mut self) {
        let line = &self.buf[self.tail..];
        let width = line.bytes().take_while(u8::is_ascii_digit).count();
        debug_assert!(width > 0, "tail command has no id field");
        let old: u32 = line[..width].parse().expect("tail id is decimal");
        let sealed = format!("{:0width$}", id::prevent_reply(old));
        debug_assert_eq!(sealed.len(), width, "ordinal wider than sealed id slot");
        self.buf.replace_range(self.tail..self.tail + width, &sealed);
        self.tail_id = None;
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtp_core::id::{parse_leading_id, reply_required};

    fn log() -> CommandLog {
        CommandLog::with_seed(7)
    }

    fn ids_in(log: &CommandLog) -> Vec<u32> {
        log.full_history()
            .lines()
            .map(|l| parse_leading_id(l).expect("every command carries an id"))
            .collect()
    }

    #[test]
    fn append_formats_id_word_args() {
        let mut log = log();
        let id = log.append("boardsize", "19");
        assert_eq!(log.full_history(), format!("{id} boardsize 19\n"));
        assert_eq!(log.broadcast_payload(), log.full_history());
        assert_eq!(log.tail_id(), Some(id));
    }

    #[test]
    fn append_without_args_still_terminates_the_line() {
        let mut log = log();
        let id = log.append("clear_board", "");
        assert_eq!(log.full_history(), format!("{id} clear_board\n"));
    }

    #[test]
    fn exactly_the_tail_requires_a_reply() {
        let mut log = log();
        log.append("boardsize", "19");
        log.append("clear_board", "");
        log.append("play", "black D4");
        log.append("play", "white Q16");

        let ids = ids_in(&log);
        assert_eq!(ids.len(), 4);
        let (history, tail) = ids.split_at(3);
        assert!(history.iter().all(|&id| !reply_required(id)));
        assert!(reply_required(tail[0]));
        assert_eq!(Some(tail[0]), log.tail_id());
    }

    #[test]
    fn sealing_preserves_id_width_and_later_offsets() {
        let mut log = log();
        log.append("play", "black D4");
        let before = log.full_history().len();
        let first_line_len = log.full_history().lines().next().unwrap().len();

        log.append("play", "white Q16");

        let first_line = log.full_history().lines().next().unwrap();
        assert_eq!(first_line.len(), first_line_len, "in-place rewrite changed the width");
        assert_eq!(&log.full_history()[before..], log.broadcast_payload());

        // The sealed id is zero-padded decimal of the bare ordinal.
        let sealed = first_line.split_whitespace().next().unwrap();
        assert!(sealed.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(sealed.trim_start_matches('0').parse().unwrap_or(0), 0u32);
    }

    #[test]
    fn append_seal_append_matches_direct_append() {
        // Appending A then B yields the same log as appending A, letting the
        // seal happen, then appending B: the seal only clears A's flag.
        let mut log = log();
        let id_a = log.append("play", "black D4");
        let id_b = log.append("play", "white Q16");

        let mut lines = log.full_history().lines();
        let a = lines.next().unwrap();
        let b = lines.next().unwrap();
        assert_eq!(parse_leading_id(a), Some(id::prevent_reply(id_a)));
        assert!(a.ends_with("play black D4"));
        assert_eq!(parse_leading_id(b), Some(id_b));
        assert!(b.ends_with("play white Q16"));
    }

    #[test]
    fn fresh_ids_differ_from_their_predecessor() {
        let mut log = log();
        let mut prev = None;
        for _ in 0..200 {
            let id = log.append("play", "black D4");
            assert_ne!(Some(id), prev);
            assert!(reply_required(id));
            prev = Some(id);
        }
    }

    #[test]
    fn ordinal_counts_plays_within_a_game() {
        let mut log = log();
        let id = log.append("clear_board", "");
        assert_eq!(id::move_ordinal(id), 0);

        let id = log.append("play", "black D4");
        assert_eq!(id::move_ordinal(id), 0);
        let id = log.append("play", "white Q16");
        assert_eq!(id::move_ordinal(id), 1);
        let id = log.append("pachi-genmoves", "black");
        assert_eq!(id::move_ordinal(id), 2);

        log.reset();
        let id = log.append("clear_board", "");
        assert_eq!(id::move_ordinal(id), 0);
        assert_eq!(log.move_count(), 0);
    }

    #[test]
    fn reset_drops_history_but_never_reissues_the_last_id() {
        let mut log = log();
        let before = log.append("clear_board", "");
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.tail_id(), None);
        let after = log.append("clear_board", "");
        assert_ne!(before, after);
    }

    #[test]
    fn full_history_is_a_replayable_transcript() {
        let mut log = log();
        log.append("boardsize", "19");
        log.append("clear_board", "");
        log.append("play", "black D4");

        for line in log.full_history().lines() {
            let mut fields = line.split_whitespace();
            let id = fields.next().unwrap();
            assert!(id.chars().all(|c| c.is_ascii_digit()));
            assert!(fields.next().is_some(), "command word missing");
        }
        assert!(log.full_history().ends_with('\n'));
    }
}
