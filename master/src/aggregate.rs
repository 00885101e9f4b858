//! Folding per-slave statistics into one decision.
//!
//! A `pachi-genmoves` reply is a header `=<id> <total_playouts> <threads>`
//! followed by `<coord> <playouts> <value>` lines, value in [0,1] from
//! Black's perspective. Replies from different slaves disagree; the master
//! merges them per coordinate with playout-weighted averaging and picks the
//! coordinate with the most playouts overall.

use gtp_core::reply::parse_genmoves_header;
use gtp_core::{Coord, Stone};

/// Playout-weighted statistics for one coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveStats {
    pub playouts: u64,
    /// Mean win rate from Black's perspective, weighted by playouts.
    pub value: f32,
}

impl MoveStats {
    pub fn add(&mut self, playouts: u64, value: f32) {
        let total = self.playouts + playouts;
        if total > 0 {
            self.value = (self.value * self.playouts as f32 + value * playouts as f32)
                / total as f32;
        }
        self.playouts = total;
    }

    /// Win rate from the given color's perspective.
    #[must_use]
    pub fn value_for(&self, color: Stone) -> f32 {
        color.normalize_value(self.value)
    }
}

/// Outcome of merging all replies to one move-generation command.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub coord: Coord,
    pub stats: MoveStats,
    /// Sum of the header playout counts across replies.
    pub total_playouts: u64,
    /// Sum of the header thread counts across replies.
    pub total_threads: u64,
}

/// Pick the move with the highest aggregate playout count.
///
/// Ties break toward the coordinate that reached the winning count first, in
/// reply order. Replies with an unparseable header contribute nothing; data
/// lines that fail to parse are skipped.
#[must_use]
pub fn select_best_move(replies: &[String], board_size: u8) -> Selection {
    let mut stats = vec![MoveStats::default(); Coord::slots(board_size)];
    let mut best = Coord::Pass;
    let mut best_playouts: Option<u64> = None;
    let mut total_playouts = 0u64;
    let mut total_threads = 0u64;

    for reply in replies {
        let mut lines = reply.lines();
        let Some(header) = lines.next().and_then(parse_genmoves_header) else {
            continue;
        };
        total_playouts += header.playouts;
        total_threads += u64::from(header.threads);

        for line in lines {
            let Some((coord, playouts, value)) = parse_stat_line(line, board_size) else {
                continue;
            };
            let slot = &mut stats[coord.index(board_size)];
            slot.add(playouts, value);
            if best_playouts.map_or(true, |b| slot.playouts > b) {
                best_playouts = Some(slot.playouts);
                best = coord;
            }
        }
    }

    Selection {
        coord: best,
        stats: stats[best.index(board_size)],
        total_playouts,
        total_threads,
    }
}

fn parse_stat_line(line: &str, board_size: u8) -> Option<(Coord, u64, f32)> {
    let mut fields = line.split_whitespace();
    let coord = Coord::parse(fields.next()?, board_size).ok()?;
    let playouts = fields.next()?.parse().ok()?;
    let value = fields.next()?.parse().ok()?;
    Some((coord, playouts, value))
}

/// Plurality vote over `final_status_list` replies: sort, take the longest
/// run of identical replies, and read the first coordinate of each group line
/// out of the winner. The first group shares the header line with the id.
#[must_use]
pub fn plurality_dead_groups(replies: &[String], board_size: u8) -> Vec<Coord> {
    let mut sorted: Vec<&String> = replies.iter().collect();
    sorted.sort_by(|a, b| {
        a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
    });

    let Some(mut winner) = sorted.first().copied() else {
        return Vec::new();
    };
    let mut best_count = 1;
    let mut count = 1;
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            count += 1;
        } else {
            count = 1;
        }
        if count > best_count {
            best_count = count;
            winner = pair[1];
        }
    }

    let Some((_, groups)) = winner.split_once(' ') else {
        return Vec::new();
    };
    groups
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|tok| Coord::parse(tok, board_size).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(replies: &[&str]) -> Vec<String> {
        replies.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn merges_two_slaves_by_weighted_playouts() {
        let replies = strings(&[
            "=101 1500 8\nD4 1000 0.55\nQ16 500 0.60\n",
            "=101 1700 8\nD4 800 0.50\nQ4 900 0.70\n",
        ]);
        let sel = select_best_move(&replies, 19);

        assert_eq!(sel.coord, Coord::parse("D4", 19).unwrap());
        assert_eq!(sel.stats.playouts, 1800);
        let expected = (1000.0 * 0.55 + 800.0 * 0.50) / 1800.0;
        assert!((sel.stats.value - expected).abs() < 1e-5);
        assert_eq!(sel.total_playouts, 3200);
        assert_eq!(sel.total_threads, 16);
    }

    #[test]
    fn ties_break_toward_the_earliest_to_reach_the_count() {
        let replies = strings(&[
            "=5 100 1\nC3 400 0.5\nD4 400 0.5\n",
        ]);
        let sel = select_best_move(&replies, 19);
        // D4 only equals C3's count, never exceeds it.
        assert_eq!(sel.coord, Coord::parse("C3", 19).unwrap());
    }

    #[test]
    fn permuting_replies_keeps_the_winner_absent_ties() {
        let a = "=1 100 2\nD4 1000 0.55\nQ16 500 0.60\n".to_string();
        let b = "=1 100 2\nD4 800 0.50\nQ4 900 0.70\n".to_string();
        let fwd = select_best_move(&[a.clone(), b.clone()], 19);
        let rev = select_best_move(&[b, a], 19);
        assert_eq!(fwd.coord, rev.coord);
        assert_eq!(fwd.stats, rev.stats);
    }

    #[test]
    fn unparseable_header_drops_the_whole_reply() {
        let replies = strings(&[
            "garbage\nD4 9999 0.9\n",
            "=7 100 1\nQ16 10 0.4\n",
        ]);
        let sel = select_best_move(&replies, 19);
        assert_eq!(sel.coord, Coord::parse("Q16", 19).unwrap());
        assert_eq!(sel.total_playouts, 100);
    }

    #[test]
    fn unparseable_data_lines_are_skipped() {
        let replies = strings(&[
            "=7 100 1\nnot-a-coord 10 0.4\nD4 fast 0.4\nD4 10\nQ16 10 0.4\n",
        ]);
        let sel = select_best_move(&replies, 19);
        assert_eq!(sel.coord, Coord::parse("Q16", 19).unwrap());
    }

    #[test]
    fn empty_reply_set_selects_pass_with_no_playouts() {
        let sel = select_best_move(&[], 19);
        assert_eq!(sel.coord, Coord::Pass);
        assert_eq!(sel.stats.playouts, 0);
    }

    #[test]
    fn pass_and_resign_have_their_own_slots() {
        let replies = strings(&[
            "=7 100 1\npass 500 0.3\nresign 100 0.1\nD4 300 0.6\n",
        ]);
        let sel = select_best_move(&replies, 19);
        assert_eq!(sel.coord, Coord::Pass);
        assert_eq!(sel.stats.playouts, 500);
    }

    #[test]
    fn weighted_average_accumulates() {
        let mut stats = MoveStats::default();
        stats.add(1000, 0.55);
        stats.add(800, 0.50);
        assert_eq!(stats.playouts, 1800);
        assert!((stats.value - 0.52777).abs() < 1e-4);
        assert!((stats.value_for(Stone::White) - (1.0 - 0.52777)).abs() < 1e-4);
    }

    #[test]
    fn plurality_vote_picks_the_most_common_reply() {
        let majority = "=9 A1\nB2 C2\n";
        let replies = strings(&[
            "=9 T19\n",
            majority,
            "=9 A1\nB2 C2 D2\n",
            majority,
            majority,
        ]);
        let dead = plurality_dead_groups(&replies, 19);
        assert_eq!(
            dead,
            vec![Coord::parse("A1", 19).unwrap(), Coord::parse("B2", 19).unwrap()]
        );
    }

    #[test]
    fn plurality_vote_handles_empty_and_clean_boards() {
        assert!(plurality_dead_groups(&[], 19).is_empty());
        // No dead stones: replies carry only the id.
        let replies = strings(&["=9\n", "=9\n"]);
        assert!(plurality_dead_groups(&replies, 19).is_empty());
    }
}
