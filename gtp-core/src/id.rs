//! Command-id scheme for the master/slave wire.
//!
//! Every command the master sends carries a decimal id. The id packs two
//! fields: a move ordinal (monotone within a game, 0 for game-start commands)
//! and a reply-required flag. Slaves only answer the command whose flag is
//! set; earlier history commands are rewritten to the bare ordinal so a replay
//! collapses into a single reply.
//!
//! Ids are `ordinal + nonce * GAME_LEN`. The flag is encoded by the id being
//! at least `GAME_LEN`: `force_reply` adds `GAME_LEN`, `prevent_reply` reduces
//! the id to the ordinal alone.

/// Upper bound on moves per game; also the modulus separating the ordinal
/// from the nonce/flag part of an id.
pub const GAME_LEN: u32 = 1000;

/// Mark an id as requiring a reply.
#[inline]
#[must_use]
pub fn force_reply(id: u32) -> u32 {
    id + GAME_LEN
}

/// Strip the reply-required flag and the nonce, leaving the move ordinal.
#[inline]
#[must_use]
pub fn prevent_reply(id: u32) -> u32 {
    id % GAME_LEN
}

/// The move ordinal encoded in an id.
#[inline]
#[must_use]
pub fn move_ordinal(id: u32) -> u32 {
    id % GAME_LEN
}

/// Whether a slave is expected to answer this id.
#[inline]
#[must_use]
pub fn reply_required(id: u32) -> bool {
    id >= GAME_LEN
}

/// Parse the leading decimal id of a command line, if any.
#[must_use]
pub fn parse_leading_id(line: &str) -> Option<u32> {
    let digits = line.split(|c: char| !c.is_ascii_digit()).next()?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_and_prevent_agree_on_ordinal() {
        for ordinal in [0u32, 1, 57, 999] {
            for nonce in [0u32, 1, 1234, 65535] {
                let raw = ordinal + nonce * GAME_LEN;
                let forced = force_reply(raw);
                assert!(reply_required(forced));
                assert_eq!(move_ordinal(forced), ordinal);
                let cleared = prevent_reply(forced);
                assert!(!reply_required(cleared));
                assert_eq!(move_ordinal(cleared), ordinal);
            }
        }
    }

    #[test]
    fn prevent_reply_is_idempotent() {
        let id = force_reply(42 + 99 * GAME_LEN);
        assert_eq!(prevent_reply(prevent_reply(id)), prevent_reply(id));
    }

    #[test]
    fn max_id_fits_in_u32() {
        // Largest ordinal, largest 16-bit nonce.
        let id = force_reply((GAME_LEN - 1) + 65535 * GAME_LEN);
        assert!(reply_required(id));
        assert_eq!(move_ordinal(id), GAME_LEN - 1);
    }

    #[test]
    fn parse_leading_id_reads_digits_only() {
        assert_eq!(parse_leading_id("12345 play black D4"), Some(12345));
        assert_eq!(parse_leading_id("7 boardsize 19"), Some(7));
        assert_eq!(parse_leading_id("play black D4"), None);
        assert_eq!(parse_leading_id(""), None);
    }
}
