//! Reply framing for the slave wire.
//!
//! A slave reply is `=<id> ...` on success or `?<id> ...` on failure, followed
//! by zero or more payload lines and terminated by one blank line. The helpers
//! here parse the pieces the master cares about; everything else in a reply is
//! treated as opaque text.

/// The id echoed at the start of a reply line, if the line carries one.
#[must_use]
pub fn reply_id(line: &str) -> Option<u32> {
    let rest = line
        .strip_prefix('=')
        .or_else(|| line.strip_prefix('?'))?;
    let digits: &str = rest.split(|c: char| !c.is_ascii_digit()).next()?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Whether a reply is a success (`=`) rather than an error (`?`).
#[must_use]
pub fn is_affirmative(reply: &str) -> bool {
    reply.starts_with('=')
}

/// Parsed header line of a `pachi-genmoves` reply:
/// `=<id> <total_playouts> <threads>[ <extra>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenmovesHeader {
    pub id: u32,
    pub playouts: u64,
    pub threads: u32,
}

/// Parse a genmoves header line. Trailing tokens beyond the third are ignored
/// so slaves may extend the format.
#[must_use]
pub fn parse_genmoves_header(line: &str) -> Option<GenmovesHeader> {
    let rest = line.strip_prefix('=')?;
    let mut fields = rest.split_whitespace();
    let id = fields.next()?.parse().ok()?;
    let playouts = fields.next()?.parse().ok()?;
    let threads = fields.next()?.parse().ok()?;
    Some(GenmovesHeader { id, playouts, threads })
}
