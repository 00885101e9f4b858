//! GTP protocol primitives for the distributed Go master.
//!
//! This crate holds everything both the master-side coordination code and its
//! tests need to speak the Go Text Protocol over the slave wire: the command-id
//! scheme, board coordinates and colors, reply framing, and the small amount of
//! command classification the master performs before fanning a command out.
//!
//! The board itself (legality, capture, scoring) lives in the slave engines;
//! nothing here knows how to play Go.

pub mod command;
pub mod coord;
pub mod id;
pub mod reply;

pub use command::{is_deferred, is_gamestart, should_intercept, translate};
pub use coord::{Coord, ParseError, Stone};
pub use id::{force_reply, move_ordinal, prevent_reply, reply_required, GAME_LEN};
pub use reply::{is_affirmative, parse_genmoves_header, reply_id, GenmovesHeader};
