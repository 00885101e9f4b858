//! Board coordinates and stone colors, GTP flavor.
//!
//! Coordinates use the letter-number convention with `I` skipped (`A1` is the
//! lower-left corner, `T19` the upper-right on a 19x19 board), plus the two
//! special moves `pass` and `resign`.

use std::fmt;

use thiserror::Error;

/// Errors from parsing wire-format coordinates and colors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid coordinate '{0}'")]
    InvalidCoord(String),

    #[error("invalid color '{0}'")]
    InvalidColor(String),
}

/// A stone color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b" | "black" => Ok(Stone::Black),
            "w" | "white" => Ok(Stone::White),
            _ => Err(ParseError::InvalidColor(s.to_string())),
        }
    }

    /// Win rates on the wire are from Black's perspective; convert one to the
    /// perspective of `self`.
    #[must_use]
    pub fn normalize_value(self, value: f32) -> f32 {
        match self {
            Stone::Black => value,
            Stone::White => 1.0 - value,
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stone::Black => write!(f, "black"),
            Stone::White => write!(f, "white"),
        }
    }
}

/// A move target: a board point or one of the two special moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coord {
    Pass,
    Resign,
    /// Zero-based column and row; column 0 is `A`, row 0 is `1`.
    Point { col: u8, row: u8 },
}

impl Coord {
    pub fn parse(s: &str, board_size: u8) -> Result<Self, ParseError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pass") {
            return Ok(Coord::Pass);
        }
        if s.eq_ignore_ascii_case("resign") {
            return Ok(Coord::Resign);
        }

        let invalid = || ParseError::InvalidCoord(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() || letter == 'I' {
            return Err(invalid());
        }
        let mut col = letter as u8 - b'A';
        if letter > 'I' {
            col -= 1;
        }
        let row: u8 = chars.as_str().parse().map_err(|_| invalid())?;
        if col >= board_size || row == 0 || row > board_size {
            return Err(invalid());
        }
        Ok(Coord::Point { col, row: row - 1 })
    }

    /// Dense index into a per-coordinate accumulator table.
    /// `resign` and `pass` occupy the two leading slots.
    #[must_use]
    pub fn index(self, board_size: u8) -> usize {
        match self {
            Coord::Resign => 0,
            Coord::Pass => 1,
            Coord::Point { col, row } => 2 + usize::from(row) * usize::from(board_size) + usize::from(col),
        }
    }

    /// Number of accumulator slots needed for a board of the given size.
    #[must_use]
    pub fn slots(board_size: u8) -> usize {
        2 + usize::from(board_size) * usize::from(board_size)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Coord::Pass => write!(f, "pass"),
            Coord::Resign => write!(f, "resign"),
            Coord::Point { col, row } => {
                let mut letter = b'A' + col;
                if letter >= b'I' {
                    letter += 1;
                }
                write!(f, "{}{}", letter as char, row + 1)
            }
        }
    }
}
