//! Minimal GTP front-end on stdin/stdout.
//!
//! Just enough protocol to put the coordination engine behind a controller:
//! administrative commands are answered here, everything else is mirrored to
//! the fleet first and acknowledged after. Board bookkeeping, scoring and
//! time policy belong to a real front-end; this one passes moves through and
//! never computes a deadline.

use std::io::Write as _;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use gtp_core::{Coord, Stone};

use crate::engine::Master;

const ENGINE_NAME: &str = "Distributed Engine";

const KNOWN_COMMANDS: &[&str] = &[
    "boardsize",
    "clear_board",
    "final_status_list",
    "genmove",
    "kgs-chat",
    "kgs-genmove_cleanup",
    "kgs-rules",
    "komi",
    "list_commands",
    "name",
    "play",
    "protocol_version",
    "quit",
    "time_left",
    "time_settings",
    "uct_dumpbook",
    "uct_genbook",
    "version",
];

#[derive(Debug, PartialEq, Eq)]
struct Request {
    id: Option<u32>,
    cmd: String,
    args: String,
}

fn parse_request(line: &str) -> Option<Request> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return None;
    }
    let mut fields = line.splitn(2, char::is_whitespace);
    let first = fields.next()?;
    let (id, cmd) = if first.chars().all(|c| c.is_ascii_digit()) {
        let cmd = fields.next().unwrap_or("").trim();
        let mut rest = cmd.splitn(2, char::is_whitespace);
        let cmd = rest.next().unwrap_or("");
        let args = rest.next().unwrap_or("").trim().to_string();
        return if cmd.is_empty() {
            None
        } else {
            Some(Request {
                id: first.parse().ok(),
                cmd: cmd.to_string(),
                args,
            })
        };
    } else {
        (None, first)
    };
    let args = fields.next().unwrap_or("").trim().to_string();
    Some(Request {
        id,
        cmd: cmd.to_string(),
        args,
    })
}

fn respond(id: Option<u32>, ok: bool, payload: &str) {
    let marker = if ok { '=' } else { '?' };
    let mut out = std::io::stdout().lock();
    let _ = match (id, payload.is_empty()) {
        (Some(id), true) => writeln!(out, "{marker}{id}\n"),
        (Some(id), false) => writeln!(out, "{marker}{id} {payload}\n"),
        (None, true) => writeln!(out, "{marker}\n"),
        (None, false) => writeln!(out, "{marker} {payload}\n"),
    };
    let _ = out.flush();
}

/// Serve GTP until the controller quits or closes stdin.
pub async fn run(master: &mut Master) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(req) = parse_request(&line) else {
            continue;
        };
        debug!(cmd = %req.cmd, args = %req.args, "gtp command");

        if !KNOWN_COMMANDS.contains(&req.cmd.to_ascii_lowercase().as_str()) {
            respond(req.id, false, "unknown command");
            continue;
        }

        master.notify(&req.cmd, &req.args).await?;

        let quit = req.cmd.eq_ignore_ascii_case("quit");
        answer(master, &req).await;
        if quit {
            break;
        }
    }
    Ok(())
}

async fn answer(master: &mut Master, req: &Request) {
    let cmd = req.cmd.to_ascii_lowercase();
    match cmd.as_str() {
        "name" => respond(req.id, true, ENGINE_NAME),
        "version" => respond(req.id, true, env!("CARGO_PKG_VERSION")),
        "protocol_version" => respond(req.id, true, "2"),
        "list_commands" => respond(req.id, true, &KNOWN_COMMANDS.join("\n")),
        "genmove" | "kgs-genmove_cleanup" => match Stone::parse(&req.args) {
            Ok(color) => match master.genmove(color, None).await {
                Ok(coord) => respond(req.id, true, &coord.to_string()),
                Err(e) => respond(req.id, false, &e.to_string()),
            },
            Err(e) => respond(req.id, false, &e.to_string()),
        },
        "final_status_list" => match master.dead_group_list().await {
            Ok(dead) => {
                let groups: Vec<String> = dead.iter().map(Coord::to_string).collect();
                respond(req.id, true, &groups.join("\n"));
            }
            Err(e) => respond(req.id, false, &e.to_string()),
        },
        "kgs-chat" => match master.chat(&req.args) {
            Some(text) => respond(req.id, true, &text),
            None => respond(req.id, false, "unknown chat command"),
        },
        // State updates were already mirrored by notify.
        _ => respond(req.id, true, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: Option<u32>, cmd: &str, args: &str) -> Request {
        Request {
            id,
            cmd: cmd.into(),
            args: args.into(),
        }
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_request("clear_board"), Some(req(None, "clear_board", "")));
        assert_eq!(parse_request("play black D4"), Some(req(None, "play", "black D4")));
    }

    #[test]
    fn parses_numbered_commands() {
        assert_eq!(parse_request("7 genmove b"), Some(req(Some(7), "genmove", "b")));
        assert_eq!(
            parse_request("12 play white Q16"),
            Some(req(Some(12), "play", "white Q16"))
        );
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        assert_eq!(parse_request("   # just a comment"), None);
        assert_eq!(parse_request(""), None);
        assert_eq!(parse_request("boardsize 19 # large"), Some(req(None, "boardsize", "19")));
    }

    #[test]
    fn a_lone_id_is_not_a_command() {
        assert_eq!(parse_request("42"), None);
    }

    #[test]
    fn known_commands_cover_the_move_generation_family() {
        for cmd in ["genmove", "kgs-genmove_cleanup", "final_status_list", "quit"] {
            assert!(KNOWN_COMMANDS.contains(&cmd));
        }
    }

    #[test]
    fn known_commands_cover_the_intercepted_book_commands() {
        // These must reach notify so its interception applies; the fleet
        // never sees them.
        for cmd in ["uct_genbook", "uct_dumpbook", "kgs-chat"] {
            assert!(KNOWN_COMMANDS.contains(&cmd));
        }
    }
}
