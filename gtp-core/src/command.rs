//! Classification of upstream GTP commands before fan-out.

/// Commands that wipe the game state and therefore restart the command log.
#[must_use]
pub fn is_gamestart(cmd: &str) -> bool {
    cmd.eq_ignore_ascii_case("boardsize")
        || cmd.eq_ignore_ascii_case("clear_board")
        || cmd.eq_ignore_ascii_case("kgs-rules")
}

/// Commands the master never forwards to slaves. `quit` is forwarded only
/// when the operator opted in with `slaves_quit`.
#[must_use]
pub fn should_intercept(cmd: &str, slaves_quit: bool) -> bool {
    (cmd.eq_ignore_ascii_case("quit") && !slaves_quit)
        || cmd.eq_ignore_ascii_case("uct_genbook")
        || cmd.eq_ignore_ascii_case("uct_dumpbook")
        || cmd.eq_ignore_ascii_case("kgs-chat")
}

/// Rewrite an upstream command name to its slave-side counterpart. Slaves run
/// the plain UCT engine, so move generation is requested with the
/// statistics-reporting `pachi-genmoves` family instead of `genmove`.
#[must_use]
pub fn translate(cmd: &str) -> &str {
    if cmd.eq_ignore_ascii_case("genmove") {
        "pachi-genmoves"
    } else if cmd.eq_ignore_ascii_case("kgs-genmove_cleanup") {
        "pachi-genmoves_cleanup"
    } else if cmd.eq_ignore_ascii_case("final_score") {
        "final_status_list"
    } else {
        cmd
    }
}

/// Commands whose replies the coordinator does not wait for inside `notify`;
/// the dedicated entry points (`genmove`, `dead_group_list`) wait instead,
/// with a deadline.
#[must_use]
pub fn is_deferred(cmd: &str) -> bool {
    cmd.eq_ignore_ascii_case("pachi-genmoves")
        || cmd.eq_ignore_ascii_case("pachi-genmoves_cleanup")
        || cmd.eq_ignore_ascii_case("final_status_list")
}
