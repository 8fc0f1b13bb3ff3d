//! Spawning a string command through the platform shell.

use std::process::Command;

/// Build a [`Command`] that runs `command` through the platform shell.
///
/// On Windows this is `cmd /C <command>`; everywhere else it is
/// `sh -c <command>`. The engine never parses the command string itself —
/// quoting and word-splitting are the shell's problem, same as `make`.
pub fn shell_command(command: &str) -> Command
{
    let mut cmd = if cfg!(windows) {
        Command::new("cmd")
    } else {
        Command::new("sh")
    };
    cmd.arg(if cfg!(windows) { "/C" } else { "-c" });
    cmd.arg(command);
    cmd
}
