//! Line commands read from stdin while playing.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

/// One parsed input line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `p` - start or stop playback
    TogglePlay,
    /// `t <bpm>` - change tempo (raw text, validated by the sequencer)
    Tempo(String),
    /// `x <row> <col>` - toggle a cell
    ToggleCell(usize, usize),
    /// `c` - clear the grid
    Clear,
    /// `v <col>` - preview a voice
    Preview(usize),
    /// `q` - quit
    Quit,
}

pub const HELP: &str = "commands: p (play/stop), t <bpm>, x <row> <col>, c (clear), v <col> (preview), q (quit)";

fn parse_index(arg: Option<&str>, what: &str) -> Result<usize, String> {
    let arg = arg.ok_or_else(|| format!("missing {}", what))?;
    arg.parse()
        .map_err(|_| format!("'{}' is not a valid {}", arg, what))
}

/// Parse one line of user input. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };

    let command = match verb {
        "p" | "play" => Command::TogglePlay,
        "t" | "tempo" => {
            let rest: Vec<&str> = parts.by_ref().collect();
            if rest.is_empty() {
                return Err("missing tempo".to_string());
            }
            return Ok(Some(Command::Tempo(rest.join(" "))));
        }
        "x" | "toggle" => {
            let row = parse_index(parts.next(), "row")?;
            let column = parse_index(parts.next(), "column")?;
            Command::ToggleCell(row, column)
        }
        "c" | "clear" => Command::Clear,
        "v" | "preview" => Command::Preview(parse_index(parts.next(), "column")?),
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };

    if let Some(extra) = parts.next() {
        return Err(format!("unexpected argument '{}'", extra));
    }
    Ok(Some(command))
}

/// Forward every parsed line of `reader` to `tx`.
///
/// At end of input a [`Command::Quit`] is sent if `quit_on_eof` is set.
fn forward_lines(reader: impl BufRead, tx: &Sender<Command>, quit_on_eof: bool) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        match parse_command(&line) {
            Ok(Some(command)) => {
                if tx.send(command).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{} ({})", e, HELP),
        }
    }
    if quit_on_eof {
        let _ = tx.send(Command::Quit);
    }
}

/// Read stdin on a background thread, forwarding parsed commands.
pub fn spawn_stdin_reader(tx: Sender<Command>, quit_on_eof: bool) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stepgrid-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            forward_lines(stdin.lock(), &tx, quit_on_eof);
            log::debug!("stdin closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("p"), Ok(Some(Command::TogglePlay)));
        assert_eq!(parse_command("  c "), Ok(Some(Command::Clear)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Quit)));
        assert_eq!(parse_command(""), Ok(None));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_command("x 3 1"), Ok(Some(Command::ToggleCell(3, 1))));
        assert_eq!(parse_command("v 7"), Ok(Some(Command::Preview(7))));
        assert_eq!(
            parse_command("t 132.5"),
            Ok(Some(Command::Tempo("132.5".to_string())))
        );
    }

    #[test]
    fn test_tempo_text_is_passed_through() {
        // Validation is the sequencer's job
        assert_eq!(
            parse_command("t fast"),
            Ok(Some(Command::Tempo("fast".to_string())))
        );
        assert!(parse_command("t").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("x 3").is_err());
        assert!(parse_command("x a 1").is_err());
        assert!(parse_command("v -1").is_err());
        assert!(parse_command("p now").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_end_of_input_quits_only_when_asked() {
        let (tx, rx) = crossbeam_channel::unbounded();
        forward_lines(Cursor::new("p\n\nbogus\nx 1 2\n"), &tx, true);
        let received: Vec<Command> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![Command::TogglePlay, Command::ToggleCell(1, 2), Command::Quit]
        );

        forward_lines(Cursor::new("c\n"), &tx, false);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Command::Clear]);

        forward_lines(Cursor::new(""), &tx, false);
        assert!(rx.try_recv().is_err());
    }
}
