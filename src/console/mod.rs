use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::display::TerminalSink;
use crate::session::Session;

const HELP: &str = "\
commands:
  add <secret> [-- <label>]   add a base32 secret
  del                         delete the last entry
  save                        save keys
  purge                       delete saved keys
  show                        redraw the board
  help                        this text
  quit                        exit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Add { secret: String, label: String },
    Delete,
    Save,
    Purge,
    Show,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    match word {
        "" => Command::Empty,
        "add" | "a" => {
            let (secret, label) = match rest.split_once("--") {
                Some((s, l)) => (s.trim(), l.trim()),
                None => (rest, ""),
            };
            Command::Add {
                secret: secret.to_owned(),
                label: label.to_owned(),
            }
        }
        "del" | "d" => Command::Delete,
        "save" | "s" => Command::Save,
        "purge" => Command::Purge,
        "show" | "ls" => Command::Show,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_owned()),
    }
}

/// Apply one command. Returns `false` once the user asked to leave.
pub fn execute<W: Write + Send>(
    session: &Session,
    board: &TerminalSink<W>,
    command: Command,
) -> bool {
    match command {
        Command::Add { secret, label } => {
            if session.submit_secret(&secret, &label).is_ok() {
                println!("key added");
            }
        }
        Command::Delete => {
            if session.remove_last_entry().is_none() {
                println!("nothing to delete");
            }
        }
        Command::Save => {
            if let Ok(n) = session.request_save() {
                println!("saved {} key(s)", n);
            }
        }
        Command::Purge => {
            if let Ok(removed) = session.request_delete_persisted() {
                if removed {
                    println!("saved keys deleted");
                } else {
                    println!("no saved keys");
                }
            }
        }
        Command::Show => board.show(),
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
        Command::Empty => {}
        Command::Unknown(word) => println!("unknown command {:?}, try help", word),
    }
    true
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run<W: Write + Send>(
    session: &Session,
    board: &TerminalSink<W>,
) -> io::Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !execute(session, board, parse(&line)) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn parses_add_with_and_without_label() {
        assert_eq!(
            parse("add jbsw y3dp ehpk 3pxp -- work mail"),
            Command::Add {
                secret: "jbsw y3dp ehpk 3pxp".into(),
                label: "work mail".into()
            }
        );
        assert_eq!(
            parse("  a JBSWY3DPEHPK3PXP  "),
            Command::Add {
                secret: "JBSWY3DPEHPK3PXP".into(),
                label: String::new()
            }
        );
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse("del"), Command::Delete);
        assert_eq!(parse("save"), Command::Save);
        assert_eq!(parse("purge"), Command::Purge);
        assert_eq!(parse("show"), Command::Show);
        assert_eq!(parse("?"), Command::Help);
        assert_eq!(parse("q"), Command::Quit);
        assert_eq!(parse("   "), Command::Empty);
        assert_eq!(parse("frobnicate 1"), Command::Unknown("frobnicate".into()));
    }

    #[test]
    fn execute_drives_the_session() {
        let dir = tempdir().unwrap();
        let config = Config {
            store_path: dir.path().join("saved"),
            ..Config::default()
        };
        let board = Arc::new(TerminalSink::new(Vec::new()));
        let (session, mut scheduler) = Session::open(&config, board.clone()).unwrap();

        assert!(execute(&session, board.as_ref(), parse("add JBSWY3DPEHPK3PXP -- demo")));
        scheduler.tick();
        assert_eq!(session.store().len(), 1);

        assert!(execute(&session, board.as_ref(), parse("save")));
        assert!(config.store_path.exists());
        assert!(execute(&session, board.as_ref(), parse("purge")));
        assert!(!config.store_path.exists());

        assert!(execute(&session, board.as_ref(), parse("del")));
        assert!(session.store().is_empty());

        assert!(!execute(&session, board.as_ref(), parse("quit")));
    }
}
