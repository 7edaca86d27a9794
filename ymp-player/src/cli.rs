//! Interactive command parsing
//!
//! One command per input line: a keyword (long or short form) optionally
//! followed by an argument.

pub const WELCOME: &str = "Welcome to the Yandex Music player!\nType 'help' for a list of commands.";

pub const HELP: &str = "
Commands:
  s, search <term>  - Search for a track and play it
  n, next           - Play the next track in the results
  p, previous       - Play the previous track in the results
  pp, pause         - Pause or resume playback
  st, stop          - Stop playback
  i, info           - Show the current track
  dl, download      - Download the current track
  u, update         - Check for a newer release
  h, help           - Show this help
  exit              - Exit the program (an empty line works too)
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Next,
    Previous,
    TogglePause,
    Stop,
    Info,
    Download,
    Update,
    Help,
    Exit,
    /// Input that is not a command, or a command missing its argument
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Exit;
        }

        let (keyword, arg) = match line.split_once(char::is_whitespace) {
            Some((keyword, arg)) => (keyword, arg.trim()),
            None => (line, ""),
        };

        match keyword.to_lowercase().as_str() {
            "s" | "search" => {
                if arg.is_empty() {
                    Command::Invalid("search needs a term, e.g. 's daft punk'".to_string())
                } else {
                    Command::Search(arg.to_string())
                }
            }
            "n" | "next" => Command::Next,
            "p" | "previous" | "prev" => Command::Previous,
            "pp" | "pause" => Command::TogglePause,
            "st" | "stop" => Command::Stop,
            "i" | "info" => Command::Info,
            "dl" | "download" => Command::Download,
            "u" | "update" => Command::Update,
            "h" | "help" | "?" => Command::Help,
            "exit" | "quit" | "q" => Command::Exit,
            _ => Command::Invalid(format!("Unknown command '{}'. Type 'help' for a list of commands.", keyword)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_keeps_full_term() {
        assert_eq!(
            Command::parse("s  daft punk  "),
            Command::Search("daft punk".to_string())
        );
        assert_eq!(
            Command::parse("search Aria"),
            Command::Search("Aria".to_string())
        );
    }

    #[test]
    fn test_search_without_term_is_invalid() {
        assert!(matches!(Command::parse("s"), Command::Invalid(_)));
    }

    #[test]
    fn test_short_and_long_forms() {
        assert_eq!(Command::parse("n"), Command::Next);
        assert_eq!(Command::parse("NEXT"), Command::Next);
        assert_eq!(Command::parse("p"), Command::Previous);
        assert_eq!(Command::parse("pp"), Command::TogglePause);
        assert_eq!(Command::parse("pause"), Command::TogglePause);
        assert_eq!(Command::parse("dl"), Command::Download);
        assert_eq!(Command::parse("st"), Command::Stop);
        assert_eq!(Command::parse("i"), Command::Info);
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("u"), Command::Update);
    }

    #[test]
    fn test_exit_and_empty_line() {
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("   "), Command::Exit);
    }

    #[test]
    fn test_unknown_input() {
        match Command::parse("play something") {
            Command::Invalid(msg) => assert!(msg.contains("play")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
