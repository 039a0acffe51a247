//! Input line parsing.

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// Chat turn.
    Say(String),
    /// `/clear`
    Clear,
    /// `/history`
    History,
    /// `/retry`
    Retry,
    /// `/quit` or `/exit`
    Quit,
    /// Any other `/word`.
    Unknown(String),
}

impl Command {
    /// Parse one input line. `//text` sends `/text` literally.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if let Some(escaped) = line.strip_prefix("//") {
            return Self::Say(format!("/{escaped}"));
        }
        let Some(name) = line.strip_prefix('/') else {
            return Self::Say(line.to_owned());
        };
        match name.split_whitespace().next().unwrap_or_default() {
            "clear" => Self::Clear,
            "history" => Self::History,
            "retry" => Self::Retry,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent() {
        assert_eq!(Command::parse("  hello there "), Command::Say("hello there".into()));
    }

    #[test]
    fn blank_is_empty() {
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(Command::parse("/clear"), Command::Clear);
        assert_eq!(Command::parse("/history"), Command::History);
        assert_eq!(Command::parse("/retry now"), Command::Retry);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/help"), Command::Unknown("help".into()));
    }

    #[test]
    fn double_slash_escapes() {
        assert_eq!(Command::parse("//clear"), Command::Say("/clear".into()));
    }
}
