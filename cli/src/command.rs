//! Line commands for the interactive session.

use dialectic_types::{DisplayMode, SettingsPatch, SettingsPatchError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: submit to the chat session.
    Submit(String),
    DisplayMode(DisplayMode),
    Set(SettingsPatch),
    Settings,
    Health,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Unknown(String),
    Settings(SettingsPatchError),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Unknown(cmd) => write!(f, "unknown command ':{cmd}' (try :help)"),
            ParseError::Settings(e) => write!(f, "{e}"),
        }
    }
}

pub const HELP: &str = "\
Type an argument and press enter to analyse it.
  :support | :defence   switch the view of the latest analysis
  :set key=value        change a setting (e.g. :set enableChatbot=false)
  :settings             show current settings
  :health               check the analysis service
  :quit                 exit
";

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Submit(line.to_string()));
        };

        let (name, arg) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(n, a)| (n, a.trim()));
        let command = match name.to_ascii_lowercase().as_str() {
            "support" => Command::DisplayMode(DisplayMode::Support),
            "defence" | "defense" => Command::DisplayMode(DisplayMode::Defence),
            "set" => Command::Set(SettingsPatch::from_assignment(arg).map_err(ParseError::Settings)?),
            "settings" => Command::Settings,
            "health" => Command::Health,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}
