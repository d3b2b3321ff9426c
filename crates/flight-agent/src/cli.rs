use std::path::PathBuf;

use shared::persona::Persona;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Scripted,
    Live,
}

impl RunMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scripted => "scripted",
            Self::Live => "live",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub mode: RunMode,
    pub chat_persona: Option<PathBuf>,
    pub api_persona: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("invalid --mode value: {0}")]
    InvalidMode(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut mode = RunMode::Scripted;
        let mut chat_persona = None;
        let mut api_persona = None;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--mode" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    mode = parse_mode(&value)?;
                }
                "--chat-persona" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    chat_persona = Some(PathBuf::from(value));
                }
                "--api-persona" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    api_persona = Some(PathBuf::from(value));
                }
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(Self {
            mode,
            chat_persona,
            api_persona,
        })
    }
}

fn parse_mode(value: &str) -> Result<RunMode, CliError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "scripted" => Ok(RunMode::Scripted),
        "live" => Ok(RunMode::Live),
        _ => Err(CliError::InvalidMode(value.to_string())),
    }
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Search,
    Erase,
    ShowForm,
    ReloadPersona { persona: Persona, path: PathBuf },
    Speech(String),
    Quit,
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Self::Chat(line.to_string()));
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));

        match name {
            "search" => Ok(Self::Search),
            "erase" => Ok(Self::Erase),
            "form" => Ok(Self::ShowForm),
            "quit" | "exit" => Ok(Self::Quit),
            "speech" if !rest.is_empty() => Ok(Self::Speech(rest.to_string())),
            "speech" => Err(CommandError::Usage("/speech <text>")),
            "persona" => parse_persona_reload(rest),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_persona_reload(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/persona chat|api <file>";

    let (which, path) = rest
        .split_once(char::is_whitespace)
        .ok_or(CommandError::Usage(USAGE))?;
    let persona = match which {
        "chat" => Persona::Chat,
        "api" => Persona::Api,
        _ => return Err(CommandError::Usage(USAGE)),
    };
    let path = path.trim();
    if path.is_empty() {
        return Err(CommandError::Usage(USAGE));
    }

    Ok(Command::ReloadPersona {
        persona,
        path: PathBuf::from(path),
    })
}
