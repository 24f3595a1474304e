use std::fmt;
use std::io;
use thiserror::Error;

/// Which way a history traversal was asked to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Back,
    Forward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Back => f.write_str("back"),
            Direction::Forward => f.write_str("forward"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("transport {transport} unavailable: {reason}")]
    TransportUnavailable { transport: String, reason: String },
    #[error("no history to go {0}")]
    NoHistory(Direction),
    #[error("nothing to navigate to")]
    EmptyInput,
    #[error("history entries cannot be empty")]
    EmptyHistoryEntry,
    #[error("invalid url '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("config file error: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ShellError {
    fn from(value: toml::de::Error) -> Self {
        ShellError::Toml(value.to_string())
    }
}

pub type ShellResult<T> = Result<T, ShellError>;
