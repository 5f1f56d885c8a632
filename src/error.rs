//! Error types for the mapping core.
//!
//! Engine and persistence operations return [`Result`]; the binary wraps these
//! in `anyhow` with context at the call site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI device '{0}' not found")]
    DeviceNotFound(String),

    #[error("MIDI device '{0}' has no matching output port")]
    NoMatchingOutput(String),

    #[error("No active device profile")]
    NoActiveProfile,

    #[error("MIDI driver error: {0}")]
    Driver(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Coarse classification of an [`Error`], as surfaced to front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fail,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Config(_) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Fail,
        }
    }
}

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Driver(e.to_string())
    }
}

impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::Driver(e.to_string())
    }
}

impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::Driver(e.to_string())
    }
}

impl<T> From<midir::ConnectError<T>> for Error {
    fn from(e: midir::ConnectError<T>) -> Self {
        Error::Driver(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
