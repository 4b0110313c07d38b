use thiserror::Error;

use crate::command::CommandId;

/// Why a request was refused before anything was written to the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum InvalidReason {
    #[strum(to_string = "not in the command set")]
    Unknown,
    #[strum(to_string = "no station connected")]
    NotConnected,
    #[strum(to_string = "no tip selected")]
    NoTip,
    #[strum(to_string = "a set request needs a payload")]
    MissingPayload,
    #[strum(to_string = "payload must not contain line breaks")]
    MalformedPayload,
    #[strum(to_string = "value out of range")]
    OutOfRange,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StationError {
    #[error("invalid command `{command}`: {reason}")]
    InvalidCommand {
        command: String,
        reason: InvalidReason,
    },
    #[error("{command}: {message}")]
    Device { command: CommandId, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("another request is in flight")]
    Busy,
}

impl StationError {
    pub(crate) fn invalid(command: impl Into<String>, reason: InvalidReason) -> Self {
        StationError::InvalidCommand {
            command: command.into(),
            reason,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("port {0} is not currently available")]
    PortUnavailable(String),
    #[error("failed to open {port}: {reason}")]
    OpenFailed { port: String, reason: String },
    #[error("port enumeration failed: {0}")]
    ListingFailed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TipError {
    #[error("unknown tip: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, StationError>;
