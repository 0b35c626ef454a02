use std::{error, fmt};

use mpd_protocol::{response::Error as ErrorResponse, MpdProtocolError};

pub use crate::responses::TypedResponseError;

/// Errors which can occur when issuing a command.
#[derive(Debug)]
pub enum CommandError {
    /// An underlying protocol error occurred, including I/O errors and unexpected disconnects.
    Protocol(MpdProtocolError),
    /// The command returned an `ACK` error.
    ErrorResponse(ErrorResponse),
    /// A typed command failed to convert its response.
    InvalidTypedResponse(TypedResponseError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Protocol(_) => write!(f, "protocol error"),
            CommandError::InvalidTypedResponse(_) => {
                write!(f, "response was invalid for typed command")
            }
            CommandError::ErrorResponse(e) => {
                write!(f, "command returned an error [code {}]: {}", e.code, e.message)
            }
        }
    }
}

impl error::Error for CommandError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CommandError::Protocol(e) => Some(e),
            CommandError::InvalidTypedResponse(e) => Some(e),
            CommandError::ErrorResponse(e) => Some(e),
        }
    }
}

#[doc(hidden)]
impl From<MpdProtocolError> for CommandError {
    fn from(e: MpdProtocolError) -> Self {
        CommandError::Protocol(e)
    }
}

#[doc(hidden)]
impl From<ErrorResponse> for CommandError {
    fn from(e: ErrorResponse) -> Self {
        CommandError::ErrorResponse(e)
    }
}

#[doc(hidden)]
impl From<TypedResponseError> for CommandError {
    fn from(e: TypedResponseError) -> Self {
        CommandError::InvalidTypedResponse(e)
    }
}
