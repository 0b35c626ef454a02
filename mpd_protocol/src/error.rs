use std::{error, fmt, io};

/// Errors that can occur at the protocol/transport level.
#[derive(Debug)]
pub enum MpdProtocolError {
    /// An I/O error occurred on the underlying stream.
    Io(io::Error),
    /// The server sent something that could not be parsed as a valid response (e.g. a greeting
    /// that did not start with `OK MPD`, or a reply missing its terminating line).
    InvalidMessage,
}

impl fmt::Display for MpdProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpdProtocolError::Io(_) => write!(f, "I/O error"),
            MpdProtocolError::InvalidMessage => write!(f, "received malformed protocol message"),
        }
    }
}

impl error::Error for MpdProtocolError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MpdProtocolError::Io(e) => Some(e),
            MpdProtocolError::InvalidMessage => None,
        }
    }
}

impl From<io::Error> for MpdProtocolError {
    fn from(e: io::Error) -> Self {
        MpdProtocolError::Io(e)
    }
}
