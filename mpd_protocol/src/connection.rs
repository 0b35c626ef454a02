//! The connection type itself.

use std::io::{self, BufRead, BufReader, Read, Write};

use tracing::{instrument, trace};

use crate::command::RawCommand;
use crate::error::MpdProtocolError;
use crate::response::Response;

const GREETING_PREFIX: &str = "OK MPD ";

/// A connection to an MPD server, generic over the underlying I/O stream.
///
/// This only handles framing: sending a command line and reading back the accumulated reply
/// text until a terminator (`OK` or `ACK ...`) is seen. It does not know what any particular
/// command means.
#[derive(Debug)]
pub struct Connection<IO> {
    io: BufReader<IO>,
    protocol_version: String,
}

impl<IO: Read + Write> Connection<IO> {
    /// Connect to a server on the given stream, reading and validating its greeting line.
    ///
    /// Returns [`MpdProtocolError::InvalidMessage`] if the first line does not start with
    /// `OK MPD `.
    #[instrument(skip_all)]
    pub fn connect(io: IO) -> Result<Self, MpdProtocolError> {
        let mut io = BufReader::new(io);

        let mut greeting = String::new();
        io.read_line(&mut greeting)?;

        let greeting = greeting.trim_end_matches(['\r', '\n']);
        let protocol_version = greeting
            .strip_prefix(GREETING_PREFIX)
            .ok_or(MpdProtocolError::InvalidMessage)?
            .to_owned();

        trace!(protocol_version, "connected");

        Ok(Connection {
            io,
            protocol_version,
        })
    }

    /// The protocol version the server reported in its greeting (e.g. `0.23.5`).
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Send a command and wait for the complete response.
    #[instrument(skip(self))]
    pub fn send(&mut self, command: RawCommand) -> Result<Response, MpdProtocolError> {
        let line = command.into_line();
        trace!(%line, "sending command");
        self.io.get_mut().write_all(line.as_bytes())?;

        self.receive()
    }

    /// Read a complete response from the wire, blocking until one is available.
    ///
    /// Used directly (rather than through [`Connection::send`]) for unsolicited messages like
    /// the reply to `idle`, where no new command was just sent.
    #[instrument(skip(self))]
    pub fn receive(&mut self) -> Result<Response, MpdProtocolError> {
        let mut buf = String::new();

        loop {
            let read = self.io.read_line(&mut buf)?;
            if read == 0 {
                return Err(MpdProtocolError::InvalidMessage);
            }

            if Response::is_complete(&buf) {
                break;
            }
        }

        Response::parse(&buf).ok_or(MpdProtocolError::InvalidMessage)
    }
}

impl<IO> Connection<IO> {
    /// Split off the inner stream, discarding any buffered-but-unread bytes.
    ///
    /// Only safe to call between responses, never with a pending reply.
    pub fn into_inner(self) -> IO {
        self.io.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A `Read + Write` double backed by separate input/output buffers.
    struct MockIo {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockIo {
        fn new(input: &str) -> Self {
            MockIo {
                input: Cursor::new(input.as_bytes().to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockIo {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockIo {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejects_bad_greeting() {
        let io = MockIo::new("garbage\n");
        assert!(matches!(
            Connection::connect(io),
            Err(MpdProtocolError::InvalidMessage)
        ));
    }

    #[test]
    fn parses_greeting_version() {
        let io = MockIo::new("OK MPD 0.23.5\n");
        let conn = Connection::connect(io).unwrap();
        assert_eq!(conn.protocol_version(), "0.23.5");
    }

    #[test]
    fn send_writes_command_and_reads_reply() {
        let io = MockIo::new("OK MPD 0.23.5\nvolume: 100\nOK\n");
        let mut conn = Connection::connect(io).unwrap();

        let resp = conn.send(RawCommand::new("status")).unwrap();
        match resp {
            Response::Success(frame) => assert_eq!(frame.find("volume"), Some("100")),
            Response::Error(_) => panic!("expected success"),
        }

        assert_eq!(conn.io.get_ref().output, b"status\n");
    }

    #[test]
    fn receive_surfaces_ack() {
        let io = MockIo::new("OK MPD 0.23.5\nACK [5@0] {find} unknown command \"find\"\n");
        let mut conn = Connection::connect(io).unwrap();

        let resp = conn.receive().unwrap();
        match resp {
            Response::Error(e) => assert_eq!(e.code, 5),
            Response::Success(_) => panic!("expected error"),
        }
    }
}
