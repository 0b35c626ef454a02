//! Parsing of the line-based responses MPD sends back.

use std::fmt;

/// A single key-value pair as sent back by the server (e.g. `volume: 100`).
pub type Field = (String, String);

/// A successful response: zero or more key-value pairs, in the order the server sent them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    fields: Vec<Field>,
}

impl Frame {
    fn push(&mut self, key: String, value: String) {
        self.fields.push((key, value));
    }

    /// Number of key-value pairs in the frame.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the frame carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over all fields in order, without consuming them.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Find the first field with the given (case-sensitive) key.
    pub fn find(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Find every field with the given key, in order.
    pub fn find_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Consume the frame, yielding its fields in order.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

/// An `ACK` error response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    /// The numeric error code MPD assigned.
    pub code: i32,
    /// Index of the failing command within the command list, or 0 outside one.
    pub command_index: u32,
    /// The (possibly empty) name of the failing command, as reported by the server.
    pub command: String,
    /// Human-readable error message.
    pub message: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}@{}] {{{}}} {}", self.code, self.command_index, self.command, self.message)
    }
}

impl std::error::Error for Error {}

/// A complete response to a command: either the fields it returned, or the error it failed with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// The command succeeded, with these fields.
    Success(Frame),
    /// The command failed.
    Error(Error),
}

impl Response {
    /// Parse a complete reply, *without* the trailing newline-terminated `OK`/`ACK` line stripped
    /// off by the caller's framing logic -- i.e. the whole accumulated buffer up to and including
    /// the terminator line.
    ///
    /// Returns `None` if `text` does not end in a recognized terminator; the connection layer
    /// treats that as "not enough data yet" and keeps reading.
    pub fn parse(text: &str) -> Option<Response> {
        let text = text.strip_suffix('\n').unwrap_or(text);

        if let Some(rest) = text.strip_prefix("ACK ") {
            return Some(Response::Error(parse_ack(rest)));
        }

        let body = if text == "OK" {
            ""
        } else {
            text.strip_suffix("\nOK")?
        };

        let mut frame = Frame::default();
        for line in body.lines() {
            let (key, value) = line.split_once(": ")?;
            frame.push(key.to_owned(), value.to_owned());
        }

        Some(Response::Success(frame))
    }

    /// `true` if the buffer accumulated so far looks like a complete response already (i.e.
    /// [`Response::parse`] would succeed on it).
    pub fn is_complete(text: &str) -> bool {
        let trimmed = text.strip_suffix('\n').unwrap_or(text);
        trimmed == "OK" || trimmed.ends_with("\nOK") || trimmed.starts_with("ACK ")
    }
}

/// Parse the body of an `ACK [code@index] {command} message` line (with the `ACK ` prefix
/// already stripped).
fn parse_ack(rest: &str) -> Error {
    // Expected shape: `[5@0] {find} unknown command`
    let (code, command_index, command, message) = (|| {
        let rest = rest.strip_prefix('[')?;
        let (code_part, rest) = rest.split_once('@')?;
        let (index_part, rest) = rest.split_once(']')?;
        let rest = rest.strip_prefix(' ')?;
        let rest = rest.strip_prefix('{')?;
        let (command_part, rest) = rest.split_once('}')?;
        let message = rest.strip_prefix(' ').unwrap_or(rest);

        Some((
            code_part.parse().ok()?,
            index_part.parse().ok()?,
            command_part.to_owned(),
            message.to_owned(),
        ))
    })()
    .unwrap_or((-1, 0, String::new(), rest.to_owned()));

    Error {
        code,
        command_index,
        command,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ok_empty() {
        assert_eq!(Response::parse("OK\n"), Some(Response::Success(Frame::default())));
    }

    #[test]
    fn parse_ok_fields() {
        let resp = Response::parse("volume: 100\nstate: play\nOK\n").unwrap();
        match resp {
            Response::Success(frame) => {
                assert_eq!(frame.find("volume"), Some("100"));
                assert_eq!(frame.find("state"), Some("play"));
                assert_eq!(frame.len(), 2);
            }
            Response::Error(_) => panic!("expected success"),
        }
    }

    #[test]
    fn parse_incomplete_returns_none() {
        assert_eq!(Response::parse("volume: 100\n"), None);
        assert!(!Response::is_complete("volume: 100\n"));
    }

    #[test]
    fn parse_ack() {
        let resp = Response::parse("ACK [5@0] {find} unknown command \"find\"\n").unwrap();
        match resp {
            Response::Error(e) => {
                assert_eq!(e.code, 5);
                assert_eq!(e.command, "find");
                assert_eq!(e.message, "unknown command \"find\"");
            }
            Response::Success(_) => panic!("expected error"),
        }
    }

    #[test]
    fn repeated_fields_preserved() {
        let resp = Response::parse("file: a\nfile: b\nOK\n").unwrap();
        match resp {
            Response::Success(frame) => {
                assert_eq!(
                    frame.find_all("file").collect::<Vec<_>>(),
                    vec!["a", "b"]
                );
            }
            Response::Error(_) => panic!("expected success"),
        }
    }
}
