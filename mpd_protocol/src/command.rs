//! Construction of command lines to send to the server.

use std::borrow::Cow;
use std::fmt::Write as _;

/// A single command, built up argument by argument.
///
/// Every argument added with [`RawCommand::argument`] is wrapped in double quotes and escaped
/// following the MPD client protocol's rules: a backslash-escaped `\` and `"` inside the quotes.
/// This matches how most commands take their arguments (`add "<file>"`, `sticker get song
/// "<file>" rating`). Commands whose grammar mixes bare keywords with quoted values -- such as
/// the legacy `find`/`search TAG "value"` form -- are built up as plain strings using the
/// [`escape`] function directly rather than through this type; see `mpd_client`'s rule-matching
/// helpers for an example.
///
/// ```
/// use mpd_protocol::RawCommand;
///
/// let cmd = RawCommand::new("sticker get").argument("song").argument(r#"Bad "Song".mp3"#);
/// assert_eq!(cmd.as_str(), r#"sticker get "song" "Bad \"Song\".mp3""#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RawCommand(String);

impl RawCommand {
    /// Start a new command with the given verb (e.g. `"find"`, `"status"`).
    pub fn new(verb: &str) -> Self {
        RawCommand(verb.to_owned())
    }

    /// Append a quoted, escaped argument.
    #[must_use]
    pub fn argument<A: AsRef<str>>(mut self, value: A) -> Self {
        self.add_argument(value);
        self
    }

    /// Append a quoted, escaped argument in place.
    pub fn add_argument<A: AsRef<str>>(&mut self, value: A) {
        self.0.push(' ');
        self.0.push('"');
        escape_into(value.as_ref(), &mut self.0);
        self.0.push('"');
    }

    /// Append a raw, unquoted token (used for already-rendered sub-expressions such as
    /// `modified-since <timestamp>`).
    #[must_use]
    pub fn raw_argument(mut self, value: &str) -> Self {
        self.0.push(' ');
        self.0.push_str(value);
        self
    }

    /// Render the full command line, without the trailing newline.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the full command line, including the trailing newline the wire format requires.
    pub fn into_line(mut self) -> String {
        self.0.push('\n');
        self.0
    }
}

impl From<RawCommand> for String {
    fn from(cmd: RawCommand) -> Self {
        cmd.0
    }
}

/// Escape `value` for use inside a double-quoted command argument, per the [protocol's quoting
/// rules](https://www.musicpd.org/doc/html/protocol.html#escaping-in-the-protocol).
pub fn escape(value: &str) -> Cow<'_, str> {
    if value.contains(['\\', '"']) {
        let mut out = String::with_capacity(value.len());
        escape_into(value, &mut out);
        Cow::Owned(out)
    } else {
        Cow::Borrowed(value)
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        let _ = out.write_char(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape(r#"with "quotes""#), r#"with \"quotes\""#);
        assert_eq!(escape(r"with\backslash"), r"with\\backslash");
        assert_eq!(escape("both\\ and \""), "both\\\\ and \\\"");
    }

    #[test]
    fn command_rendering() {
        let cmd = RawCommand::new("find")
            .argument("Artist")
            .argument("AC/DC");
        assert_eq!(cmd.as_str(), r#"find "Artist" "AC/DC""#);
    }

    #[test]
    fn argless_command() {
        let cmd = RawCommand::new("status");
        assert_eq!(cmd.into_line(), "status\n");
    }
}
