//! Typed responses to individual commands.

mod list;
mod song;
mod sticker;
mod timestamp;

use std::{error::Error, fmt, num::ParseIntError, str::FromStr, time::Duration};

use mpd_protocol::response::Frame;

pub use self::{
    list::List,
    song::{Song, SongInQueue, SongRange},
    sticker::{StickerFind, StickerGet, StickerList},
    timestamp::Timestamp,
};
use crate::ids::{SingleMode, SongId, SongPosition};

/// Error returned when failing to convert a raw [`Frame`] into the proper typed response.
#[derive(Debug)]
pub struct TypedResponseError {
    kind: ErrorKind,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl TypedResponseError {
    /// Construct a "Missing field" error.
    pub fn missing<F: Into<String>>(field: F) -> TypedResponseError {
        TypedResponseError {
            kind: ErrorKind::Missing {
                field: field.into(),
            },
            source: None,
        }
    }

    /// Construct an "Unexpected field" error.
    pub fn unexpected_field<E: Into<String>, F: Into<String>>(
        expected: E,
        found: F,
    ) -> TypedResponseError {
        TypedResponseError {
            kind: ErrorKind::UnexpectedField {
                expected: expected.into(),
                found: found.into(),
            },
            source: None,
        }
    }

    /// Construct an "Invalid value" error.
    pub fn invalid_value<F: Into<String>>(field: F, value: String) -> TypedResponseError {
        TypedResponseError {
            kind: ErrorKind::InvalidValue {
                field: field.into(),
                value,
            },
            source: None,
        }
    }

    /// Attach a source error, most useful alongside [invalid
    /// value][TypedResponseError::invalid_value].
    pub fn source<E: Error + Send + Sync + 'static>(self, source: E) -> TypedResponseError {
        TypedResponseError {
            source: Some(Box::from(source)),
            ..self
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Missing { field: String },
    UnexpectedField { expected: String, found: String },
    InvalidValue { field: String, value: String },
}

impl fmt::Display for TypedResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Missing { field } => write!(f, "field {field:?} is required but missing"),
            ErrorKind::UnexpectedField { expected, found } => {
                write!(f, "expected field {expected:?} but found {found:?}")
            }
            ErrorKind::InvalidValue { field, value } => {
                write!(f, "invalid value {value:?} for field {field:?}")
            }
        }
    }
}

impl Error for TypedResponseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}

/// Types which can be converted from a field value.
pub(crate) trait FromFieldValue: Sized {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError>;
}

impl FromFieldValue for bool {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        match &*v {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(TypedResponseError::invalid_value(field, v)),
        }
    }
}

impl FromFieldValue for Duration {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        parse_duration(field, v)
    }
}

impl FromFieldValue for PlayState {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        match &*v {
            "play" => Ok(PlayState::Playing),
            "pause" => Ok(PlayState::Paused),
            "stop" => Ok(PlayState::Stopped),
            _ => Err(TypedResponseError::invalid_value(field, v)),
        }
    }
}

fn parse_integer<I: FromStr<Err = ParseIntError>>(
    v: String,
    field: &str,
) -> Result<I, TypedResponseError> {
    v.parse::<I>()
        .map_err(|e| TypedResponseError::invalid_value(field, v).source(e))
}

impl FromFieldValue for u8 {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        parse_integer(v, field)
    }
}

impl FromFieldValue for u32 {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        parse_integer(v, field)
    }
}

impl FromFieldValue for u64 {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        parse_integer(v, field)
    }
}

impl FromFieldValue for usize {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        parse_integer(v, field)
    }
}

/// Get a *required* value for the given field, as the given type.
pub(crate) fn value<V: FromFieldValue>(
    frame: &Frame,
    field: &'static str,
) -> Result<V, TypedResponseError> {
    let value = frame
        .find(field)
        .ok_or_else(|| TypedResponseError::missing(field))?
        .to_owned();
    V::from_value(value, field)
}

/// Get an *optional* value for the given field, as the given type.
fn optional_value<V: FromFieldValue>(
    frame: &Frame,
    field: &'static str,
) -> Result<Option<V>, TypedResponseError> {
    match frame.find(field) {
        None => Ok(None),
        Some(v) => Ok(Some(V::from_value(v.to_owned(), field)?)),
    }
}

fn song_identifier(
    frame: &Frame,
    position_field: &'static str,
    id_field: &'static str,
) -> Result<Option<(SongPosition, SongId)>, TypedResponseError> {
    let position = match optional_value(frame, position_field)? {
        Some(p) => SongPosition(p),
        None => return Ok(None),
    };

    let id = value(frame, id_field).map(SongId)?;

    Ok(Some((position, id)))
}

fn parse_duration<V: AsRef<str> + Into<String>>(
    field: &str,
    value: V,
) -> Result<Duration, TypedResponseError> {
    let v = match value.as_ref().parse::<f64>() {
        Ok(v) => v,
        Err(e) => return Err(TypedResponseError::invalid_value(field, value.into()).source(e)),
    };

    if v >= 0.0 && v <= Duration::MAX.as_secs_f64() && v.is_finite() {
        Ok(Duration::from_secs_f64(v))
    } else {
        Err(TypedResponseError::invalid_value(field, value.into()))
    }
}

/// Possible playback states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// Response to the `status` command.
///
/// See the [MPD documentation](https://www.musicpd.org/doc/html/protocol.html#command-status)
/// for the specific meanings of the fields.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub struct Status {
    pub volume: u8,
    pub state: PlayState,
    pub repeat: bool,
    pub random: bool,
    pub consume: bool,
    pub single: SingleMode,
    pub playlist_version: u32,
    pub playlist_length: usize,
    pub current_song: Option<(SongPosition, SongId)>,
    pub next_song: Option<(SongPosition, SongId)>,
    pub elapsed: Option<Duration>,
    pub duration: Option<Duration>,
    pub bitrate: Option<u64>,
    pub update_job: Option<u64>,
    pub error: Option<String>,
}

impl Status {
    pub(crate) fn from_frame(frame: Frame) -> Result<Self, TypedResponseError> {
        let single = match frame.find("single") {
            None => SingleMode::Disabled,
            Some("0") => SingleMode::Disabled,
            Some("1") => SingleMode::Enabled,
            Some("oneshot") => SingleMode::Oneshot,
            Some(val) => return Err(TypedResponseError::invalid_value("single", val.to_owned())),
        };

        Ok(Self {
            volume: optional_value(&frame, "volume")?.unwrap_or(0),
            state: value(&frame, "state")?,
            repeat: value(&frame, "repeat")?,
            random: value(&frame, "random")?,
            consume: value(&frame, "consume")?,
            single,
            playlist_length: optional_value(&frame, "playlistlength")?.unwrap_or(0),
            playlist_version: optional_value(&frame, "playlist")?.unwrap_or(0),
            current_song: song_identifier(&frame, "song", "songid")?,
            next_song: song_identifier(&frame, "nextsong", "nextsongid")?,
            elapsed: optional_value(&frame, "elapsed")?,
            duration: optional_value(&frame, "duration")?,
            bitrate: optional_value(&frame, "bitrate")?,
            update_job: optional_value(&frame, "updating_db")?,
            error: frame.find("error").map(str::to_owned),
        })
    }
}

/// Response to the `stats` command, containing general server statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub struct Stats {
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
    pub uptime: Duration,
    pub playtime: Duration,
    pub db_playtime: Duration,
    /// Raw server UNIX timestamp of last database update.
    pub db_last_update: u64,
}

impl Stats {
    pub(crate) fn from_frame(frame: Frame) -> Result<Self, TypedResponseError> {
        Ok(Self {
            artists: value(&frame, "artists")?,
            albums: value(&frame, "albums")?,
            songs: value(&frame, "songs")?,
            uptime: value(&frame, "uptime")?,
            playtime: value(&frame, "playtime")?,
            db_playtime: value(&frame, "db_playtime")?,
            db_last_update: value(&frame, "db_update")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parsing() {
        assert_eq!(
            parse_duration("duration", "1.500").unwrap(),
            Duration::from_secs_f64(1.5)
        );

        assert!(parse_duration("duration", "asdf").is_err());
        assert!(parse_duration("duration", "-1").is_err());
        assert!(parse_duration("duration", "NaN").is_err());
    }

    #[test]
    fn status_parses_single_mode() {
        let frame = frame_from(
            "volume: 50\n\
             state: play\n\
             repeat: 0\n\
             random: 0\n\
             consume: 0\n\
             single: oneshot\n\
             playlist: 3\n\
             playlistlength: 10\n\
             OK\n",
        );

        let status = Status::from_frame(frame).unwrap();
        assert_eq!(status.single, SingleMode::Oneshot);
        assert_eq!(status.volume, 50);
        assert_eq!(status.state, PlayState::Playing);
    }

    fn frame_from(text: &str) -> Frame {
        match mpd_protocol::Response::parse(text).unwrap() {
            mpd_protocol::Response::Success(f) => f,
            mpd_protocol::Response::Error(_) => unreachable!(),
        }
    }
}
