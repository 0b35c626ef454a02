use std::{collections::HashMap, mem, path::Path, time::Duration};

use mpd_protocol::response::Frame;

use crate::{
    ids::{SongId, SongPosition},
    responses::{parse_duration, FromFieldValue, Timestamp, TypedResponseError},
    tag::Tag,
};

/// A [`Song`] in the current queue, as returned by the `playlistinfo` command.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct SongInQueue {
    /// Position in queue.
    pub position: SongPosition,
    /// ID in queue.
    pub id: SongId,
    /// The range of the song that will be played.
    pub range: Option<SongRange>,
    /// The priority.
    pub priority: u8,
    /// The song.
    pub song: Song,
}

impl SongInQueue {
    /// Convert the given frame into a list of `SongInQueue`s.
    pub(crate) fn from_frame_multi(frame: Frame) -> Result<Vec<SongInQueue>, TypedResponseError> {
        let mut out = Vec::new();
        let mut builder = SongBuilder::default();

        for (key, value) in frame.into_fields() {
            if let Some(song) = builder.field(&key, value)? {
                out.push(song);
            }
        }

        if let Some(song) = builder.finish() {
            out.push(song);
        }

        Ok(out)
    }
}

/// A single song, as returned by the `playlist` or `currentsong` commands.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Song {
    /// Unique identifier of the song. May be a file path relative to the library root, or a URL
    /// to a remote resource.
    ///
    /// This is the `file` key as returned by MPD.
    pub url: String,
    /// The `duration` as returned by MPD.
    pub duration: Option<Duration>,
    /// Tags in this response.
    pub tags: HashMap<Tag, Vec<String>>,
    /// The `format` as returned by MPD.
    pub format: Option<String>,
    /// Last modification date of the underlying file.
    pub last_modified: Option<Timestamp>,
}

impl Song {
    /// Get the file as a `Path`. Note that if the file is a remote URL, operations on the result
    /// will give unexpected results.
    pub fn file_path(&self) -> &Path {
        Path::new(&self.url)
    }

    /// Get all artists of the song.
    pub fn artists(&self) -> &[String] {
        self.tag_values(&Tag::Artist)
    }

    /// Get the album of the song.
    pub fn album(&self) -> Option<&str> {
        self.single_tag_value(&Tag::Album)
    }

    /// Get the title of the song.
    pub fn title(&self) -> Option<&str> {
        self.single_tag_value(&Tag::Title)
    }

    /// Get the genres of the song.
    pub fn genres(&self) -> &[String] {
        self.tag_values(&Tag::Genre)
    }

    /// Convert the given frame into a single `Song`, e.g. as returned by `currentsong`.
    pub(crate) fn from_frame_single(frame: Frame) -> Result<Option<Song>, TypedResponseError> {
        let mut builder = SongBuilder::default();

        for (key, value) in frame.into_fields() {
            builder.field(&key, value)?;
        }

        Ok(builder.finish().map(|s| s.song))
    }

    fn tag_values(&self, tag: &Tag) -> &[String] {
        match self.tags.get(tag) {
            Some(v) => v.as_slice(),
            None => &[],
        }
    }

    fn single_tag_value(&self, tag: &Tag) -> Option<&str> {
        match self.tag_values(tag) {
            [] => None,
            [v, ..] => Some(v),
        }
    }
}

/// Range used when playing only part of a [`Song`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SongRange {
    /// Start playback at this timestamp.
    pub from: Duration,
    /// End at this timestamp (if the end is known).
    pub to: Option<Duration>,
}

impl FromFieldValue for SongRange {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        let Some((from, to)) = v.split_once('-') else {
            return Err(TypedResponseError::invalid_value(field, v));
        };

        let from = parse_duration(field, from)?;
        let to = if to.is_empty() {
            None
        } else {
            Some(parse_duration(field, to)?)
        };

        Ok(SongRange { from, to })
    }
}

#[derive(Debug, Default)]
struct SongBuilder {
    url: String,
    position: usize,
    id: u64,
    range: Option<SongRange>,
    priority: u8,
    duration: Option<Duration>,
    tags: HashMap<Tag, Vec<String>>,
    format: Option<String>,
    last_modified: Option<Timestamp>,
}

impl SongBuilder {
    /// Handle a field from a song list.
    ///
    /// If this returns `Ok(Some(_))`, a song was completed and another one started.
    fn field(
        &mut self,
        key: &str,
        value: String,
    ) -> Result<Option<SongInQueue>, TypedResponseError> {
        if self.url.is_empty() {
            self.handle_start_field(key, value)?;
            Ok(None)
        } else {
            self.handle_song_field(key, value)
        }
    }

    fn handle_start_field(&mut self, key: &str, value: String) -> Result<(), TypedResponseError> {
        match key {
            "file" => self.url = value,
            "directory" | "playlist" | "Last-Modified" => (),
            other => return Err(TypedResponseError::unexpected_field("file", other)),
        }

        Ok(())
    }

    fn handle_song_field(
        &mut self,
        key: &str,
        value: String,
    ) -> Result<Option<SongInQueue>, TypedResponseError> {
        if is_start_field(key) {
            let song = mem::take(self).into_song();
            self.handle_start_field(key, value)?;
            return Ok(Some(song));
        }

        match key {
            "duration" => self.duration = Some(Duration::from_value(value, "duration")?),
            "Time" => {
                if self.duration.is_none() {
                    self.duration = Some(Duration::from_value(value, "Time")?);
                }
            }
            "Range" => self.range = Some(SongRange::from_value(value, "Range")?),
            "Format" => self.format = Some(value),
            "Last-Modified" => {
                self.last_modified = Some(Timestamp::from_value(value, "Last-Modified")?);
            }
            "Prio" => self.priority = u8::from_value(value, "Prio")?,
            "Pos" => self.position = usize::from_value(value, "Pos")?,
            "Id" => self.id = u64::from_value(value, "Id")?,
            tag => {
                // The protocol layer already validated the field name, so this always succeeds.
                let tag = Tag::try_from(tag).unwrap();
                self.tags.entry(tag).or_default().push(value);
            }
        }

        Ok(None)
    }

    fn finish(self) -> Option<SongInQueue> {
        if self.url.is_empty() {
            None
        } else {
            Some(self.into_song())
        }
    }

    fn into_song(self) -> SongInQueue {
        assert!(!self.url.is_empty());

        SongInQueue {
            position: SongPosition(self.position),
            id: SongId(self.id),
            range: self.range,
            priority: self.priority,
            song: Song {
                url: self.url,
                duration: self.duration,
                tags: self.tags,
                format: self.format,
                last_modified: self.last_modified,
            },
        }
    }
}

fn is_start_field(f: &str) -> bool {
    matches!(f, "file" | "directory" | "playlist")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TIMESTAMP: &str = "2020-06-12T17:53:00Z";

    #[test]
    fn song_builder() {
        let mut builder = SongBuilder::default();

        assert!(builder.field("file", "test.flac".into()).unwrap().is_none());
        assert!(builder.field("duration", "123.456".into()).unwrap().is_none());
        assert!(builder
            .field("Last-Modified", TEST_TIMESTAMP.into())
            .unwrap()
            .is_none());
        assert!(builder.field("Title", "Foo".into()).unwrap().is_none());
        assert!(builder.field("Id", "12".into()).unwrap().is_none());
        assert!(builder.field("Pos", "5".into()).unwrap().is_none());

        let song = builder.field("file", "foo.flac".into()).unwrap().unwrap();

        assert_eq!(song.position, SongPosition(5));
        assert_eq!(song.id, SongId(12));
        assert_eq!(song.song.url, "test.flac");
        assert_eq!(song.song.duration, Some(Duration::from_secs_f64(123.456)));
        assert_eq!(song.song.title(), Some("Foo"));

        let song = builder.finish().unwrap();
        assert_eq!(song.song.url, "foo.flac");
        assert!(song.song.tags.is_empty());
    }

    #[test]
    fn song_builder_unrelated_entries() {
        let mut builder = SongBuilder::default();

        assert!(builder.field("playlist", "foo.m3u".into()).unwrap().is_none());
        assert!(builder.field("directory", "foo".into()).unwrap().is_none());
        assert!(builder.field("file", "foo.flac".into()).unwrap().is_none());

        let song = builder.field("directory", "mep".into()).unwrap().unwrap();
        assert_eq!(song.song.url, "foo.flac");

        assert!(builder.finish().is_none());
    }

    #[test]
    fn song_builder_deprecated_time_field() {
        let mut builder = SongBuilder::default();

        assert!(builder.field("file", "foo.flac".into()).unwrap().is_none());
        assert!(builder.field("Time", "123".into()).unwrap().is_none());
        assert_eq!(builder.duration, Some(Duration::from_secs(123)));

        assert!(builder.field("duration", "456.700".into()).unwrap().is_none());
        assert_eq!(builder.duration, Some(Duration::from_secs_f64(456.7)));

        let song = builder.finish().unwrap().song;
        assert_eq!(song.duration, Some(Duration::from_secs_f64(456.7)));
    }

    #[test]
    fn parse_range() {
        assert_eq!(
            SongRange::from_value("1.500-5.642".into(), "Range").unwrap(),
            SongRange {
                from: Duration::from_secs_f64(1.5),
                to: Some(Duration::from_secs_f64(5.642)),
            }
        );

        assert_eq!(
            SongRange::from_value("1.500-".into(), "Range").unwrap(),
            SongRange {
                from: Duration::from_secs_f64(1.5),
                to: None,
            }
        );

        assert!(SongRange::from_value("foo".into(), "Range").is_err());
    }
}
