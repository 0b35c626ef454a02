//! The client implementation.

use std::io::{Read, Write};

use mpd_protocol::{response::Response as RawResponse, Connection as RawConnection, RawCommand};
use tracing::{debug, instrument, trace};

use crate::errors::CommandError;
use crate::responses::{List, Song, SongInQueue, StickerFind, StickerGet, StickerList, Stats, Status};

/// A synchronous connection to an MPD server.
///
/// Unlike a long-lived async client, this type owns a single blocking connection: every method
/// sends exactly one command and waits for its reply. Callers that need to watch for state
/// changes alternate [`Client::idle`] with the convenience methods below, following the same
/// request/reply rhythm MPD's own protocol document describes.
#[derive(Debug)]
pub struct Client<IO> {
    connection: RawConnection<IO>,
}

impl<IO: Read + Write> Client<IO> {
    /// Connect to the server over the given stream, without authenticating.
    #[instrument(skip_all)]
    pub fn connect(io: IO) -> Result<Self, CommandError> {
        let connection = RawConnection::connect(io)?;
        Ok(Client { connection })
    }

    /// Connect to the server and authenticate with the given password.
    #[instrument(skip(io, password))]
    pub fn connect_with_password(io: IO, password: &str) -> Result<Self, CommandError> {
        let mut client = Self::connect(io)?;
        client.password(password)?;
        Ok(client)
    }

    /// The protocol version the server reported in its greeting.
    pub fn protocol_version(&self) -> &str {
        self.connection.protocol_version()
    }

    /// Send a raw command line and return its successful frame, or the command's error.
    #[instrument(skip(self))]
    pub fn raw_command(&mut self, command: RawCommand) -> Result<mpd_protocol::response::Frame, CommandError> {
        match self.connection.send(command)? {
            RawResponse::Success(frame) => Ok(frame),
            RawResponse::Error(e) => Err(e.into()),
        }
    }

    /// Authenticate with the given password.
    pub fn password(&mut self, password: &str) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("password").argument(password))?;
        Ok(())
    }

    /// `status`: the player's current state.
    pub fn status(&mut self) -> Result<Status, CommandError> {
        let frame = self.raw_command(RawCommand::new("status"))?;
        Ok(Status::from_frame(frame)?)
    }

    /// `stats`: server-wide statistics.
    pub fn stats(&mut self) -> Result<Stats, CommandError> {
        let frame = self.raw_command(RawCommand::new("stats"))?;
        Ok(Stats::from_frame(frame)?)
    }

    /// `playlistinfo`: every song currently in the queue.
    pub fn playlist(&mut self) -> Result<Vec<SongInQueue>, CommandError> {
        let frame = self.raw_command(RawCommand::new("playlistinfo"))?;
        Ok(SongInQueue::from_frame_multi(frame)?)
    }

    /// `currentsong`: the song the player is currently on, if any.
    pub fn current_song(&mut self) -> Result<Option<Song>, CommandError> {
        let frame = self.raw_command(RawCommand::new("currentsong"))?;
        Ok(Song::from_frame_single(frame)?)
    }

    /// `lsinfo`: metadata for a single file path, without requiring it to be in the queue.
    pub fn lsinfo(&mut self, uri: &str) -> Result<Option<Song>, CommandError> {
        let frame = self.raw_command(RawCommand::new("lsinfo").argument(uri))?;
        Ok(Song::from_frame_single(frame)?)
    }

    /// `add`: append a file to the queue, returning its assigned queue ID.
    pub fn add(&mut self, uri: &str) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("add").argument(uri))?;
        Ok(())
    }

    /// `delete`: remove the song at the given queue position.
    pub fn delete(&mut self, position: usize) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("delete").raw_argument(&position.to_string()))?;
        Ok(())
    }

    /// `clear`: empty the queue entirely.
    pub fn clear(&mut self) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("clear"))?;
        Ok(())
    }

    /// `play`: start playback at the given queue position.
    pub fn play(&mut self, position: usize) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("play").raw_argument(&position.to_string()))?;
        Ok(())
    }

    /// Run a `find`/`search`-style legacy query (`<verb> TAG "value" [TAG "value" ...]`) that the
    /// caller has already assembled, returning the matching songs.
    ///
    /// This takes an already-rendered command line rather than structured arguments because the
    /// legacy query grammar mixes bare tag names with quoted values in a way a generic argument
    /// builder can't express; see the rule engine for how these lines get built.
    pub fn find(&mut self, query_line: &str) -> Result<Vec<Song>, CommandError> {
        let frame = self.raw_command(RawCommand::new(query_line))?;
        Ok(Song::from_frame_multi(frame)?)
    }

    /// `list`: list unique values of a tag across the library, optionally filtered.
    ///
    /// As with [`Client::find`], `query_line` is a fully-assembled legacy command line (e.g.
    /// `list Genre`).
    pub fn list(&mut self, query_line: &str) -> Result<List, CommandError> {
        let frame = self.raw_command(RawCommand::new(query_line))?;
        Ok(List::from_frame(frame))
    }

    /// `sticker get song <uri> <name>`
    pub fn sticker_get(&mut self, uri: &str, name: &str) -> Result<StickerGet, CommandError> {
        let frame = self.raw_command(
            RawCommand::new("sticker get")
                .raw_argument("song")
                .argument(uri)
                .argument(name),
        )?;
        Ok(StickerGet::from_frame(frame)?)
    }

    /// `sticker set song <uri> <name> <value>`
    pub fn sticker_set(&mut self, uri: &str, name: &str, value: &str) -> Result<(), CommandError> {
        self.raw_command(
            RawCommand::new("sticker set")
                .raw_argument("song")
                .argument(uri)
                .argument(name)
                .argument(value),
        )?;
        Ok(())
    }

    /// `sticker list song <uri>`
    pub fn sticker_list(&mut self, uri: &str) -> Result<StickerList, CommandError> {
        let frame = self.raw_command(
            RawCommand::new("sticker list").raw_argument("song").argument(uri),
        )?;
        Ok(StickerList::from_frame(frame)?)
    }

    /// `sticker find song <dir> <name>`
    pub fn sticker_find(&mut self, dir: &str, name: &str) -> Result<StickerFind, CommandError> {
        let frame = self.raw_command(
            RawCommand::new("sticker find")
                .raw_argument("song")
                .argument(dir)
                .argument(name),
        )?;
        Ok(StickerFind::from_frame(frame)?)
    }

    /// `subscribe <channel>`
    pub fn subscribe(&mut self, channel: &str) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("subscribe").argument(channel))?;
        Ok(())
    }

    /// `sendmessage <channel> <text>`
    pub fn send_message(&mut self, channel: &str, text: &str) -> Result<(), CommandError> {
        self.raw_command(RawCommand::new("sendmessage").argument(channel).argument(text))?;
        Ok(())
    }

    /// `readmessages`: drain pending messages on all subscribed channels.
    pub fn read_messages(&mut self) -> Result<Vec<(String, String)>, CommandError> {
        let frame = self.raw_command(RawCommand::new("readmessages"))?;
        let mut messages = Vec::new();
        let mut channel = None;

        for (key, value) in frame.into_fields() {
            match key.as_str() {
                "channel" => channel = Some(value),
                "message" => {
                    if let Some(channel) = channel.take() {
                        messages.push((channel, value));
                    }
                }
                _ => {}
            }
        }

        Ok(messages)
    }

    /// `idle [subsystem ...]`: block until the server reports a state change, returning the
    /// names of the changed subsystems (possibly empty, if the server woke us up spuriously).
    #[instrument(skip(self))]
    pub fn idle(&mut self, subsystems: &[&str]) -> Result<Vec<String>, CommandError> {
        let mut command = RawCommand::new("idle");
        for subsystem in subsystems {
            command = command.argument(subsystem);
        }

        trace!(?subsystems, "entering idle");
        let frame = self.raw_command(command)?;

        let changed = frame
            .find_all("changed")
            .map(str::to_owned)
            .collect::<Vec<_>>();

        debug!(?changed, "idle returned");
        Ok(changed)
    }
}
