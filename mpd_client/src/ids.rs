//! Small newtypes identifying songs in the queue.

/// The unique, queue-version-independent ID MPD assigns a song when it is added to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongId(pub u64);

impl From<u64> for SongId {
    fn from(id: u64) -> Self {
        SongId(id)
    }
}

/// The position of a song within the queue, which shifts as songs are added or removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongPosition(pub usize);

impl From<usize> for SongPosition {
    fn from(pos: usize) -> Self {
        SongPosition(pos)
    }
}

/// The `single` playback mode, as reported by `status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SingleMode {
    /// `single` is off.
    Disabled,
    /// `single` is on.
    Enabled,
    /// `single` will turn itself off after the current song, a protocol extension since 0.21.
    Oneshot,
}
