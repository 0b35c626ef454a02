#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    unused_import_braces,
    unused_qualifications
)]
#![forbid(unsafe_code)]

//! A small, synchronous, typed client for [MPD](https://musicpd.org), built on top of
//! `mpd_protocol`.
//!
//! The [`Client`] type is the primary API: it owns one blocking connection and exposes typed
//! wrappers for the commands this workspace's daemon needs (`status`, `stats`, queue
//! manipulation, pub/sub messaging, stickers, and library lookups), alongside [`Client::idle`]
//! for waiting on state changes and [`Client::raw_command`] as an escape hatch for anything else.

mod client;
mod errors;
mod ids;

pub mod responses;
pub mod tag;

pub use self::{
    client::Client,
    errors::CommandError,
    ids::{SingleMode, SongId, SongPosition},
    tag::Tag,
};

/// Protocol-level types, re-exported for code that needs to drop down to the wire level.
pub mod raw {
    pub use mpd_protocol::{
        response::{Error as ErrorResponse, Frame},
        Connection, MpdProtocolError, RawCommand,
    };
}
