#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Line-oriented implementation of the [MPD] client protocol.
//!
//! This crate only implements the wire-level concerns: greeting, command framing, argument
//! quoting, and parsing a reply into a sequence of key-value fields terminated by `OK` or
//! `ACK ...`. It intentionally does not know about any particular command's semantics; see the
//! `mpd_client` crate for a higher-level, typed API built on top of this one.
//!
//! [MPD]: https://musicpd.org

pub mod command;
pub mod response;

mod connection;
mod error;

pub use command::RawCommand;
pub use connection::Connection;
pub use error::MpdProtocolError;
pub use response::{Error as ErrorResponse, Response};
