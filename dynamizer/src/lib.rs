#![warn(rust_2018_idioms, unused_import_braces, unused_qualifications)]

//! Keeps an MPD play queue continuously populated according to a user-authored rule file: the
//! rule engine, the dynamizer loop, the MPD connection layer, and the in-band control protocol.
//!
//! The configuration loader, CLI front end, and logging setup in [`config`] and the binary's
//! `main` are ambient plumbing around this core.

pub mod codec;
pub mod config;
pub mod connection;
pub mod control;
pub mod dynamizer;
pub mod errors;
pub mod history;
pub mod pool;
pub mod rules;
pub mod similar;
pub mod status;

pub use crate::dynamizer::Dynamizer;
