//! Types shared between the pitchside server and its clients:
//! the wire protocol and the tunable configuration blocks.

pub mod config;
pub mod protocol;
