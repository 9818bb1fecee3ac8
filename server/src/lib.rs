//! Pitchside server library.
//!
//! Authoritative betting room for an AI match: the room loop owns the match
//! simulation and every participant ledger; WebSocket handlers translate
//! between the wire protocol and room commands. Exposed as a library so
//! integration tests and the `soak` client can embed a server.

pub mod codec;
pub mod config;
pub mod error;
pub mod ledger;
pub mod room;
pub mod room_loop;
pub mod simulator;
pub mod squad;
pub mod ws;
