//! Bidirectional relay engine.
//!
//! Two chat surfaces are bridged through four queues: each surface has an
//! inbound queue (fed by its [`ingest::IngestLoop`], drained by its
//! [`router::CommandRouter`]) and an outbound queue (drained by its
//! [`send::SendLoop`]). A [`supervisor::Supervisor`] per surface owns the
//! session lifecycle, and [`coordinator::SyncCoordinator`] wires it all up.

pub mod control;
pub mod coordinator;
pub(crate) mod drain;
pub mod dump;
pub mod error;
pub mod ingest;
pub mod pause;
pub mod queue;
pub mod router;
pub mod send;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    control::{ControlCommand, ControlReply, DumpDirs},
    coordinator::{Endpoint, SyncCoordinator, SyncSettings},
    error::{Error, Result},
    queue::RelayQueue,
    supervisor::{ConnectionState, SessionStatus},
};
