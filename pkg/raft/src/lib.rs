//! A host-agnostic Raft consensus core.
//!
//! This crate implements only the consensus state machine: leader election,
//! log replication, joint-quorum configuration changes, and recovery from a
//! replayed log. It has no opinion about storage, transport, or scheduling -
//! all of that is supplied by an embedding [`RaftHost`] implementation, and
//! driven by calling [`Raft::tick`] / [`Raft::run`] / [`Raft::propose`] from
//! whatever event loop the host already has.

mod config;
mod entry;
mod host;
mod message;
mod peer;
mod raft;
mod rng;
mod types;

pub use config::Configuration;
pub use entry::LogEntry;
pub use host::RaftHost;
pub use message::{Message, MessageBody};
pub use raft::Raft;
pub use types::{Index, NodeId, Term};
