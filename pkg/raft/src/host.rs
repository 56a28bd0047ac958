use crate::config::Configuration;
use crate::entry::LogEntry;
use crate::message::Message;
use crate::types::{Index, NodeId, Term};

/// The callback surface an embedding host must implement to drive one
/// [`crate::Raft`] instance.
///
/// Every method here is assumed synchronous and non-suspending from the
/// core's point of view - in particular `write_log_entry` must not return
/// until the entry is durable. A host that needs to offload blocking work
/// (disk flushes, network sends) does so outside of whatever call led into
/// the core, not inside these methods.
pub trait RaftHost {
    /// Best-effort delivery of `message` to `dest`. The return value
    /// indicates whether the transport accepted it for delivery, not
    /// whether it arrived - `false` simply pauses replication to that peer
    /// until the next tick or heartbeat retries it.
    fn send_message(&mut self, dest: &NodeId, message: &Message) -> bool;

    /// Supply an entry covering `(term, start_index..end_index]` for
    /// replication catch-up. May return a summary entry (one with no
    /// `term` set) standing in for a compacted range. `None` means nothing
    /// is available for that range right now.
    fn get_log_entry(&mut self, term: Term, start_index: Index, end_index: Index) -> Option<LogEntry>;

    /// Persist `entry` durably. Must not return before the write is
    /// durable: the core relies on `write_log_entry` calls being totally
    /// ordered and replayable via `Raft::recover` in the same order.
    fn write_log_entry(&mut self, entry: &LogEntry);

    /// Deliver a committed entry for application to the host's state
    /// machine. Called in strictly increasing `index` order, exactly once
    /// per committed index.
    fn commit_log_entry(&mut self, entry: &LogEntry);

    /// The instance's view of the current leader has changed. An empty
    /// `leader` means "no leader known".
    fn leader_change(&mut self, leader: &NodeId);

    /// The active configuration has changed (a previously pending
    /// configuration change has now committed on both quorums).
    fn config_change(&mut self, config: &Configuration);
}
