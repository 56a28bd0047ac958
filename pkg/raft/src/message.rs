use crate::entry::LogEntry;
use crate::types::{Index, NodeId, Term};

/// The payload-specific part of a [`Message`].
///
/// The original implementation distinguishes message kinds by which
/// optional fields happen to be populated on one flat record. We instead use
/// an exhaustive tagged union: dispatch in `Raft::run` becomes a `match`
/// instead of a chain of `.has_foo()` checks. `VoteRequest` and `VoteGrant`
/// carry identical data and are handled identically on receipt - the split
/// exists so call sites (soliciting votes vs. granting/nominating one) read
/// as what they mean, not so the receiver needs to tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// A content-less liveness/commit-advance ping. Also doubles as a
    /// positive acknowledgement when sent follower -> leader.
    Heartbeat,
    /// A negative acknowledgement: the envelope's `last_log_term` /
    /// `last_log_index` report the sender's committed position instead of
    /// its log tail, so the leader knows where to retransmit from.
    Nack,
    /// A candidate (or an abdicating leader nominating a successor)
    /// declaring who it considers its vote cast for this term.
    VoteRequest { vote: NodeId },
    /// A node's declaration of whom it votes for this term, sent either to
    /// the candidate directly (grant) or broadcast as a retry.
    VoteGrant { vote: NodeId },
    /// A log entry being replicated.
    Append { entry: LogEntry },
}

impl MessageBody {
    /// The vote named by this message, if it carries one, regardless of
    /// whether it is a request or a grant - `Raft::handle_vote` treats both
    /// the same way.
    pub(crate) fn vote(&self) -> Option<&NodeId> {
        match self {
            MessageBody::VoteRequest { vote } | MessageBody::VoteGrant { vote } => Some(vote),
            _ => None,
        }
    }
}

/// A single wire message exchanged between raft instances.
///
/// The envelope fields are present on every message regardless of payload,
/// matching §4.5 of the protocol: a recipient always learns the sender's
/// term and log position even on a bare heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub term: Term,
    pub last_log_term: Term,
    pub last_log_index: Index,
    pub from: NodeId,
    /// Who the sender believes is the current leader. Empty means unknown.
    pub leader: NodeId,
    pub data_committed: Index,
    pub config_committed: Index,
    pub body: MessageBody,
}
