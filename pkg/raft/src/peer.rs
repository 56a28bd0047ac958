use crate::types::{Index, NodeId, Term};

/// Everything this instance remembers about one other node.
///
/// Indexed by [`NodeId`] in `Raft::peers`; entries are created lazily on
/// first contact (a default-constructed entry means "never heard from, never
/// sent to").
#[derive(Debug, Clone)]
pub(crate) struct PeerState {
    /// Last term we saw this peer declare (via any message it sent us).
    pub term: Term,
    /// Term/index of the last entry we have successfully handed to the
    /// transport for this peer.
    pub sent_term: Term,
    pub sent_index: Index,
    /// Last log position the peer told us it has.
    pub last_log_term: Term,
    pub last_log_index: Index,
    /// Wall-clock time of the last message we received from this peer.
    pub ack_received: f64,
    /// The vote this peer declared for the term recorded in `term`.
    pub vote: NodeId,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            term: -1,
            sent_term: 0,
            sent_index: 0,
            last_log_term: -1,
            last_log_index: -1,
            ack_received: -1.0e10,
            vote: NodeId::new(),
        }
    }
}
