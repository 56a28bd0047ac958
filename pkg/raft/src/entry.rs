use crate::config::Configuration;
use crate::types::{Index, NodeId, Term};

/// A single envelope in the replicated log.
///
/// Every field is optional and the meaning of an entry is entirely
/// determined by which ones are populated (see the module-level discussion
/// in `raft.rs`):
///
/// - An entry with no `index` is a purely internal metadata record (a term
///   bump, a vote, a leader change) that never occupies a log position.
/// - An entry with `index` but no `term` is a *summary* entry supplied by
///   the host, standing in for a contiguous range of history the host has
///   since compacted away.
/// - An entry with both is a normal, leader-assigned log position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    pub term: Option<Term>,
    pub index: Option<Index>,

    pub previous_log_term: Option<Term>,
    pub previous_log_index: Option<Index>,

    /// Number of additional contiguous log positions this entry covers
    /// beyond `index` (0 for a single position).
    pub extent: Option<i64>,

    /// Opaque application payload. The core never inspects this.
    pub payload: Option<Vec<u8>>,

    /// A configuration this entry installs (as `pending_config`) once
    /// committed.
    pub config: Option<Configuration>,

    pub leader: Option<NodeId>,
    pub vote: Option<NodeId>,

    pub data_committed: Option<Index>,
    pub config_committed: Option<Index>,
}

impl LogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn with_config(config: Configuration) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Number of log positions this entry occupies (1 unless `extent` is
    /// set, as is the case for batched replication entries).
    pub(crate) fn extent_len(&self) -> i64 {
        self.extent.unwrap_or(0)
    }
}
