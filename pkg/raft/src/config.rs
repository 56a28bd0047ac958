use std::collections::BTreeSet;

use common::errors::{format_err, Result};

use crate::types::{Index, NodeId, Term};

/// The set of nodes participating in a raft group at some point in time,
/// plus the position of the log entry that installed it.
///
/// `nodes` are full voting members: they count towards election and commit
/// quorums. `replicas` receive the replication stream (for fast catch-up if
/// they are later promoted) but never vote and never count towards a
/// majority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub nodes: BTreeSet<NodeId>,
    pub replicas: BTreeSet<NodeId>,

    /// Term/index of the log entry that installed this configuration. Zero
    /// for the bootstrap configuration of a brand new instance.
    pub term: Term,
    pub index: Index,
}

impl Configuration {
    /// Builds a configuration from host-supplied member lists, rejecting the
    /// empty-string sentinel as an actual member (a real `nodes`/`replicas`
    /// entry can never mean "no node" - that would make every quorum
    /// computation silently wrong). This is the one boundary in the crate
    /// where bad host input is reported as a `Result` rather than asserted
    /// on, since it is plausible for a host's config-loading code to produce
    /// it by mistake and may want to recover instead of aborting the raft
    /// instance.
    pub fn new<I, J>(nodes: I, replicas: J) -> Result<Self>
    where
        I: IntoIterator<Item = NodeId>,
        J: IntoIterator<Item = NodeId>,
    {
        let nodes = nodes.into_iter().collect::<BTreeSet<_>>();
        let replicas = replicas.into_iter().collect::<BTreeSet<_>>();
        if nodes.iter().chain(replicas.iter()).any(|n| n.is_empty()) {
            return Err(format_err!(
                "raft configuration member can not be the empty NodeId"
            ));
        }

        Ok(Self {
            nodes,
            replicas,
            term: 0,
            index: 0,
        })
    }

    pub(crate) fn contains_node(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }
}
