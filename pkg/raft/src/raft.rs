use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::config::Configuration;
use crate::entry::LogEntry;
use crate::host::RaftHost;
use crate::message::{Message, MessageBody};
use crate::peer::PeerState;
use crate::rng::Rng;
use crate::types::{Index, NodeId, Term};

/// One Raft consensus instance, bound to a node identity and a host.
///
/// This type owns all in-memory state for the instance and drives it purely
/// through the public methods below - there are no internal threads, tasks,
/// or timers. The embedding host is responsible for calling `tick` roughly
/// every `election_timeout / 10` and for serializing all calls (this type is
/// `Send` when `H` is, but is not safe to call concurrently from multiple
/// threads without external locking).
pub struct Raft<H: RaftHost> {
    node: NodeId,
    host: H,

    election_timeout: f64,

    term: Term,
    /// Term of the most recent log entry this node has accepted (`index_`'s
    /// term, not necessarily `term`: a freshly elected leader may not have
    /// written any indexed entry under its new term yet).
    last_log_term: Term,
    /// Index of the most recent log entry this node has accepted.
    last_index: Index,

    data_committed: Index,
    config_committed: Index,
    last_committed_term: Term,
    last_committed_index: Index,

    /// Doubles as "last time we heard from the leader" (follower) and
    /// "last time we confirmed our own leadership via a quorum of acks"
    /// (leader) - both are exactly what `tick`'s election check needs.
    last_heartbeat_received: f64,
    last_heartbeat_sent: f64,
    election_jitter: f64,

    leader: NodeId,
    vote: NodeId,

    config: Configuration,
    pending_config: Option<Configuration>,

    peers: HashMap<NodeId, PeerState>,
    waiting_commits: VecDeque<LogEntry>,

    /// True until we have either seen another node's message at our current
    /// term or started our own candidacy - gates the retry-without-term-bump
    /// path in `vote_for_me`.
    seen_term: bool,

    rng: Rng,

    // Cached derived sets, recomputed by `config_changed` whenever `config`
    // or `pending_config` changes.
    other_nodes: BTreeSet<NodeId>,
    other_config_nodes: BTreeSet<NodeId>,
    replicas: BTreeSet<NodeId>,
}

impl<H: RaftHost> Raft<H> {
    pub fn new(node: NodeId, host: H) -> Self {
        Self {
            node,
            host,
            election_timeout: 1.0,
            term: 0,
            last_log_term: -1,
            last_index: 0,
            data_committed: -1,
            config_committed: -1,
            last_committed_term: -1,
            last_committed_index: -1,
            last_heartbeat_received: -1.0e10,
            last_heartbeat_sent: -1.0e10,
            election_jitter: 0.0,
            leader: NodeId::new(),
            vote: NodeId::new(),
            config: Configuration::default(),
            pending_config: None,
            peers: HashMap::new(),
            waiting_commits: VecDeque::new(),
            seen_term: true,
            rng: Rng::new(0),
            other_nodes: BTreeSet::new(),
            other_config_nodes: BTreeSet::new(),
            replicas: BTreeSet::new(),
        }
    }

    // ---- Public accessors (observability for hosts/tests) -------------

    pub fn node_id(&self) -> &NodeId {
        &self.node
    }

    pub fn term(&self) -> Term {
        self.term
    }

    pub fn leader(&self) -> &NodeId {
        &self.leader
    }

    pub fn is_leader(&self) -> bool {
        self.i_am_leader()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn data_committed(&self) -> Index {
        self.data_committed
    }

    pub fn config_committed(&self) -> Index {
        self.config_committed
    }

    pub fn last_index(&self) -> Index {
        self.last_index
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // ---- External interface (§6) ---------------------------------------

    pub fn set_election_timeout(&mut self, seconds: f64) {
        self.election_timeout = seconds;
    }

    pub fn recover(&mut self, entry: &LogEntry) {
        if entry.index.is_none() {
            if let Some(term) = entry.term {
                self.apply_recovered_metadata(entry, term);
            } else if let Some(cfg) = &entry.config {
                self.config = cfg.clone();
                self.config_changed();
            }
            return;
        }

        if let Some(term) = entry.term {
            self.apply_recovered_metadata(entry, term);
        }
        self.process_log_entry(entry.clone(), true);
        self.commit(true);
    }

    pub fn start(&mut self, now: f64, seed: i64) {
        self.last_heartbeat_received = now;
        self.rng = Rng::new(seed);
        self.election_jitter = self.election_timeout * self.rng.next_f64();
        if self.config_changed() {
            let leader = self.leader.clone();
            self.new_term(self.term + 1, leader, true);
        } else {
            self.vote = self.node.clone();
        }
        let config = self.config.clone();
        self.host.config_change(&config);
        let leader = self.leader.clone();
        self.host.leader_change(&leader);
    }

    pub fn tick(&mut self, now: f64) {
        if self.i_am_in_nodes()
            && !self.other_nodes.is_empty()
            && now - self.last_heartbeat_received > self.election_timeout + self.election_jitter
        {
            self.election_jitter = self.election_timeout * self.rng.next_f64();
            self.last_heartbeat_received = now;
            self.vote_for_me();
            return;
        }
        if self.i_am_leader() && now - self.last_heartbeat_sent > self.election_timeout / 4.0 {
            self.last_heartbeat_sent = now;
            self.replicate_all(true);
        }
    }

    pub fn propose(&mut self, entry: LogEntry) {
        assert!(self.i_am_leader(), "propose() called while not leader");
        let mut e = entry;
        e.term = Some(self.term);
        e.index = Some(self.last_index + 1);
        e.previous_log_term = Some(self.last_log_term);
        e.previous_log_index = Some(self.last_index);
        self.process_log_entry(e, false);
        self.replicate_all(false);
        self.commit(false);
    }

    pub fn run(&mut self, now: f64, message: &Message) {
        if message.term >= self.term {
            self.seen_term = true;
        }
        if message.term < self.term {
            return;
        }
        if message.term > self.term {
            self.new_term(message.term, message.leader.clone(), false);
        }
        if !message.leader.is_empty()
            && self.leader != message.leader
            && self.other_nodes.contains(&message.from)
        {
            self.leader = message.leader.clone();
            self.host.leader_change(&self.leader);
        }

        {
            let peer = self.peers.entry(message.from.clone()).or_default();
            if peer.term != message.term {
                peer.term = message.term;
                peer.vote = NodeId::new();
            }
            peer.last_log_term = message.last_log_term;
            peer.last_log_index = message.last_log_index;
        }

        if message.from != self.leader || message.body.vote().is_some() {
            self.handle_ack(now, message);
            if message.body.vote().is_some() {
                self.handle_vote(message);
            }
            return;
        }

        self.last_heartbeat_received = now;
        if message.config_committed > self.config_committed || message.data_committed > self.data_committed {
            self.config_committed = message.config_committed;
            self.data_committed = message.data_committed;
            self.write_internal_log_entry();
        }
        let accepted = match &message.body {
            MessageBody::Append { entry } => self.process_log_entry(entry.clone(), false),
            _ => message.last_log_index == self.last_index && message.last_log_term == self.last_log_term,
        };
        self.ack(accepted);
        self.commit(false);
    }

    pub fn snapshot(&self, include_uncommitted: bool) -> Vec<LogEntry> {
        let mut entries = Vec::new();

        let mut config_e = LogEntry::new();
        config_e.term = Some(self.config.term);
        config_e.index = Some(self.config.index);
        config_e.vote = Some(self.vote.clone());
        config_e.data_committed = Some(self.data_committed);
        config_e.config_committed = Some(self.config_committed);
        config_e.config = Some(self.config.clone());
        entries.push(config_e);

        if let Some(pending) = &self.pending_config {
            let already_staged = self
                .waiting_commits
                .front()
                .map(|e| e.index.unwrap() <= pending.index)
                .unwrap_or(false);
            if !already_staged {
                let mut pending_e = LogEntry::new();
                pending_e.term = Some(pending.term);
                pending_e.index = Some(pending.index);
                pending_e.config = Some(pending.clone());
                entries.push(pending_e);
            }
        }

        if include_uncommitted {
            entries.extend(self.waiting_commits.iter().cloned());
        }

        entries
    }

    pub fn stop(&mut self) {
        self.abdicate();
    }

    // ---- Recovery --------------------------------------------------------

    fn apply_recovered_metadata(&mut self, entry: &LogEntry, term: Term) {
        if term > self.term {
            self.term = term;
            self.leader = entry.leader.clone().unwrap_or_default();
            self.vote = entry.vote.clone().unwrap_or_default();
            self.waiting_commits.clear();
        }
        if let Some(cc) = entry.config_committed {
            self.config_committed = cc;
        }
        if let Some(dc) = entry.data_committed {
            self.data_committed = dc;
        }
    }

    // ---- Election / term machine (§4.1) -----------------------------------

    fn new_term(&mut self, term: Term, leader: NodeId, in_recovery: bool) {
        self.vote = NodeId::new();
        self.term = term;
        self.leader = leader;
        self.waiting_commits.clear();
        if !in_recovery {
            self.write_internal_log_entry();
            let leader = self.leader.clone();
            self.host.leader_change(&leader);
        }
    }

    fn vote_for_me(&mut self) {
        if self.seen_term || !self.leader.is_empty() || self.vote != self.node {
            self.vote = self.node.clone();
            self.term += 1;
            self.leader = NodeId::new();
            self.waiting_commits.clear();
            self.write_internal_log_entry();
            let leader = self.leader.clone();
            self.host.leader_change(&leader);
            self.seen_term = false;
        }
        self.send_vote();
    }

    /// Broadcasts our current vote (solicitation) if it names ourselves, or
    /// sends it directly to the node we are granting/nominating otherwise.
    fn send_vote(&mut self) {
        if self.vote == self.node {
            let m = self.initialize_message(MessageBody::VoteRequest {
                vote: self.vote.clone(),
            });
            self.send_to_replicas(m);
        } else {
            let dest = self.vote.clone();
            let m = self.initialize_message(MessageBody::VoteGrant {
                vote: self.vote.clone(),
            });
            self.host.send_message(&dest, &m);
        }
    }

    fn handle_vote(&mut self, message: &Message) {
        let declared = message.body.vote().cloned().unwrap();
        {
            let peer = self.peers.entry(message.from.clone()).or_default();
            peer.vote = declared.clone();
        }

        if self.vote.is_empty() {
            if declared == self.node {
                // Someone is handing leadership to us (abdication target).
                self.vote_for_me();
            } else if (message.last_log_term, message.last_log_index) >= (self.last_log_term, self.last_index) {
                self.vote = declared;
                self.write_internal_log_entry();
                self.send_vote();
            }
            return;
        }

        if self.vote == self.node && declared == self.node {
            let mut votes = 0;
            for other in self.other_config_nodes.clone() {
                let s = self.peers.entry(other).or_default();
                if s.term == self.term && s.vote == self.node {
                    votes += 1;
                }
            }
            if votes + 1 > (self.other_config_nodes.len() + 1) / 2 {
                self.leader = self.node.clone();
                self.write_internal_log_entry();
                let leader = self.leader.clone();
                self.host.leader_change(&leader);
                self.heartbeat();
            }
        }
    }

    // ---- Acks --------------------------------------------------------------

    fn ack(&mut self, accepted: bool) {
        if !accepted {
            self.last_index = self.last_committed_index;
            self.last_log_term = self.last_committed_term;
        }
        let body = if accepted { MessageBody::Heartbeat } else { MessageBody::Nack };
        let m = self.initialize_message(body);
        let leader = self.leader.clone();
        self.host.send_message(&leader, &m);
    }

    fn handle_ack(&mut self, now: f64, message: &Message) {
        {
            let peer = self.peers.entry(message.from.clone()).or_default();
            peer.ack_received = now;
        }
        if matches!(message.body, MessageBody::Nack) {
            let peer = self.peers.entry(message.from.clone()).or_default();
            peer.sent_index = peer.last_log_index;
            peer.sent_term = peer.last_log_term;
        } else if self.i_am_leader() {
            let mut acks_needed = ((self.other_nodes.len() + 1) / 2) as i64;
            for other in self.other_nodes.clone() {
                let p = self.peers.entry(other).or_default();
                if p.ack_received >= self.last_heartbeat_sent {
                    acks_needed -= 1;
                }
            }
            if acks_needed <= 0 {
                self.last_heartbeat_received = now;
            }
            self.update_committed();
        }
    }

    // ---- Replication (§4.3) -------------------------------------------------

    fn heartbeat(&mut self) {
        let m = self.initialize_message(MessageBody::Heartbeat);
        self.send_to_replicas(m);
    }

    fn send_to_replicas(&mut self, m: Message) {
        for n in self.replicas.clone() {
            self.host.send_message(&n, &m);
        }
    }

    fn replicate(&mut self, node: &NodeId, want_heartbeat: bool) {
        let mut sent = false;

        let peer_term = self.peers.entry(node.clone()).or_default().term;
        if peer_term == self.term {
            let end = match self.waiting_commits.front() {
                Some(front) => front.index.unwrap() - 1,
                None => self.last_index,
            };

            let (mut s_term, mut s_index) = {
                let p = self.peers.entry(node.clone()).or_default();
                (p.sent_term, p.sent_index)
            };

            while s_index < end {
                let got = self.host.get_log_entry(s_term, s_index + 1, end);
                let mut entry = match got {
                    Some(e) => e,
                    None => break,
                };
                if entry.term.is_none() {
                    entry.term = Some(self.last_log_term);
                    entry.index = Some(s_index + 1);
                }
                entry.previous_log_term = Some(s_term);
                entry.previous_log_index = Some(s_index);

                let entry_term = entry.term.unwrap();
                let entry_index = entry.index.unwrap();
                debug_assert!(entry_index > s_index);
                let extent = entry.extent_len();

                let m = self.initialize_message(MessageBody::Append { entry });
                if !self.host.send_message(node, &m) {
                    break;
                }
                s_index = entry_index + extent;
                s_term = entry_term;
                sent = true;
            }

            let tail: Vec<LogEntry> = self
                .waiting_commits
                .iter()
                .filter(|e| e.index.unwrap() > s_index)
                .cloned()
                .collect();
            for e in tail {
                let idx = e.index.unwrap();
                let extent = e.extent_len();
                let term = e.term.unwrap();
                let m = self.initialize_message(MessageBody::Append { entry: e });
                if !self.host.send_message(node, &m) {
                    break;
                }
                s_index = idx + extent;
                s_term = term;
                sent = true;
            }

            let p = self.peers.entry(node.clone()).or_default();
            p.sent_term = s_term;
            p.sent_index = s_index;
        }

        if want_heartbeat && !sent {
            let m = self.initialize_message(MessageBody::Heartbeat);
            self.host.send_message(node, &m);
        }
    }

    fn replicate_all(&mut self, want_heartbeat: bool) {
        for n in self.replicas.clone() {
            self.replicate(&n, want_heartbeat);
        }
    }

    // ---- Commit & configuration activation (§4.4) ---------------------------

    fn majority_index(&mut self, other: &BTreeSet<NodeId>) -> Index {
        let mut indices = Vec::with_capacity(other.len() + 1);
        indices.push(self.last_index);
        for o in other {
            let p = self.peers.entry(o.clone()).or_default();
            indices.push(p.last_log_index);
        }
        indices.sort_unstable();
        indices[indices.len() / 2]
    }

    fn update_committed(&mut self) {
        let other_nodes = self.other_nodes.clone();
        let i = self.majority_index(&other_nodes);
        if i > self.data_committed {
            self.data_committed = i;
            self.write_internal_log_entry();
            self.commit(false);
            self.heartbeat();
        }

        if self.pending_config.is_some() {
            let other_config_nodes = self.other_config_nodes.clone();
            let ci = self.majority_index(&other_config_nodes);
            if i == ci && ci > self.config_committed {
                self.config_committed = ci;
                self.write_internal_log_entry();
                self.commit(false);
                self.heartbeat();
            }
        }
    }

    fn commit(&mut self, in_recovery: bool) {
        let mut pending: Vec<LogEntry> = Vec::new();
        while let Some(front) = self.waiting_commits.front() {
            if front.index.unwrap() > self.data_committed {
                break;
            }
            let e = self.waiting_commits.pop_front().unwrap();
            while let Some(last) = pending.last() {
                if e.index.unwrap() <= last.index.unwrap() {
                    pending.pop();
                } else {
                    break;
                }
            }
            pending.push(e);
        }
        for e in &pending {
            self.host.commit_log_entry(e);
            self.last_committed_term = e.term.unwrap();
            self.last_committed_index = e.index.unwrap();
        }
        self.activate_config(in_recovery);
    }

    fn activate_config(&mut self, in_recovery: bool) {
        let activates = match &self.pending_config {
            Some(pending) => pending.term == self.term && pending.index <= self.config_committed,
            None => false,
        };
        if !activates {
            return;
        }

        self.config = self.pending_config.take().unwrap();
        self.host.config_change(&self.config.clone());

        if self.config_changed() {
            let leader = self.leader.clone();
            self.new_term(self.term + 1, leader, in_recovery);
            if !in_recovery {
                self.heartbeat();
            }
        }

        if !in_recovery && !self.i_am_in_nodes() {
            // We were dropped from the voting set by the change that just
            // committed: hand off to a successor rather than lingering as a
            // leader nobody else will keep acking.
            self.abdicate();
        }
    }

    /// Recomputes `other_nodes`/`other_config_nodes`/`replicas` from
    /// `config`/`pending_config`, and re-derives `leader` for the cases where
    /// membership alone determines it (single-node cluster, promotion of the
    /// sole remaining peer, self dropped from `nodes`). Returns whether
    /// `leader` changed.
    fn config_changed(&mut self) -> bool {
        self.other_nodes.clear();
        self.other_config_nodes.clear();
        self.replicas.clear();

        for n in &self.config.nodes {
            if n != &self.node {
                self.other_nodes.insert(n.clone());
                self.other_config_nodes.insert(n.clone());
            }
        }
        if let Some(pending) = &self.pending_config {
            for n in &pending.nodes {
                if n != &self.node {
                    self.other_config_nodes.insert(n.clone());
                }
            }
        }
        self.replicas.extend(self.config.replicas.iter().cloned());
        if let Some(pending) = &self.pending_config {
            self.replicas.extend(pending.replicas.iter().cloned());
        }
        self.replicas.extend(self.other_nodes.iter().cloned());
        self.replicas.extend(self.other_config_nodes.iter().cloned());

        let old_leader = self.leader.clone();
        if self.other_nodes.is_empty() {
            self.leader = self.node.clone();
        } else if !self.i_am_in_nodes() && self.other_nodes.len() == 1 {
            self.leader = self.other_nodes.iter().next().unwrap().clone();
        } else if self.leader == self.node && !self.i_am_in_nodes() {
            self.leader = NodeId::new();
        }
        self.leader != old_leader
    }

    // ---- Log handling (§4.2) ------------------------------------------------

    fn process_log_entry(&mut self, mut entry: LogEntry, in_recovery: bool) -> bool {
        if let Some(cfg) = entry.config.clone() {
            let mut pending = cfg;
            pending.term = entry.term.unwrap_or(self.term);
            pending.index = entry.index.unwrap_or(0);
            self.pending_config = Some(pending);
            self.config_changed();
        }

        let index = match entry.index {
            Some(i) => i,
            None => return true,
        };

        if let Some(term) = entry.term {
            if (term, index) <= (self.last_log_term, self.last_index) {
                return true;
            }
        } else if index <= self.last_index {
            return true;
        }

        if entry.term.is_none() {
            entry.term = Some(self.term);
            self.last_index = index - 1;
            entry.previous_log_term = Some(self.last_log_term);
            entry.previous_log_index = Some(self.last_index);
        }
        let term = entry.term.unwrap();

        if entry.previous_log_term != Some(self.last_log_term) || entry.previous_log_index != Some(self.last_index) {
            return false;
        }
        if self.last_log_term == term && index != self.last_index + 1 {
            return false;
        }

        self.last_log_term = term;
        self.last_index = index + entry.extent_len();
        if !in_recovery && self.i_am_leader() {
            if self.other_nodes.is_empty() {
                self.data_committed = self.last_index;
            }
            if self.other_config_nodes.is_empty() {
                self.config_committed = self.last_index;
            }
        }
        entry.data_committed = Some(self.data_committed);
        entry.config_committed = Some(self.config_committed);
        if !in_recovery {
            self.host.write_log_entry(&entry);
        }
        self.waiting_commits.push_back(entry);
        true
    }

    // ---- Abdication (§4.7) --------------------------------------------------

    fn abdicate(&mut self) {
        if !self.i_am_leader() {
            return;
        }
        let mut best: Option<NodeId> = None;
        let mut best_pos: (Term, Index) = (Term::MIN, Index::MIN);
        for n in self.other_nodes.clone() {
            let s = self.peers.entry(n.clone()).or_default();
            let pos = (s.last_log_term, s.last_log_index);
            if best.is_none() || pos > best_pos {
                best = Some(n);
                best_pos = pos;
            }
        }
        if let Some(node) = best {
            self.term += 1;
            self.leader = NodeId::new();
            self.vote = node.clone();
            self.write_internal_log_entry();
            let m = self.initialize_message(MessageBody::VoteGrant {
                vote: self.vote.clone(),
            });
            self.host.send_message(&node, &m);
        }
    }

    // ---- Shared helpers ------------------------------------------------------

    fn write_internal_log_entry(&mut self) {
        let mut e = LogEntry::new();
        e.term = Some(self.term);
        e.leader = Some(self.leader.clone());
        e.vote = Some(self.vote.clone());
        e.data_committed = Some(self.data_committed);
        e.config_committed = Some(self.config_committed);
        self.host.write_log_entry(&e);
    }

    fn initialize_message(&self, body: MessageBody) -> Message {
        Message {
            term: self.term,
            last_log_term: self.last_log_term,
            last_log_index: self.last_index,
            from: self.node.clone(),
            leader: self.leader.clone(),
            data_committed: self.data_committed,
            config_committed: self.config_committed,
            body,
        }
    }

    fn i_am_leader(&self) -> bool {
        self.node == self.leader
    }

    fn i_am_in_nodes(&self) -> bool {
        self.config.contains_node(&self.node)
    }
}
