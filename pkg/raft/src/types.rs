/// Opaque node identity. The empty string is reserved to mean "no node" (an
/// unknown leader, an unset vote, ...) rather than being modeled as
/// `Option<NodeId>` everywhere - this mirrors how the term/leader/vote
/// bookkeeping below treats "nobody" as a first-class value rather than an
/// absence.
pub type NodeId = String;

/// Election epoch. Monotonically non-decreasing for the lifetime of an
/// instance.
pub type Term = i64;

/// Position in the replicated log.
pub type Index = i64;
