use std::fmt;

/// Simulation round counter (one per timer tick)
pub type Round = u64;

/// Opaque node identity (32 bytes of x25519 public key in the default generator)
///
/// The engine only relies on equality and hashing; nothing reads the bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix for human readable output
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Unordered endpoint pair used to key links.
///
/// `LinkKey::new(a, b) == LinkKey::new(b, a)`, so a link and its reverse
/// always land on the same pool entry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct LinkKey {
    low: NodeId,
    high: NodeId,
}

impl LinkKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        &self.low == id || &self.high == id
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.low, self.high)
    }
}

/// Undirected link between two nodes.
///
/// `one` is the node that initiated the first connection, `other` the one it
/// reached. The order is kept for reporting only; identity is the `LinkKey`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Link {
    pub one: NodeId,
    pub other: NodeId,
}

impl Link {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.one, self.other)
    }
}

// ============================================================================
// Event Feed
// ============================================================================

/// Lifecycle transitions published by the churn engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnEvent {
    /// Node switched from inactive to active
    NodeUp { id: NodeId },
    /// Node switched from active to inactive
    NodeDown { id: NodeId },
    /// Link switched from inactive (or absent) to active
    LinkUp { one: NodeId, other: NodeId },
    /// Link switched from active to inactive
    LinkDown { one: NodeId, other: NodeId },
}

impl ChurnEvent {
    pub fn node_up(id: NodeId) -> Self {
        ChurnEvent::NodeUp { id }
    }

    pub fn node_down(id: NodeId) -> Self {
        ChurnEvent::NodeDown { id }
    }

    pub fn link_up(link: &Link) -> Self {
        ChurnEvent::LinkUp {
            one: link.one,
            other: link.other,
        }
    }

    pub fn link_down(link: &Link) -> Self {
        ChurnEvent::LinkDown {
            one: link.one,
            other: link.other,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChurnEvent::NodeUp { .. } => "NodeUp",
            ChurnEvent::NodeDown { .. } => "NodeDown",
            ChurnEvent::LinkUp { .. } => "LinkUp",
            ChurnEvent::LinkDown { .. } => "LinkDown",
        }
    }

    /// True if `id` is the node or one of the link endpoints
    pub fn involves(&self, id: &NodeId) -> bool {
        match self {
            ChurnEvent::NodeUp { id: n } | ChurnEvent::NodeDown { id: n } => n == id,
            ChurnEvent::LinkUp { one, other } | ChurnEvent::LinkDown { one, other } => {
                one == id || other == id
            }
        }
    }
}

/// Publish-only sink for churn events
pub trait EventSink {
    fn log(&mut self, round: Round, event: ChurnEvent);
}

/// No-op event sink (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _round: Round, _event: ChurnEvent) {}
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        (**self).log(round, event)
    }
}

/// Fan-out: every event goes to both sinks, left first
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn log(&mut self, round: Round, event: ChurnEvent) {
        self.0.log(round, event);
        self.1.log(round, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_key_is_unordered() {
        let a = NodeId([1; 32]);
        let b = NodeId([2; 32]);

        assert_eq!(LinkKey::new(a, b), LinkKey::new(b, a));
        assert_ne!(LinkKey::new(a, b), LinkKey::new(a, a));

        let link = Link { one: b, other: a };
        assert_eq!(link.key(), LinkKey::new(a, b));
        assert_eq!(link.key().endpoints(), (a, b));
        assert!(link.key().contains(&b));
    }

    #[test]
    fn test_event_involves() {
        let a = NodeId([1; 32]);
        let b = NodeId([2; 32]);
        let c = NodeId([3; 32]);

        let up = ChurnEvent::link_up(&Link { one: a, other: b });
        assert!(up.involves(&a));
        assert!(up.involves(&b));
        assert!(!up.involves(&c));
        assert_eq!(up.kind(), "LinkUp");

        assert!(ChurnEvent::node_down(c).involves(&c));
    }

    #[test]
    fn test_short_id() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[3] = 0x01;
        assert_eq!(NodeId(bytes).short(), "ab000001");
        assert_eq!(NodeId(bytes).to_string().len(), 64);
    }
}
