use crate::clock::SimTime;
use crate::network::NodeId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketId(u64);

impl PacketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// A payload in flight. Only its size matters to the sinks; the contents are
/// never modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub source: NodeId,
    pub destination: SocketAddrV4,
    pub size: u32,
    // simulated time the last bit left the sender
    sent_at: SimTime,
}

impl Packet {
    pub fn new(
        id: PacketId,
        source: NodeId,
        destination: SocketAddrV4,
        size: u32,
        sent_at: SimTime,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            size,
            sent_at,
        }
    }

    pub fn sent_at(&self) -> SimTime {
        self.sent_at
    }

    /// One-way latency as seen by a receiver at `now`.
    pub fn transit_time(&self, now: SimTime) -> SimTime {
        now.saturating_sub(self.sent_at)
    }
}
