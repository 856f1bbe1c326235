// Receive side. A sink listens on one port of one node and only counts;
// there is no queueing or acking here.

use crate::clock::SimTime;
use crate::network::{NodeId, Packet};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkId(u32);

impl SinkId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkCounter {
    pub id: SinkId,
    pub label: String,
    pub node: NodeId,
    pub port: u16,
    pub total_bytes_received: u64,
    pub packets_received: u64,
    pub first_rx: Option<SimTime>,
    pub last_rx: Option<SimTime>,
    total_transit: SimTime,
}

impl SinkCounter {
    fn new(id: SinkId, label: String, node: NodeId, port: u16) -> Self {
        Self {
            id,
            label,
            node,
            port,
            total_bytes_received: 0,
            packets_received: 0,
            first_rx: None,
            last_rx: None,
            total_transit: SimTime::ZERO,
        }
    }

    /// Average one-way delay of everything received so far.
    pub fn mean_transit(&self) -> Option<SimTime> {
        if self.packets_received == 0 {
            return None;
        }
        Some(SimTime::from_nanos(
            self.total_transit.as_nanos() / self.packets_received,
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SinkTable {
    sinks: Vec<SinkCounter>,
}

impl SinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: impl Into<String>, node: NodeId, port: u16) -> SinkId {
        let id = SinkId(self.sinks.len() as u32);
        self.sinks.push(SinkCounter::new(id, label.into(), node, port));
        id
    }

    pub fn lookup(&self, node: NodeId, port: u16) -> Option<SinkId> {
        self.sinks
            .iter()
            .find(|s| s.node == node && s.port == port)
            .map(|s| s.id)
    }

    pub fn get(&self, id: SinkId) -> Option<&SinkCounter> {
        self.sinks.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SinkCounter> {
        self.sinks.iter()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Counts an arrival. Returns the byte total before and after, or `None`
    /// for an id this table never issued.
    pub fn receive(&mut self, id: SinkId, packet: &Packet, now: SimTime) -> Option<(u64, u64)> {
        let sink = self.sinks.get_mut(id.index())?;
        let old = sink.total_bytes_received;

        sink.total_bytes_received += u64::from(packet.size);
        sink.packets_received += 1;
        sink.first_rx.get_or_insert(now);
        sink.last_rx = Some(now);
        sink.total_transit += packet.transit_time(now);

        if sink.packets_received == 1 {
            debug!("sink {} got its first packet at {}", sink.label, now);
        }
        Some((old, sink.total_bytes_received))
    }
}
