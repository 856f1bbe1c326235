use crate::clock::SimTime;
use crate::network::{LinkId, NodeId};
use std::net::{Ipv4Addr, SocketAddrV4};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Everything the core can reject. Raised at the offending call, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("cannot schedule at {requested}, clock is already at {now}")]
    InvalidTime { requested: SimTime, now: SimTime },

    #[error("event {0} already fired")]
    CancelTooLate(u64),

    #[error("event {0} was never scheduled on this clock")]
    UnknownEvent(u64),

    #[error("subnet {subnet} holds {capacity} hosts, {requested} requested")]
    AddressExhaustion {
        subnet: String,
        capacity: u32,
        requested: usize,
    },

    #[error("subnet {subnet} overlaps {existing} already assigned to link {link}")]
    SubnetConflict {
        subnet: String,
        existing: String,
        link: LinkId,
    },

    #[error("invalid subnet {base}/{mask}")]
    InvalidSubnet { base: Ipv4Addr, mask: Ipv4Addr },

    #[error("link {0} already has addresses")]
    AlreadyAddressed(LinkId),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    #[error("link needs a nonzero bandwidth and at least two distinct members")]
    InvalidLink,

    #[error("generator window ends ({stop}) before it starts ({start})")]
    InvalidWindow { start: SimTime, stop: SimTime },

    #[error("invalid traffic pattern: {0}")]
    InvalidPattern(String),

    #[error("no link from node {from} to {destination}")]
    NoRoute { from: NodeId, destination: Ipv4Addr },

    #[error("unknown generator {0}")]
    UnknownGenerator(u32),

    #[error("nothing listens on {0}")]
    UnknownSink(SocketAddrV4),
}
