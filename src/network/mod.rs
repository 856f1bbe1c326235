pub mod address;
pub mod packet;
pub mod topology;

pub use address::Subnet;
pub use packet::{Packet, PacketId};
pub use topology::{Interface, Link, LinkConfig, LinkId, LinkKind, Node, NodeId, NodeRole, Topology};
