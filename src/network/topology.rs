use super::address::Subnet;
use crate::clock::SimTime;
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u32);

impl LinkId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    Router,
    Server,
    Station,
    AccessPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    PointToPoint,
    /// Shared medium: a wired LAN segment or a wireless cell.
    Segment,
}

/// Everything the timing model needs to know about a link. Radio and MAC
/// details stay outside the core; a wireless cell is just bandwidth + delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub bandwidth_bps: u64,
    pub delay: SimTime,
}

impl LinkConfig {
    pub fn new(bandwidth_bps: u64, delay: SimTime) -> Self {
        Self {
            bandwidth_bps,
            delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub node: NodeId,
    pub address: Ipv4Addr,
    pub link: LinkId,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub role: NodeRole,
    interfaces: Vec<Interface>,
}

impl Node {
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    pub config: LinkConfig,
    members: Vec<NodeId>,
    subnet: Option<Subnet>,
}

impl Link {
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn subnet(&self) -> Option<Subnet> {
        self.subnet
    }

    pub fn connects(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }
}

/// Nodes, links and their address plan. Pure data: built once before the
/// run, read by the generators while it executes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, role: NodeRole) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            role,
            interfaces: Vec::new(),
        });
        id
    }

    pub fn add_link(&mut self, a: NodeId, b: NodeId, config: LinkConfig) -> Result<LinkId> {
        self.insert_link(LinkKind::PointToPoint, vec![a, b], config)
    }

    /// A shared link joining every node in `members`. Address assignment
    /// follows the order given here.
    pub fn add_segment(&mut self, members: &[NodeId], config: LinkConfig) -> Result<LinkId> {
        self.insert_link(LinkKind::Segment, members.to_vec(), config)
    }

    fn insert_link(&mut self, kind: LinkKind, members: Vec<NodeId>, config: LinkConfig) -> Result<LinkId> {
        for &node in &members {
            self.node(node)?;
        }
        let distinct = members
            .iter()
            .enumerate()
            .all(|(i, n)| !members[..i].contains(n));
        if config.bandwidth_bps == 0 || members.len() < 2 || !distinct {
            return Err(SimError::InvalidLink);
        }

        let id = LinkId(self.links.len() as u32);
        debug!("link {} ({:?}) joins {:?}", id, kind, members);
        self.links.push(Link {
            id,
            kind,
            config,
            members,
            subnet: None,
        });
        Ok(id)
    }

    /// Hands out `base + 1`, `base + 2`, .. to the link's members in order.
    ///
    /// Fails without touching anything if the subnet is too small, overlaps a
    /// subnet given to another link, or the link already has addresses.
    pub fn assign_addresses(
        &mut self,
        link: LinkId,
        base: Ipv4Addr,
        mask: Ipv4Addr,
    ) -> Result<Vec<Interface>> {
        let subnet = Subnet::from_base_mask(base, mask)?;
        let target = self.link(link)?;

        if target.subnet.is_some() {
            return Err(SimError::AlreadyAddressed(link));
        }

        let wanted = target.members.len();
        if wanted > subnet.host_capacity() as usize {
            return Err(SimError::AddressExhaustion {
                subnet: subnet.to_string(),
                capacity: subnet.host_capacity(),
                requested: wanted,
            });
        }

        if let Some(clash) = self
            .links
            .iter()
            .find(|l| l.subnet.is_some_and(|s| s.overlaps(&subnet)))
        {
            return Err(SimError::SubnetConflict {
                subnet: subnet.to_string(),
                existing: clash.subnet.map(|s| s.to_string()).unwrap_or_default(),
                link: clash.id,
            });
        }

        let members = target.members.clone();
        let mut assigned = Vec::with_capacity(members.len());
        for (n, node) in (1u32..).zip(members) {
            let address = subnet.host(n).ok_or_else(|| SimError::AddressExhaustion {
                subnet: subnet.to_string(),
                capacity: subnet.host_capacity(),
                requested: wanted,
            })?;
            assigned.push(Interface { node, address, link });
        }

        for iface in &assigned {
            self.nodes[iface.node.index()].interfaces.push(*iface);
        }
        self.links[link.index()].subnet = Some(subnet);

        debug!("link {} addressed from {}", link, subnet);
        Ok(assigned)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(SimError::UnknownNode(id))
    }

    pub fn link(&self, id: LinkId) -> Result<&Link> {
        self.links.get(id.index()).ok_or(SimError::UnknownLink(id))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn interfaces_of(&self, id: NodeId) -> Result<&[Interface]> {
        Ok(self.node(id)?.interfaces())
    }

    /// Address of `node` on `link`, if it has one there.
    pub fn address_on(&self, node: NodeId, link: LinkId) -> Option<Ipv4Addr> {
        self.nodes
            .get(node.index())?
            .interfaces
            .iter()
            .find(|i| i.link == link)
            .map(|i| i.address)
    }

    /// Which node owns `addr`.
    pub fn resolve(&self, addr: Ipv4Addr) -> Option<NodeId> {
        self.nodes
            .iter()
            .flat_map(|n| n.interfaces.iter())
            .find(|i| i.address == addr)
            .map(|i| i.node)
    }

    /// First link with both nodes attached. Routing beyond one hop is the
    /// protocol stack's business, not ours.
    pub fn shared_link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        self.links.iter().find(|l| l.connects(a) && l.connects(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(prefix: u8) -> Ipv4Addr {
        Ipv4Addr::from(u32::MAX << (32 - prefix))
    }

    fn lan() -> LinkConfig {
        LinkConfig::new(100_000_000, SimTime::from_nanos(6_560))
    }

    #[test]
    fn two_hosts_fit_a_slash_30() {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeRole::Router);
        let b = topo.add_node(NodeRole::Router);
        let link = topo.add_link(a, b, lan()).unwrap();

        let ifaces = topo
            .assign_addresses(link, Ipv4Addr::new(10, 0, 0, 0), mask(30))
            .unwrap();

        assert_eq!(ifaces.len(), 2);
        assert_eq!(ifaces[0].address, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ifaces[1].address, Ipv4Addr::new(10, 0, 0, 2));
        assert_ne!(ifaces[0].address, ifaces[1].address);
        assert_eq!(topo.interfaces_of(b).unwrap(), &ifaces[1..]);
    }

    #[test]
    fn three_hosts_exhaust_a_slash_30() {
        let mut topo = Topology::new();
        let nodes: Vec<_> = (0..3).map(|_| topo.add_node(NodeRole::Server)).collect();
        let link = topo.add_segment(&nodes, lan()).unwrap();

        let err = topo
            .assign_addresses(link, Ipv4Addr::new(10, 0, 0, 0), mask(30))
            .unwrap_err();
        assert!(matches!(err, SimError::AddressExhaustion { capacity: 2, requested: 3, .. }));

        // failed assignment leaves no trace
        assert!(topo.link(link).unwrap().subnet().is_none());
        assert!(topo.interfaces_of(nodes[0]).unwrap().is_empty());
    }

    #[test]
    fn overlapping_subnets_conflict() {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeRole::Router);
        let b = topo.add_node(NodeRole::Router);
        let c = topo.add_node(NodeRole::Server);
        let first = topo.add_link(a, b, lan()).unwrap();
        let second = topo.add_link(b, c, lan()).unwrap();

        topo.assign_addresses(first, Ipv4Addr::new(10, 1, 0, 0), mask(16))
            .unwrap();
        let err = topo
            .assign_addresses(second, Ipv4Addr::new(10, 1, 2, 0), mask(24))
            .unwrap_err();
        assert!(matches!(err, SimError::SubnetConflict { link, .. } if link == first));

        topo.assign_addresses(second, Ipv4Addr::new(10, 2, 2, 0), mask(24))
            .unwrap();
    }

    #[test]
    fn links_are_addressed_once() {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeRole::Router);
        let b = topo.add_node(NodeRole::Router);
        let link = topo.add_link(a, b, lan()).unwrap();

        topo.assign_addresses(link, Ipv4Addr::new(10, 1, 1, 0), mask(24))
            .unwrap();
        assert_eq!(
            topo.assign_addresses(link, Ipv4Addr::new(10, 9, 9, 0), mask(24)),
            Err(SimError::AlreadyAddressed(link))
        );
    }

    #[test]
    fn segments_number_in_member_order() {
        let mut topo = Topology::new();
        let ap = topo.add_node(NodeRole::AccessPoint);
        let stations: Vec<_> = (0..5).map(|_| topo.add_node(NodeRole::Station)).collect();
        let mut members = stations.clone();
        members.push(ap);

        let cell = topo.add_segment(&members, lan()).unwrap();
        topo.assign_addresses(cell, Ipv4Addr::new(10, 1, 3, 0), mask(24))
            .unwrap();

        assert_eq!(topo.address_on(ap, cell), Some(Ipv4Addr::new(10, 1, 3, 6)));
        assert_eq!(topo.resolve(Ipv4Addr::new(10, 1, 3, 1)), Some(stations[0]));
        assert_eq!(topo.resolve(Ipv4Addr::new(10, 1, 3, 7)), None);
        assert_eq!(topo.shared_link(stations[4], ap).map(|l| l.id), Some(cell));
    }

    #[test]
    fn bad_links_are_rejected() {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeRole::Router);
        let b = topo.add_node(NodeRole::Router);

        assert_eq!(
            topo.add_link(a, b, LinkConfig::new(0, SimTime::ZERO)),
            Err(SimError::InvalidLink)
        );
        assert_eq!(topo.add_link(a, a, lan()), Err(SimError::InvalidLink));
        assert_eq!(
            topo.add_link(a, NodeId::new(7), lan()),
            Err(SimError::UnknownNode(NodeId::new(7)))
        );
        assert_eq!(
            topo.assign_addresses(LinkId(3), Ipv4Addr::new(10, 0, 0, 0), mask(24)),
            Err(SimError::UnknownLink(LinkId(3)))
        );
    }

    #[test]
    fn whole_address_space_assigns_from_one() {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeRole::Router);
        let b = topo.add_node(NodeRole::Router);
        let link = topo.add_link(a, b, lan()).unwrap();

        let any = Ipv4Addr::new(0, 0, 0, 0);
        let ifaces = topo.assign_addresses(link, any, any).unwrap();
        assert_eq!(ifaces[0].address, Ipv4Addr::new(0, 0, 0, 1));
        assert_eq!(ifaces[1].address, Ipv4Addr::new(0, 0, 0, 2));
        assert_eq!(topo.link(link).unwrap().subnet().map(|s| s.prefix()), Some(0));
    }
}
