use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// An IPv4 network in prefix form, e.g. `10.1.3.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Subnet {
    /// Builds a subnet from a base address and a dotted mask. The mask must be
    /// contiguous and the base must not carry host bits.
    pub fn from_base_mask(base: Ipv4Addr, mask: Ipv4Addr) -> Result<Self> {
        let bits = u32::from(mask);
        let prefix = bits.leading_ones();
        let invalid = SimError::InvalidSubnet { base, mask };

        if bits.checked_shl(prefix).unwrap_or(0) != 0 {
            return Err(invalid);
        }
        if u32::from(base) & !bits != 0 {
            return Err(invalid);
        }

        Ok(Self {
            network: base,
            prefix: prefix as u8,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_bits(self.prefix))
    }

    /// Usable host addresses: network and broadcast are reserved, so /31 and
    /// /32 hold none.
    pub fn host_capacity(&self) -> u32 {
        match self.prefix {
            31 | 32 => 0,
            // a /0 spans 2^32 addresses, which only fits once widened
            p => ((1u64 << (32 - p)) - 2) as u32,
        }
    }

    /// The `n`th host address, counting from 1.
    pub fn host(&self, n: u32) -> Option<Ipv4Addr> {
        if n == 0 || n > self.host_capacity() {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.network) + n))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask_bits(self.prefix) == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &Subnet) -> bool {
        let shorter = mask_bits(self.prefix.min(other.prefix));
        u32::from(self.network) & shorter == u32::from(other.network) & shorter
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn mask_bits(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(base: [u8; 4], mask: [u8; 4]) -> Subnet {
        Subnet::from_base_mask(Ipv4Addr::from(base), Ipv4Addr::from(mask)).unwrap()
    }

    #[test]
    fn parses_prefix_from_mask() {
        let s = net([10, 1, 3, 0], [255, 255, 255, 0]);
        assert_eq!(s.prefix(), 24);
        assert_eq!(s.mask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(s.to_string(), "10.1.3.0/24");
        assert_eq!(net([0, 0, 0, 0], [0, 0, 0, 0]).prefix(), 0);
    }

    #[test]
    fn rejects_holes_in_the_mask() {
        let err = Subnet::from_base_mask(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 0, 255, 0));
        assert!(matches!(err, Err(SimError::InvalidSubnet { .. })));
    }

    #[test]
    fn rejects_host_bits_in_the_base() {
        let err = Subnet::from_base_mask(Ipv4Addr::new(10, 1, 1, 5), Ipv4Addr::new(255, 255, 255, 0));
        assert!(matches!(err, Err(SimError::InvalidSubnet { .. })));
    }

    #[test]
    fn capacity_excludes_network_and_broadcast() {
        assert_eq!(net([10, 0, 0, 0], [255, 255, 255, 252]).host_capacity(), 2);
        assert_eq!(net([10, 0, 0, 0], [255, 255, 255, 0]).host_capacity(), 254);
        assert_eq!(net([10, 0, 0, 0], [255, 255, 255, 254]).host_capacity(), 0);
        assert_eq!(net([10, 0, 0, 1], [255, 255, 255, 255]).host_capacity(), 0);
        assert_eq!(net([0, 0, 0, 0], [0, 0, 0, 0]).host_capacity(), u32::MAX - 1);
        assert_eq!(net([0, 0, 0, 0], [128, 0, 0, 0]).host_capacity(), (1 << 31) - 2);
    }

    #[test]
    fn hosts_count_from_one() {
        let s = net([192, 168, 0, 0], [255, 255, 255, 252]);
        assert_eq!(s.host(0), None);
        assert_eq!(s.host(1), Some(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(s.host(2), Some(Ipv4Addr::new(192, 168, 0, 2)));
        assert_eq!(s.host(3), None);
    }

    #[test]
    fn overlap_uses_the_shorter_prefix() {
        let wide = net([10, 1, 0, 0], [255, 255, 0, 0]);
        let inner = net([10, 1, 3, 0], [255, 255, 255, 0]);
        let other = net([10, 2, 3, 0], [255, 255, 255, 0]);

        assert!(wide.overlaps(&inner));
        assert!(inner.overlaps(&wide));
        assert!(!inner.overlaps(&other));
        assert!(wide.contains(Ipv4Addr::new(10, 1, 200, 7)));
        assert!(!inner.contains(Ipv4Addr::new(10, 1, 4, 1)));
    }
}
