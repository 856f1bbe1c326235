use crate::clock::SimTime;
use crate::generator::{GeneratorConfig, Interval, TrafficPattern};
use crate::network::{LinkConfig, LinkKind, NodeId, NodeRole};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub role: NodeRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub base: Ipv4Addr,
    pub mask: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    pub kind: LinkKind,
    /// Node ids in address-assignment order.
    pub members: Vec<NodeId>,
    #[serde(flatten)]
    pub config: LinkConfig,
    #[serde(default)]
    pub subnet: Option<SubnetSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkSpec {
    pub label: String,
    pub node: NodeId,
    pub port: u16,
}

/// Everything a run needs. Nodes get ids in list order, so `NodeId(3)` in a
/// link or generator is the fourth entry of `nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub seed: u64,
    pub duration: SimTime,
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
    pub sinks: Vec<SinkSpec>,
    pub generators: Vec<GeneratorConfig>,
    #[serde(default)]
    pub trace_tx: bool,
    #[serde(default)]
    pub trace_rx: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::wifi_lan()
    }
}

const BULK_PORT: u16 = 5001;
const IOT_PORT: u16 = 5002;

impl ScenarioConfig {
    /// The reference layout: a wireless cell behind a 50 Mbit/s backbone to
    /// an ISP router with a two-server LAN. Two stations run bulk transfers
    /// and three behave like IoT devices, all towards the access point.
    pub fn wifi_lan() -> Self {
        let mut nodes = vec![
            NodeSpec { name: "wifi-ap".into(), role: NodeRole::AccessPoint },
            NodeSpec { name: "isp-router".into(), role: NodeRole::Router },
            NodeSpec { name: "server-0".into(), role: NodeRole::Server },
            NodeSpec { name: "server-1".into(), role: NodeRole::Server },
        ];
        let stations: Vec<NodeId> = (0..5u32)
            .map(|i| {
                nodes.push(NodeSpec {
                    name: format!("sta-{}", i),
                    role: NodeRole::Station,
                });
                NodeId::new(4 + i)
            })
            .collect();
        let ap = NodeId::new(0);

        let mut cell = stations.clone();
        cell.push(ap);

        let links = vec![
            LinkSpec {
                name: "backbone".into(),
                kind: LinkKind::PointToPoint,
                members: vec![ap, NodeId::new(1)],
                config: LinkConfig::new(50_000_000, SimTime::from_millis(2)),
                subnet: Some(subnet([10, 1, 1, 0])),
            },
            LinkSpec {
                name: "lan".into(),
                kind: LinkKind::Segment,
                members: vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)],
                config: LinkConfig::new(100_000_000, SimTime::from_nanos(6_560)),
                subnet: Some(subnet([10, 1, 2, 0])),
            },
            LinkSpec {
                name: "wifi".into(),
                kind: LinkKind::Segment,
                members: cell,
                config: LinkConfig::new(54_000_000, SimTime::ZERO),
                subnet: Some(subnet([10, 1, 3, 0])),
            },
        ];

        // the AP is last in the cell, so it ends up with the sixth address
        let ap_addr = Ipv4Addr::new(10, 1, 3, 6);
        let window = |sta: usize, label: String, port: u16, pattern, packet_size| GeneratorConfig {
            label,
            source: stations[sta],
            destination: SocketAddrV4::new(ap_addr, port),
            pattern,
            packet_size,
            start: SimTime::ZERO,
            stop: SimTime::from_secs(10),
        };

        let mut generators = Vec::new();
        for sta in 0..2 {
            generators.push(window(sta, format!("bulk-{}", sta), BULK_PORT, TrafficPattern::Bulk, 512));
        }
        for sta in 2..5 {
            let iot = TrafficPattern::Periodic {
                on: Interval::secs(1),
                off: Interval::secs(1),
                rate_bps: 1_000_000,
            };
            generators.push(window(sta, format!("iot-{}", sta - 2), IOT_PORT, iot, 1000));
        }

        Self {
            name: "wifi_lan".into(),
            seed: 1,
            duration: SimTime::from_secs(10),
            nodes,
            links,
            sinks: vec![
                SinkSpec { label: "bulk".into(), node: ap, port: BULK_PORT },
                SinkSpec { label: "iot".into(), node: ap, port: IOT_PORT },
            ],
            generators,
            trace_tx: true,
            trace_rx: true,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_duration(mut self, duration: SimTime) -> Self {
        self.duration = duration;
        self
    }

    /// Swaps every constant on/off window for an exponential one with the
    /// same mean, so replicates under different seeds actually differ.
    pub fn with_exponential_windows(mut self) -> Self {
        let randomize = |i: Interval| match i {
            Interval::Constant(mean) => Interval::Exponential { mean },
            other => other,
        };
        for g in &mut self.generators {
            if let TrafficPattern::Periodic { on, off, rate_bps } = g.pattern {
                g.pattern = TrafficPattern::Periodic {
                    on: randomize(on),
                    off: randomize(off),
                    rate_bps,
                };
            }
        }
        self
    }
}

fn subnet(base: [u8; 4]) -> SubnetSpec {
    SubnetSpec {
        base: Ipv4Addr::from(base),
        mask: Ipv4Addr::new(255, 255, 255, 0),
    }
}
