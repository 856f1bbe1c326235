pub mod config;
pub mod world;

pub use config::{LinkSpec, NodeSpec, ScenarioConfig, SinkSpec, SubnetSpec};
pub use world::World;

use crate::clock::{Clock, RunStats, SimTime};
use crate::error::{Result, SimError};
use crate::generator::{self, GeneratorConfig, GeneratorId, Route, TrafficGenerator};
use crate::network::{LinkKind, NodeId, Topology};
use crate::sink::SinkTable;
use crate::trace::analyzer::{self, ConfidenceInterval};
use crate::trace::{EntityId, Metric, TraceCollector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One fully wired run: topology, sinks and generators built from a
/// [`ScenarioConfig`], with every start/stop already on the clock.
#[derive(Debug)]
pub struct Scenario {
    config: ScenarioConfig,
    clock: Clock<World>,
    world: World,
}

impl Scenario {
    /// Builds everything up front. The first invalid piece aborts the build,
    /// so a `Scenario` that exists is always runnable.
    pub fn build(config: ScenarioConfig) -> Result<Self> {
        info!("Building scenario: {}", config.name);

        let mut topology = Topology::new();
        for spec in &config.nodes {
            let id = topology.add_node(spec.role);
            debug!("{} is {}", spec.name, id);
        }

        for spec in &config.links {
            let link = match spec.kind {
                LinkKind::PointToPoint => match spec.members.as_slice() {
                    [a, b] => topology.add_link(*a, *b, spec.config)?,
                    _ => return Err(SimError::InvalidLink),
                },
                LinkKind::Segment => topology.add_segment(&spec.members, spec.config)?,
            };
            if let Some(subnet) = spec.subnet {
                for iface in topology.assign_addresses(link, subnet.base, subnet.mask)? {
                    debug!("{}: {} on {}", spec.name, iface.address, iface.node);
                }
            }
        }

        let mut sinks = SinkTable::new();
        for spec in &config.sinks {
            topology.node(spec.node)?;
            sinks.add(spec.label.clone(), spec.node, spec.port);
        }

        let mut world = World::new(topology, sinks, config.seed);
        for (i, spec) in config.generators.iter().enumerate() {
            let route = resolve_route(&world.topology, &world.sinks, spec)?;
            let id = GeneratorId::new(i as u32);
            world
                .generators
                .push(TrafficGenerator::new(id, spec.clone(), route)?);
        }

        if config.trace_tx {
            for g in &world.generators {
                world.trace.watch(EntityId::Generator(g.id().value()), Metric::TxBytes);
            }
        }
        if config.trace_rx {
            for s in world.sinks.iter() {
                world.trace.watch(EntityId::Sink(s.id.value()), Metric::RxBytes);
            }
        }

        let mut clock = Clock::new();
        for g in &world.generators {
            generator::install(&mut clock, g)?;
        }

        info!(
            "Nodes: {}, Links: {}, Generators: {}, Sinks: {}",
            world.topology.nodes().len(),
            world.topology.links().len(),
            world.generators.len(),
            world.sinks.len()
        );
        Ok(Self { config, clock, world })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn topology(&self) -> &Topology {
        &self.world.topology
    }

    pub fn sinks(&self) -> &SinkTable {
        &self.world.sinks
    }

    pub fn generators(&self) -> &[TrafficGenerator] {
        &self.world.generators
    }

    pub fn trace(&self) -> &TraceCollector {
        &self.world.trace
    }

    /// For attaching extra subscribers before the run starts.
    pub fn trace_mut(&mut self) -> &mut TraceCollector {
        &mut self.world.trace
    }

    /// Runs up to `time`, capped at the configured duration.
    pub fn advance_to(&mut self, time: SimTime) -> Result<RunStats> {
        let end = time.min(self.config.duration);
        self.clock.run_until(end, &mut self.world)
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let stats = self.clock.run_until(self.config.duration, &mut self.world)?;
        info!(
            "Scenario {} finished at {} after {} events",
            self.config.name, stats.now, self.clock.dispatched()
        );
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            name: self.config.name.clone(),
            seed: self.config.seed,
            end_time: self.clock.now(),
            events_dispatched: self.clock.dispatched(),
            sinks: self
                .world
                .sinks
                .iter()
                .map(|s| SinkReport {
                    label: s.label.clone(),
                    node: s.node,
                    port: s.port,
                    total_bytes_received: s.total_bytes_received,
                    packets_received: s.packets_received,
                    mean_transit: s.mean_transit(),
                })
                .collect(),
            generators: self
                .world
                .generators
                .iter()
                .map(|g| GeneratorReport {
                    label: g.config().label.clone(),
                    packets_sent: g.packets_sent(),
                    bytes_sent: g.bytes_sent(),
                })
                .collect(),
        }
    }
}

/// Maps a generator's destination address to the node that owns it, the link
/// both ends share, and the sink listening on the port.
fn resolve_route(topology: &Topology, sinks: &SinkTable, spec: &GeneratorConfig) -> Result<Route> {
    topology.node(spec.source)?;
    let no_route = || SimError::NoRoute {
        from: spec.source,
        destination: *spec.destination.ip(),
    };

    let destination = topology
        .resolve(*spec.destination.ip())
        .filter(|&node| node != spec.source)
        .ok_or_else(no_route)?;
    let link = topology
        .shared_link(spec.source, destination)
        .ok_or_else(no_route)?;
    let sink = sinks
        .lookup(destination, spec.destination.port())
        .ok_or(SimError::UnknownSink(spec.destination))?;

    Ok(Route {
        destination,
        sink,
        bandwidth_bps: link.config.bandwidth_bps,
        delay: link.config.delay,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReport {
    pub label: String,
    pub node: NodeId,
    pub port: u16,
    pub total_bytes_received: u64,
    pub packets_received: u64,
    pub mean_transit: Option<SimTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorReport {
    pub label: String,
    pub packets_sent: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub seed: u64,
    pub end_time: SimTime,
    pub events_dispatched: u64,
    pub sinks: Vec<SinkReport>,
    pub generators: Vec<GeneratorReport>,
}

impl RunSummary {
    pub fn sink(&self, label: &str) -> Option<&SinkReport> {
        self.sinks.iter().find(|s| s.label == label)
    }

    pub fn log(&self) {
        for s in &self.sinks {
            info!("Total Bytes {} Received: {}", s.label, s.total_bytes_received);
        }
        for g in &self.generators {
            debug!("{} sent {} packets ({} bytes)", g.label, g.packets_sent, g.bytes_sent);
        }
    }
}

/// Runs `runs` copies of `config` in parallel, seeds `seed`, `seed + 1`, ...
/// Results come back in seed order.
pub fn run_replicates(config: &ScenarioConfig, runs: u32) -> Result<Vec<RunSummary>> {
    (0..runs)
        .into_par_iter()
        .map(|i| {
            let seeded = config.clone().with_seed(config.seed.wrapping_add(u64::from(i)));
            Scenario::build(seeded)?.run()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateReport {
    pub label: String,
    pub runs: usize,
    pub bytes: Option<ConfidenceInterval>,
}

/// 95% interval of each sink's received bytes across replicates.
pub fn summarize_replicates(runs: &[RunSummary]) -> Vec<ReplicateReport> {
    let Some(first) = runs.first() else {
        return Vec::new();
    };
    first
        .sinks
        .iter()
        .map(|sink| {
            let totals: Vec<f64> = runs
                .iter()
                .filter_map(|r| r.sink(&sink.label))
                .map(|s| s.total_bytes_received as f64)
                .collect();
            ReplicateReport {
                label: sink.label.clone(),
                runs: totals.len(),
                bytes: analyzer::confidence_interval_95(&totals),
            }
        })
        .collect()
}
