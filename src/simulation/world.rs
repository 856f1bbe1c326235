use crate::generator::TrafficGenerator;
use crate::network::Topology;
use crate::sink::SinkTable;
use crate::trace::TraceCollector;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// All mutable simulation state. Event actions receive it by `&mut` next to
/// the clock, so nothing in a run is global and two runs never share state.
#[derive(Debug)]
pub struct World {
    pub topology: Topology,
    pub generators: Vec<TrafficGenerator>,
    pub sinks: SinkTable,
    pub trace: TraceCollector,
    pub rng: StdRng,
}

impl World {
    pub fn new(topology: Topology, sinks: SinkTable, seed: u64) -> Self {
        Self {
            topology,
            generators: Vec::new(),
            sinks,
            trace: TraceCollector::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}
