// Traffic sources. Each generator drives itself through the clock: a start
// event, a chain of emission events, and (for on/off sources) window
// transitions, until its stop event parks it for good.

use crate::clock::{Clock, EventHandle, SimTime, transmission_time};
use crate::error::{Result, SimError};
use crate::network::{NodeId, Packet, PacketId};
use crate::simulation::World;
use crate::sink::SinkId;
use crate::trace::{EntityId, Metric, Sample};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorId(u32);

impl GeneratorId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Length of an on or off window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interval {
    Constant(SimTime),
    /// Exponentially distributed, drawn from the run's seeded RNG.
    Exponential { mean: SimTime },
}

impl Interval {
    pub fn secs(s: u64) -> Self {
        Self::Constant(SimTime::from_secs(s))
    }

    fn draw(&self, rng: &mut StdRng) -> SimTime {
        match *self {
            Self::Constant(t) => t,
            Self::Exponential { mean } => {
                let lambda = 1.0 / mean.as_secs_f64();
                match Exp::new(lambda) {
                    // at least one tick so an on/off cycle always moves the clock
                    Ok(dist) => SimTime::from_secs_f64(dist.sample(rng)).max(SimTime::from_nanos(1)),
                    Err(_) => mean,
                }
            }
        }
    }

    fn is_zero(&self) -> bool {
        match *self {
            Self::Constant(t) => t == SimTime::ZERO,
            Self::Exponential { mean } => mean == SimTime::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficPattern {
    /// Greedy sender: back-to-back packets at link rate.
    Bulk,
    /// Bursty device: `rate_bps` during on windows, silent during off.
    Periodic {
        on: Interval,
        off: Interval,
        rate_bps: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub label: String,
    pub source: NodeId,
    pub destination: SocketAddrV4,
    pub pattern: TrafficPattern,
    pub packet_size: u32,
    pub start: SimTime,
    pub stop: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Saturating,
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorState {
    Idle,
    Active(Phase),
    Stopped,
}

/// Where a generator's packets go, resolved once at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub destination: NodeId,
    pub sink: SinkId,
    pub bandwidth_bps: u64,
    pub delay: SimTime,
}

#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    id: GeneratorId,
    config: GeneratorConfig,
    route: Route,
    state: GeneratorState,
    pending_emission: Option<(EventHandle, SimTime)>,
    pending_transition: Option<EventHandle>,
    packets_sent: u64,
    bytes_sent: u64,
}

impl TrafficGenerator {
    pub fn new(id: GeneratorId, config: GeneratorConfig, route: Route) -> Result<Self> {
        if config.stop < config.start {
            return Err(SimError::InvalidWindow {
                start: config.start,
                stop: config.stop,
            });
        }
        if config.packet_size == 0 {
            return Err(SimError::InvalidPattern(format!(
                "{}: packet size must be nonzero",
                config.label
            )));
        }
        if let TrafficPattern::Periodic { on, off, rate_bps } = config.pattern {
            if rate_bps == 0 {
                return Err(SimError::InvalidPattern(format!("{}: zero rate", config.label)));
            }
            if on.is_zero() && off.is_zero() {
                return Err(SimError::InvalidPattern(format!(
                    "{}: on and off windows are both empty",
                    config.label
                )));
            }
        }

        Ok(Self {
            id,
            config,
            route,
            state: GeneratorState::Idle,
            pending_emission: None,
            pending_transition: None,
            packets_sent: 0,
            bytes_sent: 0,
        })
    }

    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Gap between consecutive emissions while the generator is sending.
    pub fn emission_interval(&self) -> SimTime {
        let rate = match self.config.pattern {
            TrafficPattern::Bulk => self.route.bandwidth_bps,
            TrafficPattern::Periodic { rate_bps, .. } => rate_bps,
        };
        transmission_time(self.config.packet_size, rate)
    }

    fn is_sending(&self) -> bool {
        matches!(
            self.state,
            GeneratorState::Active(Phase::Saturating | Phase::On)
        )
    }
}

fn generator_mut(world: &mut World, id: GeneratorId) -> Result<&mut TrafficGenerator> {
    world
        .generators
        .get_mut(id.index())
        .ok_or(SimError::UnknownGenerator(id.0))
}

/// Queues the generator's start and stop transitions. Stop goes in second,
/// so a zero-length window still activates before it ends.
pub fn install(clock: &mut Clock<World>, generator: &TrafficGenerator) -> Result<()> {
    let id = generator.id;
    clock.schedule(generator.config.start, move |c, w| on_start(c, w, id))?;
    clock.schedule(generator.config.stop, move |c, w| on_stop(c, w, id))?;
    Ok(())
}

fn on_start(clock: &mut Clock<World>, world: &mut World, id: GeneratorId) -> Result<()> {
    let g = generator_mut(world, id)?;
    if g.state != GeneratorState::Idle {
        return Ok(());
    }
    let pattern = g.config.pattern;
    info!("{} starts at {} ({:?})", g.config.label, clock.now(), pattern);

    match pattern {
        TrafficPattern::Bulk => {
            g.state = GeneratorState::Active(Phase::Saturating);
            schedule_emission(clock, world, id)
        }
        TrafficPattern::Periodic { .. } => enter_on(clock, world, id),
    }
}

fn schedule_emission(clock: &mut Clock<World>, world: &mut World, id: GeneratorId) -> Result<()> {
    let g = generator_mut(world, id)?;
    let at = clock.now() + g.emission_interval();
    let handle = clock.schedule(at, move |c, w| on_emission(c, w, id))?;
    g.pending_emission = Some((handle, at));
    Ok(())
}

fn on_emission(clock: &mut Clock<World>, world: &mut World, id: GeneratorId) -> Result<()> {
    let now = clock.now();
    let g = generator_mut(world, id)?;
    g.pending_emission = None;

    let packet = Packet::new(
        PacketId::new(g.packets_sent),
        g.config.source,
        g.config.destination,
        g.config.packet_size,
        now,
    );
    let old = g.bytes_sent;
    g.packets_sent += 1;
    g.bytes_sent += u64::from(g.config.packet_size);
    let new = g.bytes_sent;
    let route = g.route;
    let keep_sending = g.is_sending();

    let entity = EntityId::Generator(id.0);
    if world.trace.is_subscribed(entity, &Metric::TxBytes) {
        world.trace.record(Sample {
            timestamp: now,
            entity,
            metric: Metric::TxBytes,
            old_value: old as f64,
            new_value: new as f64,
        });
    }

    let sink = route.sink;
    clock.schedule_after(route.delay, move |c, w| deliver(c, w, sink, packet))?;

    if keep_sending {
        schedule_emission(clock, world, id)?;
    }
    Ok(())
}

/// Receive event at the sink end of a route.
fn deliver(clock: &mut Clock<World>, world: &mut World, sink: SinkId, packet: Packet) -> Result<()> {
    let now = clock.now();
    let (old, new) = world
        .sinks
        .receive(sink, &packet, now)
        .ok_or(SimError::UnknownSink(packet.destination))?;

    let entity = EntityId::Sink(sink.value());
    if world.trace.is_subscribed(entity, &Metric::RxBytes) {
        world.trace.record(Sample {
            timestamp: now,
            entity,
            metric: Metric::RxBytes,
            old_value: old as f64,
            new_value: new as f64,
        });
    }
    Ok(())
}

fn enter_on(clock: &mut Clock<World>, world: &mut World, id: GeneratorId) -> Result<()> {
    let now = clock.now();
    let g = world
        .generators
        .get_mut(id.index())
        .ok_or(SimError::UnknownGenerator(id.0))?;
    let TrafficPattern::Periodic { on, .. } = g.config.pattern else {
        return Ok(());
    };
    if g.state == GeneratorState::Stopped {
        return Ok(());
    }

    let window = on.draw(&mut world.rng);
    if window == SimTime::ZERO {
        warn!("{}: empty on window at {}", g.config.label, now);
    }
    debug!("{} on for {} at {}", g.config.label, window, now);

    g.state = GeneratorState::Active(Phase::On);
    g.pending_transition = Some(clock.schedule(now + window, move |c, w| enter_off(c, w, id))?);
    schedule_emission(clock, world, id)
}

fn enter_off(clock: &mut Clock<World>, world: &mut World, id: GeneratorId) -> Result<()> {
    let now = clock.now();
    let g = world
        .generators
        .get_mut(id.index())
        .ok_or(SimError::UnknownGenerator(id.0))?;
    let TrafficPattern::Periodic { off, .. } = g.config.pattern else {
        return Ok(());
    };
    if g.state != GeneratorState::Active(Phase::On) {
        return Ok(());
    }

    g.state = GeneratorState::Active(Phase::Off);
    cancel_unfinished(clock, g, now)?;

    let window = off.draw(&mut world.rng);
    debug!("{} off for {} at {}", g.config.label, window, now);
    g.pending_transition = Some(clock.schedule(now + window, move |c, w| enter_on(c, w, id))?);
    Ok(())
}

fn on_stop(clock: &mut Clock<World>, world: &mut World, id: GeneratorId) -> Result<()> {
    let now = clock.now();
    let g = generator_mut(world, id)?;
    if g.state == GeneratorState::Stopped {
        return Ok(());
    }

    g.state = GeneratorState::Stopped;
    if let Some(handle) = g.pending_transition.take() {
        clock.cancel(handle)?;
    }
    cancel_unfinished(clock, g, now)?;

    info!(
        "{} stopped at {}: {} packets, {} bytes",
        g.config.label, now, g.packets_sent, g.bytes_sent
    );
    Ok(())
}

// A packet whose last bit leaves exactly at the boundary still counts; only
// one that would finish after it is withdrawn.
fn cancel_unfinished(clock: &mut Clock<World>, g: &mut TrafficGenerator, now: SimTime) -> Result<()> {
    if let Some((handle, at)) = g.pending_emission {
        if at > now {
            clock.cancel(handle)?;
            g.pending_emission = None;
        }
    }
    Ok(())
}
