pub mod analyzer;
pub mod logger;

use crate::clock::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityId {
    Generator(u32),
    Sink(u32),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator(id) => write!(f, "gen-{}", id),
            Self::Sink(id) => write!(f, "sink-{}", id),
        }
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |n: &str| n.parse::<u32>().map_err(|e| format!("{}: {}", s, e));
        if let Some(n) = s.strip_prefix("gen-") {
            Ok(Self::Generator(parse(n)?))
        } else if let Some(n) = s.strip_prefix("sink-") {
            Ok(Self::Sink(parse(n)?))
        } else {
            Err(format!("unknown entity: {}", s))
        }
    }
}

/// What a sample measures. Byte counters come from the core; anything else
/// (a congestion window from an external TCP model, say) goes in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    TxBytes,
    RxBytes,
    Custom(String),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxBytes => f.write_str("tx_bytes"),
            Self::RxBytes => f.write_str("rx_bytes"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "tx_bytes" => Self::TxBytes,
            "rx_bytes" => Self::RxBytes,
            other => Self::Custom(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: SimTime,
    pub entity: EntityId,
    pub metric: Metric,
    pub old_value: f64,
    pub new_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Callback = Box<dyn FnMut(&Sample)>;

struct Subscriber {
    entity: EntityId,
    metric: Metric,
    callback: Callback,
}

/// Append-only sample log with an observer list in front of it.
///
/// Producers ask `is_subscribed` before building a sample, so unwatched
/// metrics cost nothing. Everything recorded is kept, in call order, which
/// is also (time, sequence) order since recording only happens from inside
/// event actions.
#[derive(Default)]
pub struct TraceCollector {
    samples: Vec<Sample>,
    subscribers: Vec<Subscriber>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, entity: EntityId, metric: Metric, callback: F) -> SubscriptionId
    where
        F: FnMut(&Sample) + 'static,
    {
        self.subscribers.push(Subscriber {
            entity,
            metric,
            callback: Box::new(callback),
        });
        SubscriptionId(self.subscribers.len() - 1)
    }

    /// Subscribe without a callback: samples are kept for `export` only.
    pub fn watch(&mut self, entity: EntityId, metric: Metric) -> SubscriptionId {
        self.subscribe(entity, metric, |_| {})
    }

    pub fn is_subscribed(&self, entity: EntityId, metric: &Metric) -> bool {
        self.subscribers
            .iter()
            .any(|s| s.entity == entity && &s.metric == metric)
    }

    pub fn record(&mut self, sample: Sample) {
        for sub in &mut self.subscribers {
            if sub.entity == sample.entity && sub.metric == sample.metric {
                (sub.callback)(&sample);
            }
        }
        self.samples.push(sample);
    }

    pub fn export(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Two-column (seconds, value) view of one metric.
    pub fn series(&self, entity: EntityId, metric: &Metric) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .filter(|s| s.entity == entity && &s.metric == metric)
            .map(|s| (s.timestamp.as_secs_f64(), s.new_value))
            .collect()
    }
}

impl fmt::Debug for TraceCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceCollector")
            .field("samples", &self.samples.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample(ms: u64, entity: EntityId, metric: Metric, old: f64, new: f64) -> Sample {
        Sample {
            timestamp: SimTime::from_millis(ms),
            entity,
            metric,
            old_value: old,
            new_value: new,
        }
    }

    #[test]
    fn export_returns_every_record_in_order() {
        let mut trace = TraceCollector::new();
        for i in 0..5u64 {
            trace.record(sample(i, EntityId::Sink(0), Metric::RxBytes, i as f64, (i + 1) as f64));
        }

        let out = trace.export();
        assert_eq!(out.len(), 5);
        assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(out[3].new_value, 4.0);
    }

    #[test]
    fn export_is_idempotent() {
        let mut trace = TraceCollector::new();
        trace.record(sample(1, EntityId::Generator(2), Metric::TxBytes, 0.0, 512.0));

        let first = trace.export().to_vec();
        let second = trace.export().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn callbacks_only_see_their_metric() {
        let mut trace = TraceCollector::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        trace.subscribe(EntityId::Sink(1), Metric::RxBytes, move |s| {
            sink.borrow_mut().push(s.new_value)
        });

        trace.record(sample(1, EntityId::Sink(1), Metric::RxBytes, 0.0, 10.0));
        trace.record(sample(2, EntityId::Sink(2), Metric::RxBytes, 0.0, 99.0));
        trace.record(sample(3, EntityId::Sink(1), Metric::TxBytes, 0.0, 99.0));
        trace.record(sample(4, EntityId::Sink(1), Metric::RxBytes, 10.0, 20.0));

        assert_eq!(*seen.borrow(), vec![10.0, 20.0]);
        // unsubscribed samples are still recorded
        assert_eq!(trace.len(), 4);
    }

    #[test]
    fn subscription_lookup() {
        let mut trace = TraceCollector::new();
        trace.watch(EntityId::Generator(0), Metric::Custom("cwnd".into()));

        assert!(trace.is_subscribed(EntityId::Generator(0), &Metric::Custom("cwnd".into())));
        assert!(!trace.is_subscribed(EntityId::Generator(0), &Metric::TxBytes));
        assert!(!trace.is_subscribed(EntityId::Generator(1), &Metric::Custom("cwnd".into())));
    }

    #[test]
    fn series_is_two_columns() {
        let mut trace = TraceCollector::new();
        trace.record(sample(500, EntityId::Sink(0), Metric::RxBytes, 0.0, 100.0));
        trace.record(sample(750, EntityId::Generator(0), Metric::TxBytes, 0.0, 100.0));
        trace.record(sample(1_000, EntityId::Sink(0), Metric::RxBytes, 100.0, 200.0));

        assert_eq!(
            trace.series(EntityId::Sink(0), &Metric::RxBytes),
            vec![(0.5, 100.0), (1.0, 200.0)]
        );
    }

    #[test]
    fn names_round_trip_through_text() {
        assert_eq!("gen-4".parse::<EntityId>(), Ok(EntityId::Generator(4)));
        assert_eq!("sink-0".parse::<EntityId>(), Ok(EntityId::Sink(0)));
        assert!("node-1".parse::<EntityId>().is_err());
        assert_eq!("cwnd".parse::<Metric>(), Ok(Metric::Custom("cwnd".into())));
        assert_eq!(Metric::RxBytes.to_string(), "rx_bytes");
    }
}
