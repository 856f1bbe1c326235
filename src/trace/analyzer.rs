// Post-run statistics over exported traces: goodput, batch means, confidence
// intervals. All of it works on plain sample slices so it runs just as well
// on a CSV read back from disk.

use super::{EntityId, Metric, Sample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// two-sided 95% Student-t critical values, df = 1..=30
const T_95: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

fn t_critical_95(df: usize) -> f64 {
    match df {
        0 => f64::INFINITY,
        1..=30 => T_95[df - 1],
        31..=60 => 2.000,
        61..=120 => 1.980,
        _ => 1.960,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub n: usize,
}

impl ConfidenceInterval {
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 95% interval around the mean of `values`. Needs at least two values.
pub fn confidence_interval_95(values: &[f64]) -> Option<ConfidenceInterval> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sem = (variance / n as f64).sqrt();
    let half = t_critical_95(n - 1) * sem;

    Some(ConfidenceInterval {
        mean,
        lower: mean - half,
        upper: mean + half,
        n,
    })
}

/// Means of consecutive, non-overlapping batches. A short trailing batch is
/// dropped so every mean covers the same number of observations.
pub fn batch_means(values: &[f64], batch: usize) -> Vec<f64> {
    if batch == 0 {
        return Vec::new();
    }
    values
        .chunks_exact(batch)
        .filter_map(mean)
        .collect()
}

/// Per-sample increments (`new - old`) of one metric.
pub fn increments(samples: &[Sample], entity: EntityId, metric: &Metric) -> Vec<f64> {
    samples
        .iter()
        .filter(|s| s.entity == entity && &s.metric == metric)
        .map(|s| s.new_value - s.old_value)
        .collect()
}

/// Bytes counted by `metric` over the span between its first and last sample,
/// in Mbit/s. `None` with fewer than two samples.
pub fn goodput_mbps(samples: &[Sample], entity: EntityId, metric: &Metric) -> Option<f64> {
    let mut matching = samples
        .iter()
        .filter(|s| s.entity == entity && &s.metric == metric);
    let first = matching.next()?;
    let mut last = first;
    let mut bytes = first.new_value - first.old_value;
    for s in matching {
        bytes += s.new_value - s.old_value;
        last = s;
    }

    let span = (last.timestamp - first.timestamp).as_secs_f64();
    if span <= 0.0 {
        return None;
    }
    Some(bytes * 8.0 / span / 1e6)
}

/// Mean gap between consecutive samples of one metric, in seconds.
pub fn mean_interval(samples: &[Sample], entity: EntityId, metric: &Metric) -> Option<f64> {
    let times: Vec<f64> = samples
        .iter()
        .filter(|s| s.entity == entity && &s.metric == metric)
        .map(|s| s.timestamp.as_secs_f64())
        .collect();
    let gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    mean(&gaps)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: EntityId,
    pub metric: Metric,
    pub samples: usize,
    pub total_bytes: f64,
    pub goodput_mbps: Option<f64>,
    pub mean_interval_s: Option<f64>,
    pub batch_ci: Option<ConfidenceInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub batch_size: usize,
    pub entities: Vec<EntityReport>,
}

/// One report line per (entity, metric) present in `samples`, sorted by
/// entity. The confidence interval is over batch means of the per-sample
/// increments.
pub fn analyze(samples: &[Sample], batch_size: usize) -> AnalysisReport {
    let mut keys: BTreeMap<(EntityId, String), Metric> = BTreeMap::new();
    for s in samples {
        keys.entry((s.entity, s.metric.to_string()))
            .or_insert_with(|| s.metric.clone());
    }

    let entities = keys
        .into_iter()
        .map(|((entity, _), metric)| {
            let inc = increments(samples, entity, &metric);
            EntityReport {
                entity,
                samples: inc.len(),
                total_bytes: inc.iter().sum(),
                goodput_mbps: goodput_mbps(samples, entity, &metric),
                mean_interval_s: mean_interval(samples, entity, &metric),
                batch_ci: confidence_interval_95(&batch_means(&inc, batch_size)),
                metric,
            }
        })
        .collect();

    AnalysisReport {
        batch_size,
        entities,
    }
}
