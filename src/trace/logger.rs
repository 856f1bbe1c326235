use super::{EntityId, Metric, Sample};
use crate::clock::SimTime;
use anyhow::{Context, Result};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Flat CSV row for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub time_s: f64,
    pub entity: String,
    pub metric: String,
    pub old_value: f64,
    pub new_value: f64,
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        Self {
            time_s: sample.timestamp.as_secs_f64(),
            entity: sample.entity.to_string(),
            metric: sample.metric.to_string(),
            old_value: sample.old_value,
            new_value: sample.new_value,
        }
    }
}

impl TryFrom<SampleRecord> for Sample {
    type Error = anyhow::Error;

    fn try_from(record: SampleRecord) -> Result<Self> {
        let entity: EntityId = record.entity.parse().map_err(anyhow::Error::msg)?;
        let metric: Metric = record.metric.parse().map_err(anyhow::Error::msg)?;
        Ok(Self {
            timestamp: SimTime::from_secs_f64(record.time_s),
            entity,
            metric,
            old_value: record.old_value,
            new_value: record.new_value,
        })
    }
}

pub struct TraceLogger {
    writer: Writer<File>,
}

impl TraceLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log(&mut self, sample: &Sample) -> Result<()> {
        self.writer.serialize(SampleRecord::from(sample))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_batch(&mut self, samples: &[Sample]) -> Result<()> {
        for sample in samples {
            self.writer.serialize(SampleRecord::from(sample))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Tab separated `time value` lines, one metric per file.
pub fn write_series(path: impl AsRef<Path>, series: &[(f64, f64)]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    for (t, v) in series {
        writer.serialize((t, v))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_samples(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let mut reader =
        Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize::<SampleRecord>()
        .map(|row| Sample::try_from(row?))
        .collect()
}
