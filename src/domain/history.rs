//! Sensor sample history
//!
//! Growing per-topic series of x/y/z readings with elapsed-time stamps,
//! running statistics and CSV export.

use crate::domain::models::{Topic, Vector3};
use crate::error::ExportError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: [&str; 7] = [
    "Timestamp",
    "accel-X",
    "accel-Y",
    "accel-Z",
    "gyro-X",
    "gyro-Y",
    "gyro-Z",
];

/// Minimum sample count before a standard deviation is computed.
pub const MIN_STDEV_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Parallel x/y/z/timestamp sequences for one topic. Only `push` mutates
/// them, so all four always have the same length.
#[derive(Debug, Clone, Default)]
pub struct AxisHistory {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    timestamps: Vec<f64>,
    stats: [AxisStats; 3],
}

impl AxisHistory {
    fn push(&mut self, values: Vector3, elapsed_secs: f64) {
        self.x.push(values.x as f64);
        self.y.push(values.y as f64);
        self.z.push(values.z as f64);
        self.timestamps.push(elapsed_secs);
        self.recompute_stats();
    }

    fn recompute_stats(&mut self) {
        for (stats, series) in self.stats.iter_mut().zip([&self.x, &self.y, &self.z]) {
            stats.mean = mean(series);
            if series.len() >= MIN_STDEV_SAMPLES {
                stats.stdev = sample_stdev(series, stats.mean);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Mean and standard deviation for x, y and z.
    pub fn stats(&self) -> &[AxisStats; 3] {
        &self.stats
    }

    /// `(timestamp, value)` points for each axis over `range`.
    pub fn points(&self, range: std::ops::Range<usize>) -> [Vec<[f64; 2]>; 3] {
        let ts = &self.timestamps[range.clone()];
        [&self.x, &self.y, &self.z].map(|series| {
            ts.iter()
                .zip(&series[range.clone()])
                .map(|(t, v)| [*t, *v])
                .collect()
        })
    }

    fn row(&self, i: usize) -> Option<[f64; 3]> {
        Some([*self.x.get(i)?, *self.y.get(i)?, *self.z.get(i)?])
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_stdev(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[derive(Debug, Clone, Default)]
pub struct SampleHistory {
    accel: AxisHistory,
    gyro: AxisHistory,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reading to the series of `topic`; the other series is untouched.
    pub fn record(&mut self, topic: Topic, values: Vector3, elapsed_secs: f64) {
        match topic {
            Topic::Accel => self.accel.push(values, elapsed_secs),
            Topic::Gyro => self.gyro.push(values, elapsed_secs),
        }
    }

    pub fn series(&self, topic: Topic) -> &AxisHistory {
        match topic {
            Topic::Accel => &self.accel,
            Topic::Gyro => &self.gyro,
        }
    }

    pub fn accel(&self) -> &AxisHistory {
        &self.accel
    }

    pub fn gyro(&self) -> &AxisHistory {
        &self.gyro
    }

    /// Writes one row per accel sample. Gyro columns hold the gyro sample at
    /// the same index, or stay empty when the gyro history is shorter.
    /// Returns the number of data rows written.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<usize, ExportError> {
        writeln!(out, "{}", CSV_HEADER.join(","))?;

        for i in 0..self.accel.len() {
            let timestamp = self.accel.timestamps[i];
            let [ax, ay, az] = self.accel.row(i).unwrap_or_default();
            match self.gyro.row(i) {
                Some([gx, gy, gz]) => {
                    writeln!(out, "{},{},{},{},{},{},{}", timestamp, ax, ay, az, gx, gy, gz)?
                }
                None => writeln!(out, "{},{},{},{},,,", timestamp, ax, ay, az)?,
            }
        }

        out.flush()?;
        Ok(self.accel.len())
    }

    pub fn export_csv(&self, path: &Path) -> Result<usize, ExportError> {
        let file = File::create(path)?;
        let rows = self.write_csv(BufWriter::new(file))?;
        tracing::info!("Exported {} rows to {}", rows, path.display());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32, z: f32) -> Vector3 {
        Vector3::new(x, y, z)
    }

    #[test]
    fn accel_frame_grows_accel_series_only() {
        let mut history = SampleHistory::new();
        history.record(Topic::Accel, v(1.0, 2.0, 3.0), 0.1);
        history.record(Topic::Accel, v(4.0, 5.0, 6.0), 0.2);

        let accel = history.accel();
        assert_eq!(accel.x.len(), 2);
        assert_eq!(accel.y.len(), 2);
        assert_eq!(accel.z.len(), 2);
        assert_eq!(accel.timestamps.len(), 2);
        assert!(history.gyro().is_empty());
    }

    #[test]
    fn gyro_frame_grows_gyro_series_only() {
        let mut history = SampleHistory::new();
        history.record(Topic::Accel, v(1.0, 1.0, 1.0), 0.1);
        history.record(Topic::Gyro, v(0.5, 0.5, 0.5), 0.15);

        assert_eq!(history.accel().len(), 1);
        assert_eq!(history.accel().timestamps, vec![0.1]);
        let gyro = history.gyro();
        assert_eq!(gyro.x.len(), 1);
        assert_eq!(gyro.y.len(), 1);
        assert_eq!(gyro.z.len(), 1);
        assert_eq!(gyro.timestamps, vec![0.15]);
    }

    #[test]
    fn stdev_waits_for_three_samples() {
        let mut history = SampleHistory::new();
        history.record(Topic::Accel, v(1.0, 0.0, 0.0), 0.0);
        history.record(Topic::Accel, v(3.0, 0.0, 0.0), 0.1);

        let x = history.accel().stats()[0];
        assert_eq!(x.mean, 2.0);
        assert_eq!(x.stdev, 0.0);

        history.record(Topic::Accel, v(5.0, 0.0, 0.0), 0.2);
        let x = history.accel().stats()[0];
        assert_eq!(x.mean, 3.0);
        assert!((x.stdev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn csv_has_header_and_one_row_per_accel_sample() {
        let mut history = SampleHistory::new();
        for i in 0..4 {
            history.record(Topic::Accel, v(i as f32, 0.0, 0.0), i as f64 * 0.1);
        }
        for i in 0..2 {
            history.record(Topic::Gyro, v(0.0, i as f32, 0.0), i as f64 * 0.1);
        }

        let mut buf = Vec::new();
        let rows = history.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(rows, 4);
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "Timestamp,accel-X,accel-Y,accel-Z,gyro-X,gyro-Y,gyro-Z"
        );
        assert_eq!(lines[2], "0.1,1,0,0,0,1,0");
        assert_eq!(lines[4], "0.30000000000000004,3,0,0,,,");
    }

    #[test]
    fn csv_drops_gyro_samples_beyond_accel_length() {
        let mut history = SampleHistory::new();
        history.record(Topic::Accel, v(1.0, 1.0, 1.0), 0.0);
        for i in 0..3 {
            history.record(Topic::Gyro, v(i as f32, 0.0, 0.0), i as f64);
        }

        let mut buf = Vec::new();
        let rows = history.write_csv(&mut buf).unwrap();
        assert_eq!(rows, history.accel().len());
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 2);
    }

    #[test]
    fn points_pair_timestamps_with_values() {
        let mut history = SampleHistory::new();
        history.record(Topic::Gyro, v(1.0, 2.0, 3.0), 0.5);
        history.record(Topic::Gyro, v(4.0, 5.0, 6.0), 1.0);

        let [x, y, z] = history.gyro().points(1..2);
        assert_eq!(x, vec![[1.0, 4.0]]);
        assert_eq!(y, vec![[1.0, 5.0]]);
        assert_eq!(z, vec![[1.0, 6.0]]);
    }
}
