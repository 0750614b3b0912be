//! Timing analysis of persisted records.
//!
//! Consumes the 8-byte records written by an acquisition run and computes the
//! time difference between consecutive events. Timestamps are 56-bit counters,
//! so a negative difference is a rollover and is corrected modulo 2^56.

use std::{
    collections::BTreeMap,
    io::{self, Read},
};

use sitcp_proto::{RECORD_SIZE, Record, feed::timestamp_delta};

use crate::config::AnalysisConfig;

/// Fixed-width 1-D histogram with under/overflow counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    low: f64,
    high: f64,
    bins: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl Histogram {
    /// `bins` equal bins covering `[low, high)`. At least one bin is kept.
    pub fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { low, high, bins: vec![0; bins.max(1)], underflow: 0, overflow: 0 }
    }

    /// Count one value. NaN is counted as overflow.
    pub fn fill(&mut self, value: f64) {
        if value < self.low {
            self.underflow += 1;
            return;
        }
        if value >= self.high || value.is_nan() {
            self.overflow += 1;
            return;
        }

        let bin = ((value - self.low) / self.bin_width()) as usize;
        let last = self.bins.len() - 1;
        if let Some(count) = self.bins.get_mut(bin.min(last)) {
            *count += 1;
        }
    }

    /// Per-bin counts.
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Width of one bin.
    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.bins.len() as f64
    }

    /// Lower edge of bin `index`.
    pub fn bin_low(&self, index: usize) -> f64 {
        self.low + self.bin_width() * index as f64
    }

    /// Values below the lower edge.
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Values at or above the upper edge.
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Values that landed in a bin.
    pub fn in_range(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Fullest bin as `(index, count)`, first one on ties.
    pub fn peak(&self) -> Option<(usize, u64)> {
        self.bins
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, count)| count > 0)
            .fold(None, |best, (i, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((i, count)),
            })
    }
}

/// Accumulated timing statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingAnalysis {
    config: AnalysisConfig,
    event_count: u64,
    used_pairs: u64,
    channel_counts: [u64; 256],
    previous: Option<u64>,
    dt_min_ns: f64,
    dt_max_ns: f64,
    dt_sum_ns: f64,
    histogram: Histogram,
    channel_histograms: BTreeMap<u8, Histogram>,
    trailing_bytes: usize,
}

impl TimingAnalysis {
    /// Empty analysis.
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            event_count: 0,
            used_pairs: 0,
            channel_counts: [0; 256],
            previous: None,
            dt_min_ns: f64::INFINITY,
            dt_max_ns: f64::NEG_INFINITY,
            dt_sum_ns: 0.0,
            histogram: Histogram::new(config.bins, config.low_ns, config.high_ns),
            channel_histograms: BTreeMap::new(),
            trailing_bytes: 0,
        }
    }

    /// Analyze every record in `records`.
    pub fn from_records(config: AnalysisConfig, records: impl IntoIterator<Item = Record>) -> Self {
        let mut analysis = Self::new(config);
        for record in records {
            analysis.push(record);
        }
        analysis
    }

    /// Analyze a record file.
    ///
    /// An incomplete trailing record is logged, counted in
    /// [`Self::trailing_bytes`], and ignored.
    ///
    /// # Errors
    ///
    /// Any read error other than `Interrupted`.
    pub fn from_reader<R: Read>(config: AnalysisConfig, mut reader: R) -> io::Result<Self> {
        let mut analysis = Self::new(config);
        let mut buf = [0u8; RECORD_SIZE];

        loop {
            let n = read_full(&mut reader, &mut buf)?;
            if n == RECORD_SIZE {
                analysis.push(Record::from_bytes(buf));
                continue;
            }
            if n > 0 {
                tracing::warn!(bytes = n, "last record is incomplete, ignored");
                analysis.trailing_bytes = n;
            }
            break;
        }

        tracing::info!(
            events = analysis.event_count,
            used_pairs = analysis.used_pairs,
            "analysis finished"
        );
        Ok(analysis)
    }

    /// Add one record.
    ///
    /// The Δt to the previous record is also filed under this record's
    /// channel.
    pub fn push(&mut self, record: Record) {
        let timestamp = record.timestamp();
        let channel = record.channel_id();

        if let Some(count) = self.channel_counts.get_mut(usize::from(record.channel_id())) {
            *count += 1;
        }

        if let Some(previous) = self.previous {
            let dt_ns = timestamp_delta(previous, timestamp) as f64 * self.config.lsb_ns;
            self.dt_min_ns = self.dt_min_ns.min(dt_ns);
            self.dt_max_ns = self.dt_max_ns.max(dt_ns);
            self.dt_sum_ns += dt_ns;
            self.histogram.fill(dt_ns);
            let config = self.config;
            self.channel_histograms
                .entry(channel)
                .or_insert_with(|| Histogram::new(config.bins, config.low_ns, config.high_ns))
                .fill(dt_ns);
            self.used_pairs += 1;
        }

        self.previous = Some(timestamp);
        self.event_count += 1;
    }

    /// Configuration in use.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Records seen.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Consecutive pairs that produced a Δt (events minus one).
    pub fn used_pairs(&self) -> u64 {
        self.used_pairs
    }

    /// Records seen on `channel`.
    pub fn channel_count(&self, channel: u8) -> u64 {
        self.channel_counts.get(usize::from(channel)).copied().unwrap_or(0)
    }

    /// Per-channel record counts, indexed by channel id.
    pub fn channel_counts(&self) -> &[u64; 256] {
        &self.channel_counts
    }

    /// Smallest Δt in ns.
    pub fn min_dt_ns(&self) -> Option<f64> {
        (self.used_pairs > 0).then_some(self.dt_min_ns)
    }

    /// Largest Δt in ns.
    pub fn max_dt_ns(&self) -> Option<f64> {
        (self.used_pairs > 0).then_some(self.dt_max_ns)
    }

    /// Mean Δt in ns.
    pub fn mean_dt_ns(&self) -> Option<f64> {
        (self.used_pairs > 0).then(|| self.dt_sum_ns / self.used_pairs as f64)
    }

    /// Δt histogram.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Δt histogram of the events on `channel`, if any produced a Δt.
    pub fn channel_histogram(&self, channel: u8) -> Option<&Histogram> {
        self.channel_histograms.get(&channel)
    }

    /// Per-channel Δt histograms, in channel order.
    pub fn channel_histograms(&self) -> impl Iterator<Item = (u8, &Histogram)> {
        self.channel_histograms.iter().map(|(&channel, h)| (channel, h))
    }

    /// Bytes of an incomplete final record (0 if the input was whole).
    pub fn trailing_bytes(&self) -> usize {
        self.trailing_bytes
    }
}

/// Fill `buf` unless EOF comes first; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
