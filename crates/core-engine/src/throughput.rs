//! Throughput sampler (§4.12): turns raw interface byte counters into a
//! bits-per-second rate on a fixed sampling interval, tolerating the
//! 32-bit counter wraparound that `/sys/class/net/*/statistics/*_bytes`
//! exhibits on some kernels/drivers.

use std::time::Duration;

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Counters are sampled as `u64` but some sources only ever increment a
/// 32-bit value internally, so a single wrap must be assumed rather than
/// treated as a several-exabyte spike.
const COUNTER_WRAP: u64 = 1u64 << 32;

#[derive(Clone, Copy, Debug, Default)]
pub struct ThroughputSample {
    pub rx_bps: f64,
    pub tx_bps: f64,
}

/// Per-interface sampler. Feed it raw cumulative byte counters at roughly
/// `DEFAULT_SAMPLE_INTERVAL` and it returns the instantaneous rate since
/// the previous sample.
#[derive(Debug)]
pub struct ThroughputSampler {
    last_rx_bytes: Option<u64>,
    last_tx_bytes: Option<u64>,
}

impl ThroughputSampler {
    pub fn new() -> Self {
        Self {
            last_rx_bytes: None,
            last_tx_bytes: None,
        }
    }

    /// Record a new pair of cumulative counters observed `elapsed` after
    /// the previous call and return the computed rate. The first call
    /// establishes a baseline and reports a zero rate.
    pub fn sample(&mut self, rx_bytes: u64, tx_bytes: u64, elapsed: Duration) -> ThroughputSample {
        let rx_bps = self
            .last_rx_bytes
            .map(|prev| Self::rate_bps(prev, rx_bytes, elapsed))
            .unwrap_or(0.0);
        let tx_bps = self
            .last_tx_bytes
            .map(|prev| Self::rate_bps(prev, tx_bytes, elapsed))
            .unwrap_or(0.0);

        self.last_rx_bytes = Some(rx_bytes);
        self.last_tx_bytes = Some(tx_bytes);

        ThroughputSample { rx_bps, tx_bps }
    }

    fn rate_bps(prev: u64, current: u64, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }
        let delta_bytes = if current >= prev {
            current - prev
        } else {
            // Counter wrapped once; the distance traveled is what's left
            // to the wrap plus however far past zero the new value is.
            (COUNTER_WRAP - prev) + current
        };
        (delta_bytes as f64 * 8.0) / elapsed.as_secs_f64()
    }
}

impl Default for ThroughputSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_establishes_baseline_with_zero_rate() {
        let mut sampler = ThroughputSampler::new();
        let sample = sampler.sample(1000, 500, Duration::from_secs(1));
        assert_eq!(sample.rx_bps, 0.0);
        assert_eq!(sample.tx_bps, 0.0);
    }

    #[test]
    fn computes_rate_between_samples() {
        let mut sampler = ThroughputSampler::new();
        sampler.sample(0, 0, Duration::from_secs(1));
        let sample = sampler.sample(1000, 2000, Duration::from_secs(1));
        assert_eq!(sample.rx_bps, 8000.0);
        assert_eq!(sample.tx_bps, 16000.0);
    }

    #[test]
    fn handles_counter_wraparound() {
        let mut sampler = ThroughputSampler::new();
        let near_wrap = COUNTER_WRAP - 100;
        sampler.sample(near_wrap, 0, Duration::from_secs(1));
        // Counter wrapped past zero and is now at 50.
        let sample = sampler.sample(50, 0, Duration::from_secs(1));
        assert_eq!(sample.rx_bps, (150 * 8) as f64);
    }
}
