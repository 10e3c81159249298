//! Statistics processing and output
// (c) 2024 Ross Younger

use human_repr::{HumanCount as _, HumanDuration as _, HumanThroughput as _};
use std::{fmt::Display, time::Duration};
use tracing::info;

/// Human friendly output helper
#[derive(Debug, Clone, Copy)]
pub struct DataRate {
    /// Bytes per second; if None, we were unable to compute a rate.
    rate: Option<f64>,
}

impl DataRate {
    /// Computes a rate; a missing or zero duration has no meaningful rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(bytes: u64, time: Option<Duration>) -> Self {
        match time {
            Some(time) if !time.is_zero() => Self {
                rate: Some((bytes as f64) / time.as_secs_f64()),
            },
            _ => Self { rate: None },
        }
    }
    /// Bytes per second, if known
    #[must_use]
    pub fn byte_rate(&self) -> Option<f64> {
        self.rate
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte_rate() {
            None => f.write_str("unknown"),
            Some(rate) => rate.human_throughput_bytes().fmt(f),
        }
    }
}

/// Logs a one-line summary of a completed UDP transfer
pub fn log_transfer(verb: &str, bytes: u64, chunks: u64, elapsed: Duration) {
    let rate = DataRate::new(bytes, Some(elapsed));
    info!(
        "{verb} {} in {} datagrams, {}; average {rate}",
        bytes.human_count_bytes(),
        chunks.human_count_bare(),
        elapsed.human_duration()
    );
}

#[cfg(test)]
mod tests {
    use super::DataRate;
    use std::time::Duration;

    #[test]
    fn unknown() {
        let r = DataRate::new(1234, None);
        assert_eq!(format!("{r}"), "unknown");
        let r = DataRate::new(1234, Some(Duration::ZERO));
        assert_eq!(format!("{r}"), "unknown");
    }

    #[test]
    fn valid() {
        for (bytes, secs, expect) in [
            (42, 1, "42B/s"),
            (1234, 1, "1.2kB/s"),
            (10_000_000_000, 500, "20MB/s"),
        ] {
            let r = DataRate::new(bytes, Some(Duration::from_secs(secs)));
            assert_eq!(format!("{r}"), expect);
        }
    }
}
