// Copyright (c) 2025 The TCPCC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A bounded, age-evicting sample window.
//!
//! BBR's bandwidth filter, the Vegas/Copa RTT histories and similar
//! estimators are all windowed FIFOs queried for their max, min or mean.
//! `SampleWindow` implements them once: capacity-bounded (oldest sample
//! evicted on overflow), with an optional wall-clock horizon enforced by
//! [`SampleWindow::evict_expired`]. The backing storage is allocated once
//! at construction; pushing a sample never allocates.

use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

#[derive(Debug, Copy, Clone)]
struct Sample {
    /// Sample value; bytes per second for bandwidth, microseconds for RTT.
    value: u64,

    /// When the sample was taken.
    time: Instant,
}

/// A fixed-capacity window of timestamped samples.
#[derive(Debug)]
pub struct SampleWindow {
    /// Max number of samples retained.
    capacity: usize,

    /// Samples older than this are dropped by `evict_expired`.
    max_age: Duration,

    samples: VecDeque<Sample>,
}

impl SampleWindow {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            capacity,
            max_age,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest one when the window is full.
    ///
    /// Timestamps are assumed monotonically non-decreasing in call order.
    pub fn push(&mut self, now: Instant, value: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { value, time: now });
    }

    /// Drop samples that fell out of the wall-clock horizon.
    pub fn evict_expired(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.time) > self.max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// The largest value in the window.
    pub fn max(&self) -> Option<u64> {
        self.samples.iter().map(|s| s.value).max()
    }

    /// The smallest value in the window.
    pub fn min(&self) -> Option<u64> {
        self.samples.iter().map(|s| s.value).min()
    }

    /// The arithmetic mean of the window.
    pub fn mean(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let sum: u64 = self.samples.iter().map(|s| s.value).sum();
        Some(sum / self.samples.len() as u64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_window_capacity() {
        let now = Instant::now();
        let mut w = SampleWindow::new(3, Duration::from_secs(60));

        for v in [10, 20, 30] {
            w.push(now, v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.max(), Some(30));
        assert_eq!(w.min(), Some(10));
        assert_eq!(w.mean(), Some(20));

        // A fourth sample evicts the oldest.
        w.push(now, 40);
        assert_eq!(w.len(), 3);
        assert_eq!(w.min(), Some(20));
        assert_eq!(w.max(), Some(40));
    }

    #[test]
    fn sample_window_age_eviction() {
        let start = Instant::now();
        let mut w = SampleWindow::new(10, Duration::from_secs(10));

        w.push(start, 100);
        w.push(start + Duration::from_secs(5), 200);
        w.push(start + Duration::from_secs(12), 300);

        // At t=12s the first sample is 12s old and falls out.
        w.evict_expired(start + Duration::from_secs(12));
        assert_eq!(w.len(), 2);
        assert_eq!(w.min(), Some(200));

        // Everything older than 10s goes; the newest survives.
        w.evict_expired(start + Duration::from_secs(20));
        assert_eq!(w.len(), 1);
        assert_eq!(w.max(), Some(300));

        w.evict_expired(start + Duration::from_secs(60));
        assert!(w.is_empty());
        assert_eq!(w.max(), None);
        assert_eq!(w.mean(), None);
    }

    #[test]
    fn sample_window_empty() {
        let w = SampleWindow::new(4, Duration::from_secs(1));
        assert!(w.is_empty());
        assert_eq!(w.len(), 0);
        assert_eq!(w.max(), None);
        assert_eq!(w.min(), None);
        assert_eq!(w.mean(), None);
    }
}
