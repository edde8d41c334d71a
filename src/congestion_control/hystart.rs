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

//! Hystart slow-start exit heuristic.
//!
//! Hystart watches the spread between the smallest and largest RTT sample
//! within the current round of slow start. A growing spread means packets
//! are starting to queue at the bottleneck; leaving slow start at that
//! point avoids the overshoot-and-loss that ending slow start on packet
//! loss would cost.
//!
//! See <https://doi.org/10.1016/j.comnet.2011.01.014> (Ha and Rhee,
//! "Taming the elephants: New TCP slow start").

use std::time::Duration;

/// Delay-increase detector for slow start.
#[derive(Debug)]
pub struct Hystart {
    /// Whether the heuristic is active.
    enabled: bool,

    /// Exit slow start once `delay_max - delay_min` in one round exceeds
    /// this spread.
    ack_delta: Duration,

    /// Smallest RTT sample seen in the current round.
    delay_min: Option<Duration>,

    /// Largest RTT sample seen in the current round.
    delay_max: Option<Duration>,
}

impl Hystart {
    pub fn new(enabled: bool, ack_delta: Duration) -> Self {
        Self {
            enabled,
            ack_delta,
            delay_min: None,
            delay_max: None,
        }
    }

    /// Whether the heuristic is active.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Feed one RTT sample taken during slow start.
    ///
    /// Returns true when the delay spread within the round exceeds the
    /// configured threshold, i.e. the caller should leave slow start by
    /// setting ssthresh to the current window. Zero samples are ignored.
    pub fn on_rtt_sample(&mut self, rtt: Duration) -> bool {
        if !self.enabled || rtt.is_zero() {
            return false;
        }

        self.delay_min = Some(match self.delay_min {
            Some(min) => min.min(rtt),
            None => rtt,
        });
        self.delay_max = Some(match self.delay_max {
            Some(max) => max.max(rtt),
            None => rtt,
        });

        match (self.delay_min, self.delay_max) {
            (Some(min), Some(max)) => max.saturating_sub(min) > self.ack_delta,
            _ => false,
        }
    }

    /// Forget the current round's delay bounds.
    ///
    /// Called when slow start ends or a congestion event resets the epoch.
    pub fn reset_round(&mut self) {
        self.delay_min = None;
        self.delay_max = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hystart_exit_on_delay_spread() {
        let mut hystart = Hystart::new(true, Duration::from_micros(500));

        // Flat RTTs keep slow start going.
        assert!(!hystart.on_rtt_sample(Duration::from_micros(10_000)));
        assert!(!hystart.on_rtt_sample(Duration::from_micros(10_200)));
        assert!(!hystart.on_rtt_sample(Duration::from_micros(10_500)));

        // The spread crossing the threshold triggers the exit.
        assert!(hystart.on_rtt_sample(Duration::from_micros(10_600)));
    }

    #[test]
    fn hystart_reset_round() {
        let mut hystart = Hystart::new(true, Duration::from_micros(500));

        assert!(!hystart.on_rtt_sample(Duration::from_micros(10_000)));
        hystart.reset_round();

        // The old minimum is gone; a large sample alone has no spread.
        assert!(!hystart.on_rtt_sample(Duration::from_micros(11_000)));
    }

    #[test]
    fn hystart_disabled() {
        let mut hystart = Hystart::new(false, Duration::from_micros(500));

        assert!(!hystart.on_rtt_sample(Duration::from_micros(1_000)));
        assert!(!hystart.on_rtt_sample(Duration::from_micros(100_000)));
    }

    #[test]
    fn hystart_ignores_zero_samples() {
        let mut hystart = Hystart::new(true, Duration::from_micros(500));

        assert!(!hystart.on_rtt_sample(Duration::from_micros(10_000)));
        // A zero sample must not become the round minimum.
        assert!(!hystart.on_rtt_sample(Duration::ZERO));
        assert!(!hystart.on_rtt_sample(Duration::from_micros(10_100)));
    }
}
